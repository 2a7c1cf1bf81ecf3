//! Entity/component store and the ordered system runner driving it.

pub mod entity;
pub mod manager;
pub mod system;

pub use entity::{ChildEntitiesComponent, EntityId};
pub use manager::{ComponentManager, EcsComponent, EcsError};
pub use system::{EcsContext, System, SystemMetrics, SystemRunner};
