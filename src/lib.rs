//! Map engine: an entity/component store driven by ordered systems, a
//! cooperative microtask scheduler with a per-frame budget, and a cell-based
//! tile pipeline from fetch to cached snapshot.

pub mod camera;
pub mod canvas;
pub mod ecs;
pub mod live_map;
pub mod multitasking;
pub mod projection;
pub mod resources;
pub mod tile_system;
pub mod utils;
pub mod viewport;

pub use live_map::{LiveMap, LiveMapContext};
