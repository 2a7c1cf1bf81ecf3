//! Coordinate spaces: geographic degrees, projected plane, world map rect and
//! the quadtree of map cells laid over it.

pub mod cell_key;
pub mod projections;
pub mod rect;

pub use cell_key::{CellKey, CellKeyError, MAX_CELL_ZOOM};
pub use projections::{GeographicProjection, MapProjection, MercatorProjection, Projection};
pub use rect::DoubleRect;
