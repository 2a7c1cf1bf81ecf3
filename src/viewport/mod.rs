//! Visible-cell tracking: the viewport, ref-counted cells and the system that
//! diffs them every frame.

pub mod cells;
pub mod grid;
#[allow(clippy::module_inception)]
pub mod viewport;

pub use cells::{CellDiff, RefCountedCells};
pub use grid::{CellStateComponent, ViewportGridStateComponent, ViewportGridUpdateSystem};
pub use viewport::Viewport;
