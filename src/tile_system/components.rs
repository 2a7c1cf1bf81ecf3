use std::collections::HashMap;
use std::sync::Arc;

use super::transport::ResponseSlot;
use super::types::{CellLayerKind, Tile};
use crate::ecs::EntityId;
use crate::projection::CellKey;

/// Host entity of one basemap cell
#[derive(Debug, Clone, Copy)]
pub struct CellComponent {
    pub cell: CellKey,
}

/// Layer kind of a tile-layer entity
#[derive(Debug, Clone, Copy)]
pub struct KindComponent {
    pub kind: CellLayerKind,
}

/// Tile shown for one (cell, layer kind).
///
/// Holds a donor tile until `ready` is set by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct TileComponent {
    pub tile: Option<Arc<Tile>>,
    pub ready: bool,
}

/// Outstanding fetch of a cell's bytes
pub struct TileResponseComponent {
    pub slot: ResponseSlot,
    pub url: String,
}

/// Cell whose content must be fetched again next time it becomes visible
#[derive(Debug, Clone, Copy)]
pub struct NonCacheableComponent;

/// Registry of live cell host entities
#[derive(Debug, Default)]
pub struct BasemapCellsComponent {
    pub cells: HashMap<CellKey, EntityId>,
}

/// Canvas layer entity collecting the tiles of one kind
#[derive(Debug, Clone, Copy)]
pub struct CellLayerComponent {
    pub kind: CellLayerKind,
}

/// Points a tile-layer entity at its canvas layer
#[derive(Debug, Clone, Copy)]
pub struct ParentLayerComponent(pub EntityId);

/// Canvas layer whose tiles changed since the host last repainted it
#[derive(Debug, Clone, Copy)]
pub struct DirtyLayerComponent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileStatisticsComponent {
    pub requested: usize,
    pub downloaded_bytes: usize,
    pub failed: usize,
    pub parsed: usize,
    pub rendered: usize,
    pub in_flight: usize,
}
