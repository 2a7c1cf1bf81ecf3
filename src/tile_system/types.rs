use std::fmt;
use std::sync::Arc;

use bevy::math::DVec2;
use thiserror::Error;

use crate::canvas::Snapshot;
use crate::projection::DoubleRect;

/// Rendering layer a cell contributes a tile to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellLayerKind {
    /// Filled geometry of a vector basemap
    World,
    /// Text on top of the world layer
    Label,
    /// Pre-rendered image basemap
    Raster,
    /// Cell outlines and keys
    #[cfg(feature = "tile_debug")]
    Debug,
}

impl CellLayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            CellLayerKind::World => "world",
            CellLayerKind::Label => "label",
            CellLayerKind::Raster => "raster",
            #[cfg(feature = "tile_debug")]
            CellLayerKind::Debug => "debug",
        }
    }
}

impl fmt::Display for CellLayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for tile-related operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileError {
    /// Connection, timeout or body read failure
    #[error("network error: {0}")]
    Network(String),
    /// Non-success HTTP status other than 404
    #[error("HTTP status {0}")]
    Status(u16),
    /// Tile wasn't found (404)
    #[error("tile not found")]
    NotFound,
    #[error("failed to decode tile: {0}")]
    Decode(String),
    #[error("invalid tile URL template: {0}")]
    InvalidTemplate(String),
}

/// Renderable content of one tile.
///
/// Rectangles inside `SubTile` and `Composite` are unit rectangles: fractions
/// of the tile they belong to.
#[derive(Debug, Clone)]
pub enum Tile {
    Snapshot(Snapshot),
    /// Part of a larger tile, stretched to fill this one
    SubTile { tile: Arc<Tile>, rect: DoubleRect },
    /// Several tiles, each covering a part of this one
    Composite(Vec<(DoubleRect, Arc<Tile>)>),
}

/// One image blit: `src` in snapshot pixels onto `dst` in target pixels
#[derive(Debug, Clone)]
pub struct TileDrawOp {
    pub snapshot: Snapshot,
    pub src: DoubleRect,
    pub dst: DoubleRect,
}

impl Tile {
    /// Flattens the tile into blits filling `dst`.
    pub fn draw_ops(&self, dst: DoubleRect) -> Vec<TileDrawOp> {
        match self {
            Tile::Snapshot(snapshot) => {
                let size = snapshot.size();
                vec![TileDrawOp {
                    snapshot: snapshot.clone(),
                    src: DoubleRect::new(DVec2::ZERO, DVec2::new(size.x as f64, size.y as f64)),
                    dst,
                }]
            }
            Tile::SubTile { tile, rect } => {
                // Draw the whole parent so that `rect` lands on `dst`, then clip
                let dimension = dst.dimension / rect.dimension;
                let origin = dst.origin - rect.origin * dimension;
                tile.draw_ops(DoubleRect::new(origin, dimension))
                    .into_iter()
                    .filter_map(|op| clip(op, &dst))
                    .collect()
            }
            Tile::Composite(parts) => parts
                .iter()
                .flat_map(|(rect, tile)| {
                    tile.draw_ops(DoubleRect::new(
                        dst.origin + rect.origin * dst.dimension,
                        rect.dimension * dst.dimension,
                    ))
                })
                .collect(),
        }
    }
}

fn clip(op: TileDrawOp, bounds: &DoubleRect) -> Option<TileDrawOp> {
    let visible = op.dst.intersection(bounds)?;
    let scale = op.src.dimension / op.dst.dimension;
    Some(TileDrawOp {
        src: DoubleRect::new(
            op.src.origin + (visible.origin - op.dst.origin) * scale,
            visible.dimension * scale,
        ),
        dst: visible,
        snapshot: op.snapshot,
    })
}
