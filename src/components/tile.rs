use bevy::prelude::*;
use livemap::projection::CellKey;
use livemap::tile_system::CellLayerKind;

/// Sprite showing one blit of a map tile
#[derive(Component)]
pub struct TileSprite {
    pub cell: CellKey,
    pub kind: CellLayerKind,
}
