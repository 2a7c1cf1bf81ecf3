use bevy::prelude::*;

use crate::systems::tiles::{sync_tile_sprites, update_live_map, SnapshotImages};

/// Plugin running the engine each frame and showing its tiles as sprites
pub struct TilesPlugin;

impl Plugin for TilesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapshotImages>()
            .add_systems(Update, (update_live_map, sync_tile_sprites).chain());
    }
}
