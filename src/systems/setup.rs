use bevy::prelude::*;
use livemap::debug_log;
use livemap::resources::LiveMapSettings;

/// Spawns the 2D camera the tile sprites are drawn with
pub fn setup(mut commands: Commands, settings: Res<LiveMapSettings>) {
    commands.spawn(Camera2d);

    debug_log!(
        settings,
        "Starting at {:?}, zoom {} ({:?} basemap)",
        settings.initial_position,
        settings.initial_zoom,
        settings.basemap
    );
}
