use bevy::prelude::*;

use crate::systems::input::{forward_mouse_input, forward_window_resize};
use crate::systems::tiles::update_live_map;

/// Plugin feeding pointer and window input to the engine camera
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (forward_mouse_input, forward_window_resize).before(update_live_map),
        );
    }
}
