use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy::time::common_conditions::on_timer;

use crate::systems::ui::{setup_ui, update_status_text};

/// Plugin for the status overlay
pub struct UIPlugin;

impl Plugin for UIPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(FrameTimeDiagnosticsPlugin::default())
            .add_systems(Startup, setup_ui)
            // 4 Hz is plenty for text
            .add_systems(
                Update,
                update_status_text.run_if(on_timer(std::time::Duration::from_millis(250))),
            );
    }
}
