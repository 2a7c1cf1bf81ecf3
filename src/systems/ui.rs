use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;

use crate::components::StatusText;
use crate::plugins::LiveMapResource;

/// Sets up the UI elements
pub fn setup_ui(mut commands: Commands) {
    commands.spawn((
        Text::new("Zoom: -"),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(10.0),
            bottom: Val::Px(10.0),
            ..default()
        },
        // Add background color for readability
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
        StatusText,
    ));
}

/// Shows zoom, position and tile loading progress
pub fn update_status_text(
    live_map: Res<LiveMapResource>,
    diagnostics: Res<DiagnosticsStore>,
    mut query: Query<&mut Text, With<StatusText>>,
) {
    let Ok(mut text) = query.get_single_mut() else {
        return;
    };
    let live_map = &live_map.0;
    let Some(camera) = live_map.camera() else {
        return;
    };

    let geo = live_map.map_projection().invert(camera.position());
    let stats = live_map.statistics();
    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps| fps.smoothed())
        .unwrap_or_default();

    *text = Text::new(format!(
        "Zoom: {:.2} at {:.4}, {:.4}\nTiles: {} requested, {} rendered, {} failed, {} loading\nFPS: {:.0}",
        camera.zoom(),
        geo.y,
        geo.x,
        stats.requested,
        stats.rendered,
        stats.failed,
        stats.in_flight,
        fps
    ));
}
