use std::sync::Arc;

use bevy::prelude::*;
use livemap::canvas::PixmapCanvasProvider;
use livemap::resources::LiveMapSettings;
use livemap::LiveMap;

mod components;
mod plugins;
mod systems;

use plugins::{AppPlugins, LiveMapResource};

fn main() -> anyhow::Result<()> {
    let settings = LiveMapSettings::from_env()?;
    let provider = PixmapCanvasProvider::from_settings(&settings)?;
    let live_map = LiveMap::new(settings.clone(), Arc::new(provider))?;

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "livemap".to_string(),
                resolution: (settings.viewport_size.x as f32, settings.viewport_size.y as f32).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(LiveMapResource(live_map))
        .add_plugins(AppPlugins::new(settings))
        .run();

    Ok(())
}
