mod camera_plugin;
mod core_plugin;
mod tiles_plugin;
mod ui_plugin;

use bevy::app::PluginGroupBuilder;
use bevy::prelude::*;
use livemap::resources::LiveMapSettings;

pub use camera_plugin::CameraPlugin;
pub use core_plugin::{CorePlugin, LiveMapResource};
pub use tiles_plugin::TilesPlugin;
pub use ui_plugin::UIPlugin;

/// Consolidated plugin struct that groups all application plugins
pub struct AppPlugins {
    settings: LiveMapSettings,
}

impl AppPlugins {
    pub fn new(settings: LiveMapSettings) -> Self {
        Self { settings }
    }
}

impl PluginGroup for AppPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::start::<Self>()
            .add(CorePlugin::new(self.settings))
            .add(CameraPlugin)
            .add(TilesPlugin)
            .add(UIPlugin)
    }
}
