use bevy::prelude::*;
use livemap::resources::LiveMapSettings;
use livemap::LiveMap;

use crate::systems::setup::setup;

/// The engine instance driven by the app's update schedule
#[derive(Resource)]
pub struct LiveMapResource(pub LiveMap);

/// Core plugin that handles the basic app setup.
///
/// The [`LiveMapResource`] is inserted by `main`, since creating the engine
/// can fail.
pub struct CorePlugin {
    settings: LiveMapSettings,
}

impl CorePlugin {
    pub fn new(settings: LiveMapSettings) -> Self {
        Self { settings }
    }
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.settings.clone())
            .insert_resource(ClearColor(Color::srgb(0.87, 0.87, 0.87)))
            .add_systems(Startup, setup);
    }
}
