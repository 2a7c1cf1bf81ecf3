mod tile;

pub use tile::*;

use bevy::prelude::*;

/// Marker component for the UI text that displays zoom and tile statistics
#[derive(Component)]
pub struct StatusText;
