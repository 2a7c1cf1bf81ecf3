//! Camera state, host input and the systems turning one into the other.

pub mod components;
pub mod input;
pub mod systems;

pub use components::*;
pub use input::{InputEvent, InputQueue};
pub use systems::{CameraInputSystem, CameraUpdateSystem, MouseInputSystem};
