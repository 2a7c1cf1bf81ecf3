use std::sync::Arc;

use bevy::math::DVec2;
use parking_lot::Mutex;

/// Pointer and window input in screen pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved by `delta` while the button was held
    Drag { delta: DVec2 },
    /// Zoom by `delta` levels keeping `anchor` fixed on screen
    Zoom { delta: f64, anchor: DVec2 },
    DoubleClick { location: DVec2 },
    Resize { size: DVec2 },
}

/// Shared queue between the host application and the engine.
///
/// The host pushes events at any time; the mouse input system drains them once
/// per frame.
#[derive(Clone, Default)]
pub struct InputQueue(Arc<Mutex<Vec<InputEvent>>>);

impl InputQueue {
    pub fn push(&self, event: InputEvent) {
        self.0.lock().push(event);
    }

    pub fn drain(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}
