use bevy::math::DVec2;

/// Camera state and the per-frame change flags derived from it.
///
/// Other systems write `requested_*`; only the camera update system moves the
/// camera and raises the flags, which are cleared again at the start of the
/// next frame.
#[derive(Debug, Clone)]
pub struct CameraComponent {
    zoom: f64,
    position: DVec2,
    pub requested_zoom: Option<f64>,
    pub requested_position: Option<DVec2>,
    zoom_level_changed: bool,
    zoom_fraction_changed: bool,
    position_changed: bool,
}

impl CameraComponent {
    pub fn new(zoom: f64, position: DVec2) -> Self {
        Self {
            zoom,
            position,
            requested_zoom: None,
            requested_position: None,
            zoom_level_changed: false,
            zoom_fraction_changed: false,
            position_changed: false,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn zoom_level_changed(&self) -> bool {
        self.zoom_level_changed
    }

    pub fn zoom_fraction_changed(&self) -> bool {
        self.zoom_fraction_changed
    }

    pub fn position_changed(&self) -> bool {
        self.position_changed
    }

    pub fn any_changed(&self) -> bool {
        self.zoom_level_changed || self.zoom_fraction_changed || self.position_changed
    }

    pub(crate) fn clear_flags(&mut self) {
        self.zoom_level_changed = false;
        self.zoom_fraction_changed = false;
        self.position_changed = false;
    }

    /// Moves to `zoom`, raising the zoom flags when it differs.
    ///
    /// The level flag fires when the zoom lands exactly on an integer or
    /// crosses one.
    pub(crate) fn apply_zoom(&mut self, zoom: f64) {
        if zoom == self.zoom {
            return;
        }
        self.zoom_fraction_changed = true;
        if zoom.fract() == 0.0 || zoom.floor() != self.zoom.floor() {
            self.zoom_level_changed = true;
        }
        self.zoom = zoom;
    }

    pub(crate) fn apply_position(&mut self, position: DVec2) {
        if position != self.position {
            self.position_changed = true;
            self.position = position;
        }
    }
}

/// Marks entities that want [`CameraUpdateComponent`] when the camera changes
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraListenerComponent;

/// Present on listeners during a frame in which the camera changed
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraUpdateComponent;

/// Input gathered for the camera during the current frame
#[derive(Debug, Clone, Default)]
pub struct MouseInputComponent {
    /// Screen-space drag, accumulated
    pub drag: DVec2,
    pub zoom_delta: f64,
    pub zoom_anchor: Option<DVec2>,
    pub double_click: Option<DVec2>,
}
