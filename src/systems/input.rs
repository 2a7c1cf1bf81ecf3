use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::math::DVec2;
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowResized};
use livemap::camera::InputEvent;

use crate::plugins::LiveMapResource;

/// Two presses closer together than this count as a double click
const DOUBLE_CLICK_SECS: f64 = 0.3;
/// Zoom levels per wheel line
const ZOOM_PER_LINE: f64 = 0.25;
/// Zoom levels per scrolled pixel on touchpads
const ZOOM_PER_PIXEL: f64 = 0.005;

/// Forwards drags, wheel zoom and double clicks on the primary window
pub fn forward_mouse_input(
    buttons: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut cursor_moved: EventReader<CursorMoved>,
    mut wheel: EventReader<MouseWheel>,
    windows: Query<&Window, With<PrimaryWindow>>,
    live_map: Res<LiveMapResource>,
    mut last_click: Local<Option<f64>>,
) {
    let input = live_map.0.input();
    let cursor = windows
        .get_single()
        .ok()
        .and_then(|window| window.cursor_position())
        .map(|position| position.as_dvec2());

    let drag: Vec2 = cursor_moved.read().filter_map(|event| event.delta).sum();
    if buttons.pressed(MouseButton::Left) && drag != Vec2::ZERO {
        input.push(InputEvent::Drag { delta: drag.as_dvec2() });
    }

    for event in wheel.read() {
        let delta = match event.unit {
            MouseScrollUnit::Line => event.y as f64 * ZOOM_PER_LINE,
            MouseScrollUnit::Pixel => event.y as f64 * ZOOM_PER_PIXEL,
        };
        if let Some(anchor) = cursor {
            input.push(InputEvent::Zoom { delta, anchor });
        }
    }

    if buttons.just_pressed(MouseButton::Left) {
        let now = time.elapsed_secs_f64();
        match (*last_click, cursor) {
            (Some(previous), Some(location)) if now - previous < DOUBLE_CLICK_SECS => {
                input.push(InputEvent::DoubleClick { location });
                *last_click = None;
            }
            _ => *last_click = Some(now),
        }
    }
}

/// Keeps the engine viewport the size of the window
pub fn forward_window_resize(mut resized: EventReader<WindowResized>, live_map: Res<LiveMapResource>) {
    if let Some(event) = resized.read().last() {
        live_map.0.input().push(InputEvent::Resize {
            size: DVec2::new(event.width as f64, event.height as f64),
        });
    }
}
