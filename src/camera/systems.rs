use std::time::Duration;

use bevy::log::debug;
use bevy::math::DVec2;

use super::components::*;
use super::input::InputEvent;
use crate::ecs::{ComponentManager, System};
use crate::live_map::LiveMapContext;

/// Moves queued host input onto the camera's [`MouseInputComponent`].
///
/// Resize events go straight to the viewport.
#[derive(Default)]
pub struct MouseInputSystem;

impl System<LiveMapContext> for MouseInputSystem {
    fn name(&self) -> &str {
        "MouseInputSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut LiveMapContext, _dt: Duration) {
        let events = context.input.drain();
        if events.is_empty() {
            return;
        }
        let Some(mouse) = manager.get_singleton_mut::<MouseInputComponent>() else {
            return;
        };

        for event in events {
            match event {
                InputEvent::Drag { delta } => mouse.drag += delta,
                InputEvent::Zoom { delta, anchor } => {
                    mouse.zoom_delta += delta;
                    mouse.zoom_anchor = Some(anchor);
                }
                InputEvent::DoubleClick { location } => mouse.double_click = Some(location),
                InputEvent::Resize { size } => {
                    debug!("Viewport resized to {}x{}", size.x, size.y);
                    context.viewport.set_size(size);
                }
            }
        }
    }
}

/// Turns this frame's mouse input into a camera request.
#[derive(Default)]
pub struct CameraInputSystem;

impl System<LiveMapContext> for CameraInputSystem {
    fn name(&self) -> &str {
        "CameraInputSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut LiveMapContext, _dt: Duration) {
        let Some(entity) = manager.singleton_entity::<MouseInputComponent>() else {
            return;
        };
        let input = manager
            .get_component_mut::<MouseInputComponent>(entity)
            .map(std::mem::take)
            .unwrap_or_default();
        let Some(camera) = manager.get_component_mut::<CameraComponent>(entity) else {
            return;
        };

        let viewport = &context.viewport;
        let half_screen = viewport.size() / 2.0;
        let mut zoom = camera.requested_zoom.unwrap_or(camera.zoom());
        let mut position = camera.requested_position.unwrap_or(camera.position());
        let mut changed = false;

        if input.drag != DVec2::ZERO {
            position -= input.drag / 2f64.powf(zoom);
            changed = true;
        }

        let (zoom_delta, anchor) = match input.double_click {
            Some(location) => (1.0, Some(location)),
            None => (input.zoom_delta, input.zoom_anchor),
        };
        if zoom_delta != 0.0 {
            let new_zoom = viewport.clamp_zoom(zoom + zoom_delta);
            if let Some(anchor) = anchor {
                // Keep the world point under the anchor in place
                let offset = anchor - half_screen;
                let anchored = position + offset / 2f64.powf(zoom);
                position = anchored - offset / 2f64.powf(new_zoom);
            }
            zoom = new_zoom;
            changed = true;
        }

        if changed {
            camera.requested_zoom = Some(zoom);
            camera.requested_position = Some(position);
        }
    }
}

/// Applies camera requests, syncs the viewport and tags listeners.
#[derive(Default)]
pub struct CameraUpdateSystem;

impl System<LiveMapContext> for CameraUpdateSystem {
    fn name(&self) -> &str {
        "CameraUpdateSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut LiveMapContext, _dt: Duration) {
        for entity in manager.entities_with::<CameraUpdateComponent>() {
            manager.take_component::<CameraUpdateComponent>(entity);
        }

        let Some(camera) = manager.get_singleton_mut::<CameraComponent>() else {
            return;
        };
        camera.clear_flags();

        let viewport = &mut context.viewport;
        if let Some(zoom) = camera.requested_zoom.take() {
            camera.apply_zoom(viewport.clamp_zoom(zoom));
        }
        if let Some(position) = camera.requested_position.take() {
            camera.apply_position(viewport.normalize_position(position));
        }
        viewport.set_zoom(camera.zoom());
        viewport.set_position(camera.position());

        if !camera.any_changed() {
            return;
        }
        for listener in manager.entities_with::<CameraListenerComponent>() {
            manager.set_component(listener, CameraUpdateComponent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;
    use crate::live_map::test_context;

    struct Fixture {
        manager: ComponentManager,
        context: LiveMapContext,
        listener: EntityId,
    }

    impl Fixture {
        fn new(zoom: f64) -> Self {
            let mut manager = ComponentManager::new();
            let (mut context, _) = test_context();
            context.viewport.set_size(DVec2::new(400.0, 300.0));

            let camera = manager.create_entity("camera");
            let mut component = CameraComponent::new(1.0, DVec2::splat(128.0));
            component.requested_zoom = Some(zoom);
            manager.add_component(camera, component);
            manager.add_component(camera, MouseInputComponent::default());

            let listener = manager.create_entity("listener");
            manager.add_component(listener, CameraListenerComponent);

            let mut fixture = Self { manager, context, listener };
            fixture.frame();
            fixture
        }

        fn frame(&mut self) {
            MouseInputSystem.update(&mut self.manager, &mut self.context, Duration::ZERO);
            CameraInputSystem.update(&mut self.manager, &mut self.context, Duration::ZERO);
            CameraUpdateSystem.update(&mut self.manager, &mut self.context, Duration::ZERO);
        }

        fn camera(&self) -> &CameraComponent {
            self.manager.get_singleton::<CameraComponent>().unwrap()
        }

        fn listener_tagged(&self) -> bool {
            self.manager.contains::<CameraUpdateComponent>(self.listener)
        }
    }

    #[test]
    fn test_drag_moves_camera_and_tags_listeners() {
        let mut fixture = Fixture::new(2.0);
        fixture.frame();
        assert!(!fixture.camera().any_changed());
        assert!(!fixture.listener_tagged());

        fixture.context.input.push(InputEvent::Drag { delta: DVec2::new(40.0, 0.0) });
        fixture.frame();

        let camera = fixture.camera();
        assert_eq!(camera.position(), DVec2::new(118.0, 128.0));
        assert!(camera.position_changed());
        assert!(!camera.zoom_fraction_changed());
        assert!(fixture.listener_tagged());
        assert_eq!(fixture.context.viewport.position(), DVec2::new(118.0, 128.0));

        fixture.frame();
        assert!(!fixture.camera().any_changed());
        assert!(!fixture.listener_tagged());
    }

    #[test]
    fn test_wheel_zoom_keeps_anchor_fixed() {
        let mut fixture = Fixture::new(3.0);
        let anchor = DVec2::new(300.0, 50.0);
        let before = fixture.context.viewport.screen_to_world(anchor);

        fixture.context.input.push(InputEvent::Zoom { delta: 0.5, anchor });
        fixture.frame();

        let camera = fixture.camera();
        assert_eq!(camera.zoom(), 3.5);
        assert!(camera.zoom_fraction_changed());
        assert!(!camera.zoom_level_changed());
        let after = fixture.context.viewport.screen_to_world(anchor);
        assert!((after - before).length() < 1e-9);
    }

    #[test]
    fn test_zoom_is_clamped_to_max() {
        let mut fixture = Fixture::new(14.5);
        fixture.context.input.push(InputEvent::DoubleClick { location: DVec2::new(200.0, 150.0) });
        fixture.frame();
        assert_eq!(fixture.camera().zoom(), 15.0);
        assert!(fixture.camera().zoom_level_changed());
    }

    #[test]
    fn test_resize_updates_viewport() {
        let mut fixture = Fixture::new(2.0);
        fixture.context.input.push(InputEvent::Resize { size: DVec2::new(1024.0, 768.0) });
        fixture.frame();
        assert_eq!(fixture.context.viewport.size(), DVec2::new(1024.0, 768.0));
    }
}
