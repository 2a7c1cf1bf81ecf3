use std::time::{Duration, Instant};

use bevy::log::{debug, info};

use super::manager::ComponentManager;

/// Per-frame environment handed to every system.
///
/// The engine owns one context and passes it by reference, so systems never
/// reach for process-wide state.
pub trait EcsContext {
    /// Time on the context's clock
    fn now(&self) -> Duration;

    /// Marks the start of a frame; [`frame_elapsed`](Self::frame_elapsed) counts from here.
    fn begin_frame(&mut self);

    fn frame_elapsed(&self) -> Duration;
}

/// A unit of per-frame behavior operating on the component store.
pub trait System<C: EcsContext>: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, before the first update
    fn init(&mut self, _manager: &mut ComponentManager, _context: &mut C) {}

    fn update(&mut self, manager: &mut ComponentManager, context: &mut C, dt: Duration);
}

/// Update timings gathered by the runner for the last frame.
#[derive(Debug, Clone, Default)]
pub struct SystemMetrics {
    pub frame: u64,
    pub total: Duration,
    pub slowest_system: Option<(String, Duration)>,
    pub per_system: Vec<(String, Duration)>,
}

/// Runs an ordered list of systems once per frame.
///
/// Order is fixed at construction. After every system has run, entities
/// scheduled with `remove_entity` are destroyed.
pub struct SystemRunner<C: EcsContext> {
    systems: Vec<Box<dyn System<C>>>,
    initialized: bool,
    metrics: SystemMetrics,
}

impl<C: EcsContext> SystemRunner<C> {
    pub fn new(systems: Vec<Box<dyn System<C>>>) -> Self {
        Self {
            systems,
            initialized: false,
            metrics: SystemMetrics::default(),
        }
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|system| system.name()).collect()
    }

    pub fn metrics(&self) -> &SystemMetrics {
        &self.metrics
    }

    pub fn update(&mut self, manager: &mut ComponentManager, context: &mut C, dt: Duration) {
        if !self.initialized {
            info!("Initializing {} systems", self.systems.len());
            for system in self.systems.iter_mut() {
                system.init(manager, context);
            }
            self.initialized = true;
        }

        context.begin_frame();

        let mut per_system = Vec::with_capacity(self.systems.len());
        let frame_start = Instant::now();
        for system in self.systems.iter_mut() {
            let started = Instant::now();
            system.update(manager, context, dt);
            per_system.push((system.name().to_string(), started.elapsed()));
        }

        let removed = manager.flush_removed();
        if removed > 0 {
            debug!("Frame {}: flushed {} removed entities", self.metrics.frame, removed);
        }

        self.metrics.frame += 1;
        self.metrics.total = frame_start.elapsed();
        self.metrics.slowest_system = per_system
            .iter()
            .max_by_key(|(_, elapsed)| *elapsed)
            .cloned();
        self.metrics.per_system = per_system;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct NullContext {
        frames: u32,
    }

    impl EcsContext for NullContext {
        fn now(&self) -> Duration {
            Duration::ZERO
        }

        fn begin_frame(&mut self) {
            self.frames += 1;
        }

        fn frame_elapsed(&self) -> Duration {
            Duration::ZERO
        }
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl System<NullContext> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&mut self, _manager: &mut ComponentManager, _context: &mut NullContext) {
            self.log.lock().unwrap().push(format!("init {}", self.name));
        }

        fn update(&mut self, _manager: &mut ComponentManager, _context: &mut NullContext, _dt: Duration) {
            self.log.lock().unwrap().push(self.name.to_string());
        }
    }

    struct Remover;

    impl System<NullContext> for Remover {
        fn name(&self) -> &str {
            "remover"
        }

        fn update(&mut self, manager: &mut ComponentManager, _context: &mut NullContext, _dt: Duration) {
            if let Some(entity) = manager.find_entity("doomed") {
                manager.remove_entity(entity);
                // Still visible to later systems in this frame
                assert!(manager.is_alive(entity));
            }
        }
    }

    #[test]
    fn test_systems_run_in_list_order_after_single_init() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut runner = SystemRunner::new(vec![
            Box::new(Recorder { name: "a", log: log.clone() }) as Box<dyn System<NullContext>>,
            Box::new(Recorder { name: "b", log: log.clone() }),
        ]);
        let mut manager = ComponentManager::new();
        let mut context = NullContext::default();

        runner.update(&mut manager, &mut context, Duration::from_millis(16));
        runner.update(&mut manager, &mut context, Duration::from_millis(16));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init a", "init b", "a", "b", "a", "b"]
        );
        assert_eq!(context.frames, 2);
        assert_eq!(runner.metrics().frame, 2);
        assert_eq!(runner.metrics().per_system.len(), 2);
        assert!(runner.metrics().slowest_system.is_some());
    }

    #[test]
    fn test_removed_entities_are_flushed_after_the_frame() {
        let mut runner = SystemRunner::new(vec![Box::new(Remover) as Box<dyn System<NullContext>>]);
        let mut manager = ComponentManager::new();
        let mut context = NullContext::default();
        let doomed = manager.create_entity("doomed");

        runner.update(&mut manager, &mut context, Duration::ZERO);

        assert!(!manager.is_alive(doomed));
        assert_eq!(manager.pending_removals(), 0);
    }
}
