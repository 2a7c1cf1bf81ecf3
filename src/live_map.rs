use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bevy::log::info;
use bevy::math::DVec2;

use crate::camera::{
    CameraComponent, CameraInputSystem, CameraUpdateSystem, InputQueue, MouseInputComponent, MouseInputSystem,
};
use crate::canvas::CanvasProvider;
use crate::debug_log;
use crate::ecs::{ComponentManager, EcsContext, System, SystemMetrics, SystemRunner};
use crate::multitasking::{
    run_later_channel, FrameClock, LaterQueue, MicroThreadComponent, MonotonicTime, SchedulerSystem, SystemTime,
};
use crate::projection::MapProjection;
use crate::resources::settings::LiveMapSettings;
use crate::tile_system::{
    BasemapCellsRemovingSystem, BasemapSource, CellLayerComponent, CellLayerKind, DirtyLayerComponent,
    FetchExecutor, HttpTransport, TileFetcher, TileLoadingSystem, TileStatisticsComponent, TileTransport,
};
use crate::viewport::{Viewport, ViewportGridUpdateSystem};

/// Shared state every engine system receives
pub struct LiveMapContext {
    pub map_projection: MapProjection,
    pub viewport: Viewport,
    pub canvas_provider: Arc<dyn CanvasProvider>,
    pub later: LaterQueue,
    pub input: InputQueue,
    clock: FrameClock,
}

impl LiveMapContext {
    pub fn new(
        settings: &LiveMapSettings,
        canvas_provider: Arc<dyn CanvasProvider>,
        later: LaterQueue,
        time: Box<dyn SystemTime>,
    ) -> Self {
        let map_projection = MapProjection::mercator();
        let viewport = Viewport::new(
            map_projection.map_rect(),
            map_projection.cylindrical(),
            settings.viewport_size.as_dvec2(),
            settings.min_zoom,
            settings.max_zoom,
        );
        Self {
            map_projection,
            viewport,
            canvas_provider,
            later,
            input: InputQueue::default(),
            clock: FrameClock::new(time),
        }
    }
}

impl EcsContext for LiveMapContext {
    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn begin_frame(&mut self) {
        self.clock.begin_frame();
    }

    fn frame_elapsed(&self) -> Duration {
        self.clock.frame_elapsed()
    }
}

/// Context with a recording canvas and a clock that stands still
#[cfg(test)]
pub(crate) fn test_context() -> (LiveMapContext, crate::multitasking::RunLaterSystem) {
    let (later, run_later) = run_later_channel();
    let context = LiveMapContext::new(
        &LiveMapSettings::default(),
        Arc::new(crate::canvas::recording::RecordingCanvasProvider::default()),
        later,
        Box::new(crate::multitasking::ManualTime::default()),
    );
    (context, run_later)
}

/// The map engine: component store, context and the ordered systems.
pub struct LiveMap {
    manager: ComponentManager,
    context: LiveMapContext,
    runner: SystemRunner<LiveMapContext>,
    settings: LiveMapSettings,
    // Declared last so it is dropped after the fetcher holding its handle
    _runtime: Option<tokio::runtime::Runtime>,
}

impl LiveMap {
    /// Engine fetching over HTTP on its own I/O runtime
    pub fn new(settings: LiveMapSettings, canvas_provider: Arc<dyn CanvasProvider>) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("livemap-io")
            .enable_all()
            .build()
            .context("failed to start the tile I/O runtime")?;
        let transport = HttpTransport::new().context("failed to create the HTTP client")?;

        let mut live_map = Self::with_transport(
            settings,
            canvas_provider,
            Arc::new(transport),
            FetchExecutor::Runtime(runtime.handle().clone()),
            Box::new(MonotonicTime::default()),
        )?;
        live_map._runtime = Some(runtime);
        Ok(live_map)
    }

    pub fn with_transport(
        settings: LiveMapSettings,
        canvas_provider: Arc<dyn CanvasProvider>,
        transport: Arc<dyn TileTransport>,
        executor: FetchExecutor,
        time: Box<dyn SystemTime>,
    ) -> anyhow::Result<Self> {
        let source = BasemapSource::from_config(&settings.basemap).context("invalid basemap configuration")?;
        Ok(Self::with_source(settings, source, canvas_provider, transport, executor, time))
    }

    /// Engine over an already built basemap source, for instance one with a
    /// custom geometry decoder
    pub fn with_source(
        settings: LiveMapSettings,
        source: BasemapSource,
        canvas_provider: Arc<dyn CanvasProvider>,
        transport: Arc<dyn TileTransport>,
        executor: FetchExecutor,
        time: Box<dyn SystemTime>,
    ) -> Self {
        let (later, run_later) = run_later_channel();
        let context = LiveMapContext::new(&settings, canvas_provider, later, time);

        let systems: Vec<Box<dyn System<LiveMapContext>>> = vec![
            Box::new(MouseInputSystem),
            Box::new(CameraInputSystem),
            Box::new(CameraUpdateSystem),
            Box::new(ViewportGridUpdateSystem::new(settings.prefetch_margin)),
            Box::new(TileLoadingSystem::new(
                source,
                TileFetcher::new(transport, executor),
                settings.quantum_iterations,
            )),
            Box::new(SchedulerSystem::new(settings.computation_frame_time)),
            Box::new(run_later),
            Box::new(BasemapCellsRemovingSystem::new(settings.tile_cache_limit)),
        ];

        let mut manager = ComponentManager::new();
        let camera = manager.create_entity("camera");
        let position = context.map_projection.apply(settings.initial_position);
        let mut component = CameraComponent::new(settings.initial_zoom, position);
        component.requested_zoom = Some(settings.initial_zoom);
        component.requested_position = Some(position);
        manager.add_component(camera, component);
        manager.add_component(camera, MouseInputComponent::default());

        let runner = SystemRunner::new(systems);
        info!("Live map started with systems {:?}", runner.system_names());

        Self {
            manager,
            context,
            runner,
            settings,
            _runtime: None,
        }
    }

    /// Runs one frame of every system
    pub fn update(&mut self, dt: Duration) {
        self.runner.update(&mut self.manager, &mut self.context, dt);

        let metrics = self.runner.metrics();
        if self.settings.perf_stats && metrics.frame % 60 == 0 {
            if let Some((name, time)) = &metrics.slowest_system {
                info!(
                    "Frame {}: systems took {:?}, slowest {} ({:?})",
                    metrics.frame, metrics.total, name, time
                );
            }
        }
        debug_log!(self.settings, "Tiles: {:?}", self.statistics());
    }

    /// Queue the host pushes pointer and window events into
    pub fn input(&self) -> InputQueue {
        self.context.input.clone()
    }

    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    pub fn viewport(&self) -> &Viewport {
        &self.context.viewport
    }

    pub fn map_projection(&self) -> &MapProjection {
        &self.context.map_projection
    }

    pub fn settings(&self) -> &LiveMapSettings {
        &self.settings
    }

    pub fn camera(&self) -> Option<&CameraComponent> {
        self.manager.get_singleton::<CameraComponent>()
    }

    /// Moves the camera to a geographic position on the next frame
    pub fn look_at(&mut self, geo: DVec2, zoom: Option<f64>) {
        let position = self.context.map_projection.apply(geo);
        if let Some(camera) = self.manager.get_singleton_mut::<CameraComponent>() {
            camera.requested_position = Some(position);
            if zoom.is_some() {
                camera.requested_zoom = zoom;
            }
        }
    }

    /// Layers repainted since the last call
    pub fn take_dirty_layers(&mut self) -> Vec<CellLayerKind> {
        let dirty: Vec<_> = self
            .manager
            .query2::<DirtyLayerComponent, CellLayerComponent>()
            .map(|(entity, _, layer)| (entity, layer.kind))
            .collect();
        dirty
            .into_iter()
            .map(|(entity, kind)| {
                self.manager.take_component::<DirtyLayerComponent>(entity);
                kind
            })
            .collect()
    }

    pub fn statistics(&self) -> TileStatisticsComponent {
        self.manager
            .get_singleton::<TileStatisticsComponent>()
            .copied()
            .unwrap_or_default()
    }

    /// True while fetches are outstanding or pipeline tasks are unfinished
    pub fn is_loading(&self) -> bool {
        self.statistics().in_flight > 0 || self.manager.count::<MicroThreadComponent>() > 0
    }

    pub fn metrics(&self) -> &SystemMetrics {
        self.runner.metrics()
    }
}
