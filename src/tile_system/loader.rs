use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bevy::log::{debug, info, warn};

use super::components::*;
use super::donor::DonorTileCalculator;
use super::parser::ParseTask;
use super::protocol::{BinaryGeometryDecoder, GeometryCollectionDecoder};
use super::raster::raster_task;
use super::renderer::{error_tile_task, render_task, MapConfig};
use super::transport::TileFetcher;
use super::types::{CellLayerKind, Tile, TileError};
use super::url::{DomainRotation, TileUrlTemplate};
use crate::canvas::{CanvasProvider, Snapshot};
use crate::ecs::{ChildEntitiesComponent, ComponentManager, EntityId, System};
use crate::live_map::LiveMapContext;
use crate::multitasking::{constant, join, lazy, BoxedMicroTask, LaterQueue, MicroTaskExt, MicroThreadComponent};
use crate::projection::{CellKey, MapProjection};
use crate::resources::settings::BasemapConfig;
use crate::viewport::CellStateComponent;

/// Where cell content comes from and how it becomes tiles
pub enum BasemapSource {
    Vector {
        template: TileUrlTemplate,
        decoder: Arc<dyn GeometryCollectionDecoder>,
        map_config: Arc<MapConfig>,
    },
    Raster {
        domains: DomainRotation,
        map_config: Arc<MapConfig>,
    },
}

impl BasemapSource {
    pub fn from_config(config: &BasemapConfig) -> Result<Self, TileError> {
        Ok(match config {
            BasemapConfig::Vector { url_template, map_config } => BasemapSource::Vector {
                template: TileUrlTemplate::new(url_template.as_str())?,
                decoder: Arc::new(BinaryGeometryDecoder),
                map_config: Arc::new(map_config.clone()),
            },
            BasemapConfig::Raster { domains } => BasemapSource::Raster {
                domains: DomainRotation::new(domains)?,
                map_config: Arc::new(MapConfig::default()),
            },
        })
    }

    /// Layers filled from fetched content
    pub fn content_kinds(&self) -> Vec<CellLayerKind> {
        match self {
            BasemapSource::Vector { .. } => vec![CellLayerKind::World, CellLayerKind::Label],
            BasemapSource::Raster { .. } => vec![CellLayerKind::Raster],
        }
    }

    /// Every layer a cell gets a tile entity for
    pub fn layer_kinds(&self) -> Vec<CellLayerKind> {
        #[allow(unused_mut)]
        let mut kinds = self.content_kinds();
        #[cfg(feature = "tile_debug")]
        kinds.push(CellLayerKind::Debug);
        kinds
    }

    fn map_config(&self) -> Arc<MapConfig> {
        match self {
            BasemapSource::Vector { map_config, .. } | BasemapSource::Raster { map_config, .. } => {
                map_config.clone()
            }
        }
    }

    fn url(&mut self, cell: CellKey, projection: &MapProjection) -> String {
        match self {
            BasemapSource::Vector { template, .. } => template.format(cell, &projection.map_rect()),
            BasemapSource::Raster { domains, .. } => domains.next_url(cell, &projection.map_rect()),
        }
    }
}

/// Marks a layer tile ready and its canvas layer dirty
fn publish(later: &LaterQueue, entity: EntityId, tile: Option<Snapshot>) {
    later.run_later(entity, move |manager, entity| {
        manager.set_component(
            entity,
            TileComponent {
                tile: tile.map(|snapshot| Arc::new(Tile::Snapshot(snapshot))),
                ready: true,
            },
        );
        if let Some(&ParentLayerComponent(layer)) = manager.get_component::<ParentLayerComponent>(entity) {
            manager.set_component(layer, DirtyLayerComponent);
        }
        if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
            stats.rendered += 1;
        }
    });
}

fn update_stats(later: &LaterQueue, host: EntityId, f: fn(&mut TileStatisticsComponent)) {
    later.run_later(host, move |manager, _| {
        if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
            f(stats);
        }
    });
}

/// Keeps a cell whose content was unusable out of the cache and counts it
fn mark_failed(later: &LaterQueue, host: EntityId) {
    later.run_later(host, |manager, host| {
        manager.set_component(host, NonCacheableComponent);
        if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
            stats.failed += 1;
        }
    });
}

/// Everything a cell's pipeline task needs once its bytes have landed
struct CellJob {
    host: EntityId,
    cell: CellKey,
    /// Layer tile entities filled from content
    layers: Vec<(CellLayerKind, EntityId)>,
    later: LaterQueue,
    provider: Arc<dyn CanvasProvider>,
    config: Arc<MapConfig>,
}

impl CellJob {
    /// Error tile for every drawn layer; labels are left empty
    fn failed(self, err: &TileError) -> BoxedMicroTask<()> {
        let message = err.to_string();
        let tasks = self
            .layers
            .into_iter()
            .map(|(kind, entity)| {
                let later = self.later.clone();
                if kind == CellLayerKind::Label {
                    return lazy(move || {
                        publish(&later, entity, None);
                        constant(())
                    })
                    .boxed();
                }
                error_tile_task(message.clone(), self.config.clone(), self.provider.clone())
                    .map(move |snapshot| publish(&later, entity, Some(snapshot)))
                    .boxed()
            })
            .collect();
        join(tasks).map(|_| ()).boxed()
    }

    fn vector(self, bytes: Vec<u8>, decoder: Arc<dyn GeometryCollectionDecoder>, projection: MapProjection) -> BoxedMicroTask<()> {
        ParseTask::new(self.cell, bytes, decoder, projection)
            .flat_map(move |result| match result {
                Ok(features) => {
                    update_stats(&self.later, self.host, |stats| stats.parsed += 1);
                    let features = Arc::new(features);
                    let tasks = self
                        .layers
                        .into_iter()
                        .map(|(kind, entity)| {
                            let later = self.later.clone();
                            render_task(kind, features.clone(), self.config.clone(), self.provider.clone())
                                .map(move |snapshot| publish(&later, entity, Some(snapshot)))
                                .boxed()
                        })
                        .collect();
                    join(tasks).map(|_| ()).boxed()
                }
                Err(err) => {
                    warn!("Failed to parse vector cell {}: {}", self.cell, err);
                    mark_failed(&self.later, self.host);
                    self.failed(&err)
                }
            })
            .boxed()
    }

    fn raster(self, bytes: Vec<u8>) -> BoxedMicroTask<()> {
        raster_task(bytes, self.provider.clone())
            .flat_map(move |result| match result {
                Ok(snapshot) => {
                    let tasks = self
                        .layers
                        .into_iter()
                        .map(|(_, entity)| {
                            let later = self.later.clone();
                            let snapshot = snapshot.clone();
                            lazy(move || {
                                publish(&later, entity, Some(snapshot));
                                constant(())
                            })
                            .boxed()
                        })
                        .collect();
                    join(tasks).map(|_| ()).boxed()
                }
                Err(err) => {
                    warn!("Failed to decode raster cell {}: {}", self.cell, err);
                    mark_failed(&self.later, self.host);
                    self.failed(&err)
                }
            })
            .boxed()
    }
}

/// Creates entities for newly required cells, fetches their content and
/// hands landed bytes to pipeline microtasks.
pub struct TileLoadingSystem {
    source: BasemapSource,
    fetcher: TileFetcher,
    quantum: u32,
    layers: HashMap<CellLayerKind, EntityId>,
}

impl TileLoadingSystem {
    pub fn new(source: BasemapSource, fetcher: TileFetcher, quantum: u32) -> Self {
        Self {
            source,
            fetcher,
            quantum,
            layers: HashMap::new(),
        }
    }

    fn create_cell(
        &mut self,
        manager: &mut ComponentManager,
        context: &LiveMapContext,
        donors: &DonorTileCalculator,
        cell: CellKey,
    ) -> EntityId {
        let host = manager.create_entity(format!("tile_{cell}"));
        manager.add_component(host, CellComponent { cell });

        let mut children = Vec::new();
        for kind in self.source.layer_kinds() {
            let entity = manager.create_entity(format!("tile_{cell}_{kind}"));
            let donor = donors.donor(cell, kind);
            let layer = self.layers.get(&kind).copied();
            if let (Some(layer), true) = (layer, donor.is_some()) {
                manager.set_component(layer, DirtyLayerComponent);
            }

            manager.add_component(entity, CellComponent { cell });
            manager.add_component(entity, KindComponent { kind });
            manager.add_component(entity, TileComponent { tile: donor, ready: false });
            if let Some(layer) = layer {
                manager.add_component(entity, ParentLayerComponent(layer));
            }
            #[cfg(feature = "tile_debug")]
            if kind == CellLayerKind::Debug {
                let later = context.later.clone();
                let task = super::renderer::debug_tile_task(cell, context.canvas_provider.clone())
                    .map(move |snapshot| publish(&later, entity, Some(snapshot)))
                    .boxed();
                manager.add_component(entity, MicroThreadComponent::new(task));
            }
            children.push(entity);
        }
        manager.add_component(host, ChildEntitiesComponent(children));

        let url = self.source.url(cell, &context.map_projection);
        debug!("Requesting cell {} from {}", cell, url);
        let slot = self.fetcher.fetch(url.clone());
        manager.add_component(host, TileResponseComponent { slot, url });
        host
    }

    fn start_pipeline(
        &self,
        manager: &mut ComponentManager,
        context: &LiveMapContext,
        host: EntityId,
        result: Result<Vec<u8>, TileError>,
    ) {
        let Some(cell) = manager.get_component::<CellComponent>(host).map(|c| c.cell) else {
            return;
        };
        let content_kinds = self.source.content_kinds();
        let layers: Vec<(CellLayerKind, EntityId)> = manager
            .get_component::<ChildEntitiesComponent>(host)
            .map(|children| {
                children
                    .0
                    .iter()
                    .filter_map(|&entity| {
                        let kind = manager.get_component::<KindComponent>(entity)?.kind;
                        content_kinds.contains(&kind).then_some((kind, entity))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let job = CellJob {
            host,
            cell,
            layers,
            later: context.later.clone(),
            provider: context.canvas_provider.clone(),
            config: self.source.map_config(),
        };

        let task = match result {
            Ok(bytes) => {
                if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
                    stats.downloaded_bytes += bytes.len();
                }
                match &self.source {
                    BasemapSource::Vector { decoder, .. } => {
                        job.vector(bytes, decoder.clone(), context.map_projection.clone())
                    }
                    BasemapSource::Raster { .. } => job.raster(bytes),
                }
            }
            Err(err) => {
                warn!("Cell {} failed to load: {}", cell, err);
                manager.set_component(host, NonCacheableComponent);
                if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
                    stats.failed += 1;
                }
                job.failed(&err)
            }
        };
        manager.add_component(host, MicroThreadComponent::new(task).with_quantum(self.quantum));
    }
}

impl System<LiveMapContext> for TileLoadingSystem {
    fn name(&self) -> &str {
        "TileLoadingSystem"
    }

    fn init(&mut self, manager: &mut ComponentManager, _context: &mut LiveMapContext) {
        let basemap = manager.create_entity("basemap");
        manager.add_component(basemap, BasemapCellsComponent::default());
        manager.add_component(basemap, TileStatisticsComponent::default());

        for kind in self.source.layer_kinds() {
            let layer = manager.create_entity(format!("layer_{kind}"));
            manager.add_component(layer, CellLayerComponent { kind });
            self.layers.insert(kind, layer);
        }
        info!("Basemap layers: {:?}", self.source.layer_kinds());
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut LiveMapContext, _dt: Duration) {
        let requested = manager
            .get_singleton::<CellStateComponent>()
            .map(|state| state.requested.clone())
            .unwrap_or_default();

        if !requested.is_empty() {
            let donors = DonorTileCalculator::new(manager);
            for cell in requested {
                let registered = manager
                    .get_singleton::<BasemapCellsComponent>()
                    .is_some_and(|registry| registry.cells.contains_key(&cell));
                if registered {
                    continue;
                }
                let host = self.create_cell(manager, context, &donors, cell);
                if let Some(registry) = manager.get_singleton_mut::<BasemapCellsComponent>() {
                    registry.cells.insert(cell, host);
                }
                if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
                    stats.requested += 1;
                }
            }
        }

        let landed: Vec<(EntityId, Result<Vec<u8>, TileError>)> = manager
            .query::<TileResponseComponent>()
            .filter_map(|(entity, response)| response.slot.lock().take().map(|result| (entity, result)))
            .collect();
        for (host, result) in landed {
            manager.take_component::<TileResponseComponent>(host);
            self.start_pipeline(manager, context, host, result);
        }

        let in_flight = self.fetcher.in_flight();
        if let Some(stats) = manager.get_singleton_mut::<TileStatisticsComponent>() {
            stats.in_flight = in_flight;
        }
    }
}
