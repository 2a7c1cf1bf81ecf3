use std::collections::VecDeque;
use std::time::Duration;

use bevy::log::debug;

use super::components::*;
use crate::ecs::{ChildEntitiesComponent, ComponentManager, EntityId, System};
use crate::live_map::LiveMapContext;
use crate::multitasking::MicroThreadComponent;
use crate::projection::CellKey;
use crate::viewport::CellStateComponent;

/// Cached cells plus eviction of those beyond the cache limit.
///
/// A cell that leaves the view is kept (most recent first) only when its tiles
/// are complete and cacheable. Everything else is destroyed right away, which
/// also cancels any pipeline task still running for it.
pub struct BasemapCellsRemovingSystem {
    limit: usize,
    cache: VecDeque<CellKey>,
}

impl BasemapCellsRemovingSystem {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            cache: VecDeque::new(),
        }
    }

    /// Cached cells, most recently released first
    pub fn cached(&self) -> impl Iterator<Item = &CellKey> {
        self.cache.iter()
    }

    fn remove_cell(manager: &mut ComponentManager, cell: CellKey) {
        let Some(host) = manager
            .get_singleton_mut::<BasemapCellsComponent>()
            .and_then(|registry| registry.cells.remove(&cell))
        else {
            return;
        };

        let layers: Vec<EntityId> = manager
            .get_component::<ChildEntitiesComponent>(host)
            .map(|children| {
                children
                    .0
                    .iter()
                    .filter_map(|&entity| manager.get_component::<ParentLayerComponent>(entity))
                    .map(|parent| parent.0)
                    .collect()
            })
            .unwrap_or_default();
        for layer in layers {
            manager.set_component(layer, DirtyLayerComponent);
        }
        manager.remove_entity(host);
    }
}

fn is_loading(manager: &ComponentManager, host: EntityId) -> bool {
    manager.contains::<TileResponseComponent>(host) || manager.contains::<MicroThreadComponent>(host)
}

impl System<LiveMapContext> for BasemapCellsRemovingSystem {
    fn name(&self) -> &str {
        "BasemapCellsRemovingSystem"
    }

    fn update(&mut self, manager: &mut ComponentManager, _context: &mut LiveMapContext, _dt: Duration) {
        let Some(state) = manager.get_singleton::<CellStateComponent>() else {
            return;
        };
        let requested = state.requested.clone();
        let obsolete = state.obsolete.clone();
        if requested.is_empty() && obsolete.is_empty() {
            return;
        }

        self.cache.retain(|cell| !requested.contains(cell));

        for cell in obsolete {
            let host = manager
                .get_singleton::<BasemapCellsComponent>()
                .and_then(|registry| registry.cells.get(&cell).copied());
            let Some(host) = host else {
                continue;
            };

            if is_loading(manager, host) || manager.contains::<NonCacheableComponent>(host) {
                Self::remove_cell(manager, cell);
            } else {
                self.cache.push_front(cell);
            }
        }

        let mut evicted = 0;
        while self.cache.len() > self.limit {
            if let Some(cell) = self.cache.pop_back() {
                Self::remove_cell(manager, cell);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("Evicted {} cached cells ({} kept)", evicted, self.cache.len());
        }
    }
}
