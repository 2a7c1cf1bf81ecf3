use std::collections::BTreeSet;
use std::time::Duration;

use bevy::log::debug;

use super::cells::RefCountedCells;
use crate::ecs::{ComponentManager, System};
use crate::live_map::LiveMapContext;
use crate::projection::CellKey;

/// Authoritative ref-counted set of required cells
#[derive(Debug, Default)]
pub struct ViewportGridStateComponent {
    pub cells: RefCountedCells,
    pub zoom_level: u8,
}

/// What changed in the grid this frame, for the loading and eviction systems
#[derive(Debug, Clone, Default)]
pub struct CellStateComponent {
    /// Cells that became required this frame
    pub requested: BTreeSet<CellKey>,
    /// Cells released this frame
    pub obsolete: BTreeSet<CellKey>,
    /// All currently required cells
    pub visible: BTreeSet<CellKey>,
}

/// Recomputes the required cells each frame and diffs them against the last
/// frame.
///
/// Requirements come from the exact viewport and, when configured, a prefetch
/// ring around it; a cell covered by both is held twice.
pub struct ViewportGridUpdateSystem {
    prefetch_margin: u32,
}

impl ViewportGridUpdateSystem {
    pub fn new(prefetch_margin: u32) -> Self {
        Self { prefetch_margin }
    }
}

impl System<LiveMapContext> for ViewportGridUpdateSystem {
    fn name(&self) -> &str {
        "ViewportGridUpdateSystem"
    }

    fn init(&mut self, manager: &mut ComponentManager, _context: &mut LiveMapContext) {
        let entity = manager.create_entity("viewport_grid");
        manager.add_component(entity, ViewportGridStateComponent::default());
        manager.add_component(entity, CellStateComponent::default());
    }

    fn update(&mut self, manager: &mut ComponentManager, context: &mut LiveMapContext, _dt: Duration) {
        let viewport = &context.viewport;
        let level = viewport.zoom_level();

        let mut requirements = viewport.visible_cells(level, 0);
        if self.prefetch_margin > 0 {
            requirements.extend(viewport.visible_cells(level, self.prefetch_margin));
        }

        let Some(grid) = manager.get_singleton_mut::<ViewportGridStateComponent>() else {
            return;
        };
        let diff = grid.cells.update(requirements);
        grid.zoom_level = level;
        let visible: BTreeSet<CellKey> = grid.cells.cells().copied().collect();

        if !diff.is_empty() {
            debug!(
                "Grid at zoom {}: +{} -{} ({} visible)",
                level,
                diff.to_request.len(),
                diff.to_remove.len(),
                visible.len()
            );
        }

        if let Some(state) = manager.get_singleton_mut::<CellStateComponent>() {
            state.requested = diff.to_request;
            state.obsolete = diff.to_remove;
            state.visible = visible;
        }
    }
}
