use std::collections::HashMap;
use std::sync::Arc;

use bevy::math::DVec2;

use super::components::{CellComponent, KindComponent, TileComponent};
use super::types::{CellLayerKind, Tile};
use crate::ecs::ComponentManager;
use crate::projection::{CellKey, DoubleRect};

/// Placeholder tiles for cells that are still loading, cut from ready tiles
/// of the same layer kind.
pub struct DonorTileCalculator {
    ready: HashMap<(CellKey, CellLayerKind), Arc<Tile>>,
}

/// Where `cell` sits inside `ancestor`, as a unit rectangle
fn unit_rect(ancestor: CellKey, cell: CellKey) -> DoubleRect {
    let n = (1u64 << (cell.zoom - ancestor.zoom)) as f64;
    let offset = DVec2::new(
        cell.x as f64 - ancestor.x as f64 * n,
        cell.y as f64 - ancestor.y as f64 * n,
    );
    DoubleRect::new(offset / n, DVec2::splat(1.0 / n))
}

impl DonorTileCalculator {
    pub fn new(manager: &ComponentManager) -> Self {
        let ready = manager
            .query2::<TileComponent, KindComponent>()
            .filter(|(_, tile, _)| tile.ready)
            .filter_map(|(entity, tile, kind)| {
                let cell = manager.get_component::<CellComponent>(entity)?.cell;
                Some(((cell, kind.kind), tile.tile.clone()?))
            })
            .collect();
        Self { ready }
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Nearest ready ancestor's matching part, or else the ready children
    /// composed into their quadrants.
    pub fn donor(&self, cell: CellKey, kind: CellLayerKind) -> Option<Arc<Tile>> {
        let mut ancestor = cell.parent();
        while let Some(candidate) = ancestor {
            if let Some(tile) = self.ready.get(&(candidate, kind)) {
                return Some(Arc::new(Tile::SubTile {
                    tile: tile.clone(),
                    rect: unit_rect(candidate, cell),
                }));
            }
            ancestor = candidate.parent();
        }

        let parts: Vec<(DoubleRect, Arc<Tile>)> = cell
            .children()
            .into_iter()
            .filter_map(|child| {
                let tile = self.ready.get(&(child, kind))?;
                Some((unit_rect(cell, child), tile.clone()))
            })
            .collect();
        (!parts.is_empty()).then(|| Arc::new(Tile::Composite(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Snapshot;
    use image::RgbaImage;

    fn add_tile(manager: &mut ComponentManager, cell: CellKey, kind: CellLayerKind, ready: bool) {
        let entity = manager.create_entity(format!("tile_{cell}"));
        manager.add_component(entity, CellComponent { cell });
        manager.add_component(entity, KindComponent { kind });
        manager.add_component(
            entity,
            TileComponent {
                tile: Some(Arc::new(Tile::Snapshot(Snapshot::new(RgbaImage::new(256, 256))))),
                ready,
            },
        );
    }

    #[test]
    fn test_grandparent_donates_sub_rect() {
        let mut manager = ComponentManager::new();
        add_tile(&mut manager, CellKey::new(1, 1, 0), CellLayerKind::Raster, true);
        let donors = DonorTileCalculator::new(&manager);

        let cell = CellKey::new(3, 5, 2);
        let Some(tile) = donors.donor(cell, CellLayerKind::Raster) else {
            panic!("expected a donor");
        };
        let Tile::SubTile { rect, .. } = tile.as_ref() else {
            panic!("expected a sub tile");
        };
        assert_eq!(*rect, DoubleRect::new(DVec2::new(0.25, 0.5), DVec2::splat(0.25)));

        let ops = tile.draw_ops(DoubleRect::new(DVec2::ZERO, DVec2::splat(256.0)));
        assert_eq!(ops[0].src, DoubleRect::new(DVec2::new(64.0, 128.0), DVec2::splat(64.0)));
    }

    #[test]
    fn test_children_compose_when_no_ancestor_is_ready() {
        let mut manager = ComponentManager::new();
        let cell = CellKey::new(1, 0, 0);
        let [a, _, _, d] = cell.children();
        add_tile(&mut manager, a, CellLayerKind::World, true);
        add_tile(&mut manager, d, CellLayerKind::World, true);
        add_tile(&mut manager, CellKey::ROOT, CellLayerKind::World, false);
        add_tile(&mut manager, CellKey::ROOT, CellLayerKind::Label, true);
        let donors = DonorTileCalculator::new(&manager);

        let Some(tile) = donors.donor(cell, CellLayerKind::World) else {
            panic!("expected a donor");
        };
        let Tile::Composite(parts) = tile.as_ref() else {
            panic!("expected a composite");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].0, DoubleRect::new(DVec2::splat(0.5), DVec2::splat(0.5)));
        assert!(donors.donor(CellKey::new(2, 3, 3), CellLayerKind::Raster).is_none());
    }
}
