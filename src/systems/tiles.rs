use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::sprite::Anchor;
use bevy::window::WindowResized;
use livemap::camera::CameraComponent;
use livemap::tile_system::{CellComponent, CellLayerKind, KindComponent, TileComponent};
use livemap::viewport::CellStateComponent;

use crate::components::TileSprite;
use crate::plugins::LiveMapResource;

/// GPU images of tile snapshots, keyed by snapshot id
#[derive(Resource, Default)]
pub struct SnapshotImages {
    images: HashMap<u64, Handle<Image>>,
}

/// Create a new image from raw RGBA8 data
pub fn create_image_from_rgba8(data: &[u8], width: u32, height: u32) -> Image {
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    Image::new(
        size,
        TextureDimension::D2,
        data.to_vec(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    )
}

fn layer_depth(kind: CellLayerKind) -> f32 {
    match kind {
        CellLayerKind::World | CellLayerKind::Raster => 0.0,
        CellLayerKind::Label => 1.0,
        #[cfg(feature = "tile_debug")]
        CellLayerKind::Debug => 2.0,
    }
}

/// Runs one engine frame
pub fn update_live_map(time: Res<Time>, mut live_map: ResMut<LiveMapResource>) {
    live_map.0.update(time.delta());
}

/// Rebuilds the tile sprites when a layer changed, the camera moved or the
/// window was resized
pub fn sync_tile_sprites(
    mut commands: Commands,
    mut live_map: ResMut<LiveMapResource>,
    mut images: ResMut<Assets<Image>>,
    mut cache: ResMut<SnapshotImages>,
    sprites: Query<Entity, With<TileSprite>>,
    mut resized: EventReader<WindowResized>,
) {
    let live_map = &mut live_map.0;
    let dirty = live_map.take_dirty_layers();
    let moved = live_map.camera().is_some_and(CameraComponent::any_changed);
    let resized = resized.read().count() > 0;
    if dirty.is_empty() && !moved && !resized {
        return;
    }

    for entity in &sprites {
        commands.entity(entity).despawn();
    }

    let manager = live_map.manager();
    let viewport = live_map.viewport();
    let Some(state) = manager.get_singleton::<CellStateComponent>() else {
        return;
    };
    let map_rect = viewport.map_rect();
    let half = viewport.size() / 2.0;
    let mut used = HashSet::new();

    for (entity, tile, kind) in manager.query2::<TileComponent, KindComponent>() {
        let (Some(tile), Some(cell)) = (&tile.tile, manager.get_component::<CellComponent>(entity)) else {
            continue;
        };
        if !state.visible.contains(&cell.cell) {
            continue;
        }

        for screen_rect in viewport.screen_rects(&cell.cell.compute_rect(&map_rect)) {
            for op in tile.draw_ops(screen_rect) {
                used.insert(op.snapshot.id);
                let handle = cache
                    .images
                    .entry(op.snapshot.id)
                    .or_insert_with(|| {
                        let image = &op.snapshot.image;
                        images.add(create_image_from_rgba8(image.as_raw(), image.width(), image.height()))
                    })
                    .clone();

                commands.spawn((
                    Sprite {
                        image: handle,
                        rect: Some(Rect::new(
                            op.src.left() as f32,
                            op.src.top() as f32,
                            op.src.right() as f32,
                            op.src.bottom() as f32,
                        )),
                        custom_size: Some(Vec2::new(op.dst.width() as f32, op.dst.height() as f32)),
                        anchor: Anchor::TopLeft,
                        ..default()
                    },
                    // Screen y grows downwards, world y upwards
                    Transform::from_xyz(
                        (op.dst.left() - half.x) as f32,
                        (half.y - op.dst.top()) as f32,
                        layer_depth(kind.kind),
                    ),
                    TileSprite {
                        cell: cell.cell,
                        kind: kind.kind,
                    },
                ));
            }
        }
    }

    cache.images.retain(|id, handle| {
        let keep = used.contains(id);
        if !keep {
            images.remove(handle.id());
        }
        keep
    });
    debug!("Showing {} tile images", cache.images.len());
}
