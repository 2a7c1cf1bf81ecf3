use bevy::math::DVec2;

use crate::projection::{CellKey, DoubleRect, MAX_CELL_ZOOM};

/// Window onto the world map: screen size, world center and continuous zoom.
///
/// One world unit spans `2^zoom` screen pixels. For cylindrical maps the
/// horizontal position wraps, so the window may show the same cell more than
/// once.
#[derive(Debug, Clone)]
pub struct Viewport {
    map_rect: DoubleRect,
    cylindrical: bool,
    size: DVec2,
    position: DVec2,
    zoom: f64,
    min_zoom: u8,
    max_zoom: u8,
}

impl Viewport {
    /// Zoom bounds are clamped to the deepest cell level.
    pub fn new(map_rect: DoubleRect, cylindrical: bool, size: DVec2, min_zoom: u8, max_zoom: u8) -> Self {
        let max_zoom = max_zoom.min(MAX_CELL_ZOOM);
        let min_zoom = min_zoom.min(max_zoom);
        Self {
            map_rect,
            cylindrical,
            size,
            position: map_rect.center(),
            zoom: min_zoom as f64,
            min_zoom,
            max_zoom,
        }
    }

    pub fn map_rect(&self) -> DoubleRect {
        self.map_rect
    }

    pub fn cylindrical(&self) -> bool {
        self.cylindrical
    }

    pub fn size(&self) -> DVec2 {
        self.size
    }

    pub fn set_size(&mut self, size: DVec2) {
        self.size = size.max(DVec2::ONE);
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn set_position(&mut self, position: DVec2) {
        self.position = self.normalize_position(position);
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.clamp_zoom(zoom);
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom as f64, self.max_zoom as f64)
    }

    /// Integer zoom level the tile grid is requested at
    pub fn zoom_level(&self) -> u8 {
        (self.zoom.floor() as u8).clamp(self.min_zoom, self.max_zoom)
    }

    /// Screen pixels per world unit
    pub fn scale(&self) -> f64 {
        2f64.powf(self.zoom)
    }

    /// World rectangle covered by the screen
    pub fn window_rect(&self) -> DoubleRect {
        let dimension = self.size / self.scale();
        DoubleRect::new(self.position - dimension / 2.0, dimension)
    }

    pub fn world_to_screen(&self, world: DVec2) -> DVec2 {
        (world - self.window_rect().origin) * self.scale()
    }

    pub fn screen_to_world(&self, screen: DVec2) -> DVec2 {
        self.window_rect().origin + screen / self.scale()
    }

    /// Wraps x for cylindrical maps, clamps otherwise; y is always clamped.
    pub fn normalize_position(&self, position: DVec2) -> DVec2 {
        let map = &self.map_rect;
        let x = if self.cylindrical {
            map.left() + (position.x - map.left()).rem_euclid(map.width())
        } else {
            position.x.clamp(map.left(), map.right())
        };
        DVec2::new(x, position.y.clamp(map.top(), map.bottom()))
    }

    /// Screen rectangles where `world_rect` appears, one per visible repetition
    /// of the map.
    pub fn screen_rects(&self, world_rect: &DoubleRect) -> Vec<DoubleRect> {
        let window = self.window_rect();
        let width = self.map_rect.width();
        let shifts: Vec<f64> = if self.cylindrical {
            let first = ((window.left() - world_rect.right()) / width).ceil() as i64;
            let last = ((window.right() - world_rect.left()) / width).floor() as i64;
            (first..=last).map(|i| i as f64 * width).collect()
        } else {
            vec![0.0]
        };

        shifts
            .into_iter()
            .map(|shift| world_rect.translate(DVec2::new(shift, 0.0)))
            .filter(|rect| rect.intersects(&window))
            .map(|rect| {
                DoubleRect::new(self.world_to_screen(rect.origin), rect.dimension * self.scale())
            })
            .collect()
    }

    /// Cells at `level` intersecting the window grown by `margin` cells.
    ///
    /// Wrapped views list a cell once per repetition in which it is visible.
    pub fn visible_cells(&self, level: u8, margin: u32) -> Vec<CellKey> {
        let grid = CellKey::grid_size(level) as i64;
        let cell_size = self.map_rect.dimension / grid as f64;
        let window = self.window_rect();
        let margin = margin as i64;

        let first_x = ((window.left() - self.map_rect.left()) / cell_size.x).floor() as i64 - margin;
        let last_x = ((window.right() - self.map_rect.left()) / cell_size.x).ceil() as i64 - 1 + margin;
        let first_y = (((window.top() - self.map_rect.top()) / cell_size.y).floor() as i64 - margin).max(0);
        let last_y = (((window.bottom() - self.map_rect.top()) / cell_size.y).ceil() as i64 - 1 + margin).min(grid - 1);

        let (first_x, last_x) = if self.cylindrical {
            (first_x, last_x)
        } else {
            (first_x.max(0), last_x.min(grid - 1))
        };

        let mut cells = Vec::new();
        for y in first_y..=last_y {
            for x in first_x..=last_x {
                cells.push(CellKey::new(level, x.rem_euclid(grid) as u32, y as u32));
            }
        }
        cells
    }
}
