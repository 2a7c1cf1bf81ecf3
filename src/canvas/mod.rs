//! Offscreen drawing surface used to rasterize tiles.
//!
//! The tile pipeline only sees [`CanvasProvider`], [`Canvas`] and
//! [`Context2d`]; the pixmap implementation backs the application.

pub mod pixmap;
#[cfg(test)]
pub mod recording;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bevy::math::UVec2;
use image::RgbaImage;
use thiserror::Error;

pub use pixmap::{PixmapCanvas, PixmapCanvasProvider};

pub type Color = image::Rgba<u8>;

pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Color {
    image::Rgba([r, g, b, a])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Font {
    /// Pixel height
    pub size: f64,
}

impl Default for Font {
    fn default() -> Self {
        Self { size: 12.0 }
    }
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("failed to read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid font data")]
    InvalidFont,
}

/// Immutable copy of a canvas' pixels (straight alpha).
///
/// Ids are unique per process so consumers can cache uploads by id.
#[derive(Clone)]
pub struct Snapshot {
    pub id: u64,
    pub image: Arc<RgbaImage>,
}

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

impl Snapshot {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed),
            image: Arc::new(image),
        }
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.image.width(), self.image.height())
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("size", &self.size())
            .finish()
    }
}

/// 2D drawing state machine in the style of an HTML canvas context.
pub trait Context2d {
    fn set_fill_style(&mut self, color: Color);
    fn set_stroke_style(&mut self, color: Color);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: Font);

    fn measure_text(&self, text: &str) -> f64;
    /// Draws text with its baseline starting at `(x, y)`
    fn fill_text(&mut self, text: &str, x: f64, y: f64);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    /// Adds a full circle as a closed subpath
    fn circle(&mut self, x: f64, y: f64, radius: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);

    /// Draws `image` scaled into the given destination rectangle
    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, width: f64, height: f64);
}

pub trait Canvas: Send + Sync {
    fn size(&self) -> UVec2;
    fn context2d(&mut self) -> &mut dyn Context2d;
    fn take_snapshot(&self) -> Snapshot;
}

pub trait CanvasProvider: Send + Sync {
    fn create_canvas(&self, size: UVec2) -> Box<dyn Canvas>;
}
