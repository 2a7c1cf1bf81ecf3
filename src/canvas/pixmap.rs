use std::sync::Arc;

use ab_glyph::{Font as _, FontVec, PxScale, ScaleFont};
use bevy::log::info;
use bevy::math::UVec2;
use image::RgbaImage;
use tiny_skia::{
    FillRule, FilterQuality, IntSize, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};

use super::{Canvas, CanvasError, CanvasProvider, Color, Context2d, Font, Snapshot};
use crate::resources::LiveMapSettings;

/// Largest canvas edge; requests are clamped into `1..=MAX_CANVAS_EDGE`
const MAX_CANVAS_EDGE: u32 = 8192;

// Glyph box proportions used when no font is loaded
const PLACEHOLDER_ADVANCE: f64 = 0.6;
const PLACEHOLDER_WIDTH: f64 = 0.5;
const PLACEHOLDER_HEIGHT: f64 = 0.7;

/// CPU canvas rendering into a tiny-skia pixmap.
///
/// Without a font, text is drawn as one box per character.
pub struct PixmapCanvas {
    pixmap: Pixmap,
    font: Option<Arc<FontVec>>,
    fill_color: Color,
    stroke_color: Color,
    line_width: f64,
    text_font: Font,
    path: PathBuilder,
}

impl PixmapCanvas {
    pub fn new(size: UVec2, font: Option<Arc<FontVec>>) -> Self {
        let width = size.x.clamp(1, MAX_CANVAS_EDGE);
        let height = size.y.clamp(1, MAX_CANVAS_EDGE);
        let pixmap = Pixmap::new(width, height)
            .unwrap_or_else(|| unreachable!("pixmap size clamped to a valid range"));
        Self {
            pixmap,
            font,
            fill_color: image::Rgba([0, 0, 0, 255]),
            stroke_color: image::Rgba([0, 0, 0, 255]),
            line_width: 1.0,
            text_font: Font::default(),
            path: PathBuilder::new(),
        }
    }

    fn paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
        paint.anti_alias = true;
        paint
    }

    fn full_rect(&self) -> Option<Rect> {
        Rect::from_xywh(0.0, 0.0, self.pixmap.width() as f32, self.pixmap.height() as f32)
    }

    fn fill_glyphs(&mut self, font: &FontVec, text: &str, x: f64, y: f64) {
        let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        let width = mask.width() as i32;
        let height = mask.height() as i32;
        let coverage_data = mask.data_mut();

        let scaled = font.as_scaled(PxScale::from(self.text_font.size as f32));
        let mut cursor = x as f32;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            let glyph = id.with_scale_and_position(scaled.scale(), ab_glyph::point(cursor, y as f32));
            cursor += scaled.h_advance(id);

            let Some(outlined) = scaled.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px >= 0 && py >= 0 && px < width && py < height {
                    let index = (py * width + px) as usize;
                    let value = (coverage.clamp(0.0, 1.0) * 255.0) as u8;
                    coverage_data[index] = coverage_data[index].max(value);
                }
            });
        }

        if let Some(rect) = self.full_rect() {
            self.pixmap.fill_rect(rect, &Self::paint(self.fill_color), Transform::identity(), Some(&mask));
        }
    }

    fn fill_placeholder_glyphs(&mut self, text: &str, x: f64, y: f64) {
        let size = self.text_font.size;
        let mut cursor = x;
        for ch in text.chars() {
            if !ch.is_whitespace() {
                self.fill_rect(
                    cursor + size * (PLACEHOLDER_ADVANCE - PLACEHOLDER_WIDTH) / 2.0,
                    y - size * PLACEHOLDER_HEIGHT,
                    size * PLACEHOLDER_WIDTH,
                    size * PLACEHOLDER_HEIGHT,
                );
            }
            cursor += size * PLACEHOLDER_ADVANCE;
        }
    }
}

impl Context2d for PixmapCanvas {
    fn set_fill_style(&mut self, color: Color) {
        self.fill_color = color;
    }

    fn set_stroke_style(&mut self, color: Color) {
        self.stroke_color = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn set_font(&mut self, font: Font) {
        self.text_font = font;
    }

    fn measure_text(&self, text: &str) -> f64 {
        match &self.font {
            Some(font) => {
                let scaled = font.as_scaled(PxScale::from(self.text_font.size as f32));
                text.chars()
                    .map(|ch| scaled.h_advance(scaled.glyph_id(ch)) as f64)
                    .sum()
            }
            None => text.chars().count() as f64 * self.text_font.size * PLACEHOLDER_ADVANCE,
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        match self.font.clone() {
            Some(font) => self.fill_glyphs(&font, text, x, y),
            None => self.fill_placeholder_glyphs(text, x, y),
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if let Some(rect) = Rect::from_xywh(x as f32, y as f32, width as f32, height as f32) {
            self.pixmap.fill_rect(rect, &Self::paint(self.fill_color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if let Some(rect) = Rect::from_xywh(x as f32, y as f32, width as f32, height as f32) {
            let path = PathBuilder::from_rect(rect);
            let stroke = Stroke {
                width: self.line_width as f32,
                ..Default::default()
            };
            self.pixmap.stroke_path(&path, &Self::paint(self.stroke_color), &stroke, Transform::identity(), None);
        }
    }

    fn begin_path(&mut self) {
        self.path = PathBuilder::new();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.move_to(x as f32, y as f32);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.path.line_to(x as f32, y as f32);
    }

    fn circle(&mut self, x: f64, y: f64, radius: f64) {
        self.path.push_circle(x as f32, y as f32, radius as f32);
    }

    fn close_path(&mut self) {
        self.path.close();
    }

    fn fill(&mut self) {
        if let Some(path) = self.path.clone().finish() {
            self.pixmap.fill_path(
                &path,
                &Self::paint(self.fill_color),
                FillRule::EvenOdd,
                Transform::identity(),
                None,
            );
        }
    }

    fn stroke(&mut self) {
        if let Some(path) = self.path.clone().finish() {
            let stroke = Stroke {
                width: self.line_width as f32,
                ..Default::default()
            };
            self.pixmap.stroke_path(&path, &Self::paint(self.stroke_color), &stroke, Transform::identity(), None);
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, width: f64, height: f64) {
        let Some(size) = IntSize::from_wh(image.width(), image.height()) else {
            return;
        };
        // tiny-skia wants premultiplied alpha
        let data: Vec<u8> = image
            .pixels()
            .flat_map(|p| {
                let a = p[3] as u16;
                [
                    (p[0] as u16 * a / 255) as u8,
                    (p[1] as u16 * a / 255) as u8,
                    (p[2] as u16 * a / 255) as u8,
                    p[3],
                ]
            })
            .collect();
        let Some(source) = Pixmap::from_vec(data, size) else {
            return;
        };

        let transform = Transform::from_row(
            (width / image.width() as f64) as f32,
            0.0,
            0.0,
            (height / image.height() as f64) as f32,
            x as f32,
            y as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    }
}

impl Canvas for PixmapCanvas {
    fn size(&self) -> UVec2 {
        UVec2::new(self.pixmap.width(), self.pixmap.height())
    }

    fn context2d(&mut self) -> &mut dyn Context2d {
        self
    }

    fn take_snapshot(&self) -> Snapshot {
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let data: Vec<u8> = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        let image = RgbaImage::from_raw(width, height, data).unwrap_or_else(|| RgbaImage::new(width, height));
        Snapshot::new(image)
    }
}

/// Hands out pixmap canvases sharing one optional font
#[derive(Clone, Default)]
pub struct PixmapCanvasProvider {
    font: Option<Arc<FontVec>>,
}

impl PixmapCanvasProvider {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font: font.map(Arc::new) }
    }

    pub fn from_settings(settings: &LiveMapSettings) -> Result<Self, CanvasError> {
        let Some(path) = &settings.font_path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| CanvasError::InvalidFont)?;
        info!("Loaded font {}", path.display());
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

impl CanvasProvider for PixmapCanvasProvider {
    fn create_canvas(&self, size: UVec2) -> Box<dyn Canvas> {
        Box::new(PixmapCanvas::new(size, self.font.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::rgba;

    #[test]
    fn test_fill_rect_shows_in_snapshot() {
        let mut canvas = PixmapCanvas::new(UVec2::new(8, 8), None);
        let ctx = canvas.context2d();
        ctx.set_fill_style(rgba(255, 0, 0, 255));
        ctx.fill_rect(0.0, 0.0, 4.0, 8.0);

        let snapshot = canvas.take_snapshot();
        assert_eq!(snapshot.size(), UVec2::new(8, 8));
        assert_eq!(*snapshot.image.get_pixel(1, 1), rgba(255, 0, 0, 255));
        assert_eq!(snapshot.image.get_pixel(6, 1)[3], 0);
    }

    #[test]
    fn test_placeholder_text_is_measured_and_drawn() {
        let mut canvas = PixmapCanvas::new(UVec2::new(64, 32), None);
        let ctx = canvas.context2d();
        ctx.set_font(Font { size: 10.0 });
        assert_eq!(ctx.measure_text("abcd"), 24.0);

        ctx.set_fill_style(rgba(0, 0, 255, 255));
        ctx.fill_text("ab", 0.0, 20.0);
        let snapshot = canvas.take_snapshot();
        assert_eq!(snapshot.image.get_pixel(3, 16)[2], 255);
        assert_eq!(snapshot.image.get_pixel(3, 25)[3], 0);
    }

    #[test]
    fn test_draw_image_scales_into_destination() {
        let source = RgbaImage::from_pixel(2, 2, rgba(0, 255, 0, 255));
        let mut canvas = PixmapCanvas::new(UVec2::new(16, 16), None);
        canvas.context2d().draw_image(&source, 0.0, 0.0, 16.0, 16.0);

        let snapshot = canvas.take_snapshot();
        assert_eq!(snapshot.image.get_pixel(8, 8)[1], 255);
        assert_eq!(snapshot.image.get_pixel(3, 12)[3], 255);
    }

    #[test]
    fn test_snapshot_ids_are_unique() {
        let canvas = PixmapCanvas::new(UVec2::new(1, 1), None);
        assert_ne!(canvas.take_snapshot().id, canvas.take_snapshot().id);
    }
}
