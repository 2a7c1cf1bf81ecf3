use std::sync::Arc;

use bevy::math::UVec2;
use image::RgbaImage;
use parking_lot::Mutex;

use super::{Canvas, CanvasProvider, Color, Context2d, Font, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillStyle(Color),
    Font(Font),
    FillText { text: String, x: f64, y: f64 },
    FillRect { x: f64, y: f64, width: f64, height: f64 },
    StrokeRect { x: f64, y: f64, width: f64, height: f64 },
    Fill,
    Stroke,
    DrawImage { width: f64, height: f64 },
}

pub type CommandLog = Arc<Mutex<Vec<DrawCommand>>>;

/// Canvas that records calls instead of drawing.
///
/// Text is measured as 0.5 × font size per character.
pub struct RecordingCanvas {
    size: UVec2,
    font: Font,
    log: CommandLog,
}

impl Context2d for RecordingCanvas {
    fn set_fill_style(&mut self, color: Color) {
        self.log.lock().push(DrawCommand::FillStyle(color));
    }

    fn set_stroke_style(&mut self, _color: Color) {}

    fn set_line_width(&mut self, _width: f64) {}

    fn set_font(&mut self, font: Font) {
        self.font = font;
        self.log.lock().push(DrawCommand::Font(font));
    }

    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.font.size * 0.5
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.log.lock().push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.log.lock().push(DrawCommand::FillRect { x, y, width, height });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.log.lock().push(DrawCommand::StrokeRect { x, y, width, height });
    }

    fn begin_path(&mut self) {}

    fn move_to(&mut self, _x: f64, _y: f64) {}

    fn line_to(&mut self, _x: f64, _y: f64) {}

    fn circle(&mut self, _x: f64, _y: f64, _radius: f64) {}

    fn close_path(&mut self) {}

    fn fill(&mut self) {
        self.log.lock().push(DrawCommand::Fill);
    }

    fn stroke(&mut self) {
        self.log.lock().push(DrawCommand::Stroke);
    }

    fn draw_image(&mut self, _image: &RgbaImage, _x: f64, _y: f64, width: f64, height: f64) {
        self.log.lock().push(DrawCommand::DrawImage { width, height });
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn context2d(&mut self) -> &mut dyn Context2d {
        self
    }

    fn take_snapshot(&self) -> Snapshot {
        Snapshot::new(RgbaImage::new(self.size.x, self.size.y))
    }
}

/// All canvases created by one provider append to the same log
#[derive(Clone, Default)]
pub struct RecordingCanvasProvider {
    pub log: CommandLog,
}

impl RecordingCanvasProvider {
    pub fn texts(&self) -> Vec<(String, f64, f64)> {
        self.log
            .lock()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillText { text, x, y } => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .collect()
    }
}

impl CanvasProvider for RecordingCanvasProvider {
    fn create_canvas(&self, size: UVec2) -> Box<dyn Canvas> {
        Box::new(RecordingCanvas {
            size,
            font: Font::default(),
            log: self.log.clone(),
        })
    }
}
