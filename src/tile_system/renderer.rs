use std::sync::Arc;

use bevy::math::{DVec2, UVec2};

use super::parser::{TileFeature, TileFeatures};
use super::protocol::Geometry;
use super::types::CellLayerKind;
use crate::canvas::{rgba, Canvas, CanvasProvider, Color, Context2d, Font, Snapshot};
use crate::multitasking::{constant, fold, lazy, BoxedMicroTask, MicroTaskExt};
use crate::resources::constants::TILE_SIZE;

/// How one layer of vector features is painted
#[derive(Debug, Clone)]
pub struct LayerStyle {
    pub layer: String,
    /// Only features of this kind; all when `None`
    pub kind: Option<i32>,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub line_width: f64,
    pub point_radius: f64,
}

impl LayerStyle {
    pub fn fill(layer: &str, color: Color) -> Self {
        Self {
            layer: layer.to_string(),
            kind: None,
            fill: Some(color),
            stroke: None,
            line_width: 1.0,
            point_radius: 2.0,
        }
    }

    pub fn stroke(layer: &str, color: Color, line_width: f64) -> Self {
        Self {
            layer: layer.to_string(),
            kind: None,
            fill: None,
            stroke: Some(color),
            line_width,
            point_radius: 2.0,
        }
    }

    pub fn with_kind(mut self, kind: i32) -> Self {
        self.kind = Some(kind);
        self
    }

    fn matches(&self, feature: &TileFeature) -> bool {
        self.kind.map_or(true, |kind| kind == feature.kind)
    }
}

/// Styling of vector basemap tiles.
///
/// Styles paint in order; each one draws every matching feature of its layer.
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub background: Color,
    pub styles: Vec<LayerStyle>,
    pub label_color: Color,
    pub label_font: Font,
    pub error_background: Color,
    pub error_color: Color,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            background: rgba(242, 239, 233, 255),
            styles: vec![
                LayerStyle::fill("landuse", rgba(205, 235, 176, 255)),
                LayerStyle::fill("water", rgba(170, 211, 223, 255)),
                LayerStyle::fill("buildings", rgba(217, 208, 201, 255)),
                LayerStyle::stroke("roads", rgba(255, 255, 255, 255), 3.0),
                LayerStyle::stroke("roads", rgba(248, 178, 156, 255), 4.0).with_kind(1),
                LayerStyle::stroke("boundaries", rgba(172, 70, 172, 255), 1.0),
            ],
            label_color: rgba(51, 51, 51, 255),
            label_font: Font::default(),
            error_background: rgba(224, 224, 224, 255),
            error_color: rgba(160, 40, 40, 255),
        }
    }
}

fn tile_size() -> UVec2 {
    UVec2::splat(TILE_SIZE)
}

fn trace_path(ctx: &mut dyn Context2d, points: &[DVec2], close: bool) {
    let mut points = points.iter();
    if let Some(first) = points.next() {
        ctx.move_to(first.x, first.y);
        for point in points {
            ctx.line_to(point.x, point.y);
        }
        if close {
            ctx.close_path();
        }
    }
}

fn paint(ctx: &mut dyn Context2d, style: &LayerStyle, geometry: &Geometry) {
    ctx.begin_path();
    match geometry {
        Geometry::Points(points) => {
            for point in points {
                ctx.circle(point.x, point.y, style.point_radius);
            }
        }
        Geometry::Lines(lines) => lines.iter().for_each(|line| trace_path(ctx, line, false)),
        Geometry::Polygons(polygons) => polygons
            .iter()
            .flatten()
            .for_each(|ring| trace_path(ctx, ring, true)),
    }

    // Open lines have no inside
    if let (Some(fill), false) = (style.fill, matches!(geometry, Geometry::Lines(_))) {
        ctx.set_fill_style(fill);
        ctx.fill();
    }
    if let Some(stroke) = style.stroke {
        ctx.set_stroke_style(stroke);
        ctx.set_line_width(style.line_width);
        ctx.stroke();
    }
}

fn draw_label(ctx: &mut dyn Context2d, config: &MapConfig, feature: &TileFeature) {
    let Some(anchor) = feature.geometry.anchor() else {
        return;
    };
    ctx.set_font(config.label_font);
    ctx.set_fill_style(config.label_color);

    let mut text = feature.label.as_str();
    let mut width = ctx.measure_text(text);
    if width > TILE_SIZE as f64 / 2.0 && !feature.short_name.is_empty() {
        text = feature.short_name.as_str();
        width = ctx.measure_text(text);
    }
    ctx.fill_text(text, anchor.x - width / 2.0, anchor.y + config.label_font.size / 2.0);
}

enum DrawItem {
    Shape(LayerStyle, Geometry),
    Label(TileFeature),
}

fn draw_items(kind: CellLayerKind, features: &TileFeatures, config: &MapConfig) -> Vec<DrawItem> {
    match kind {
        CellLayerKind::World => config
            .styles
            .iter()
            .flat_map(|style| {
                features
                    .get(&style.layer)
                    .into_iter()
                    .flatten()
                    .filter(|feature| style.matches(feature))
                    .map(|feature| DrawItem::Shape(style.clone(), feature.geometry.clone()))
            })
            .collect(),
        CellLayerKind::Label => features
            .values()
            .flatten()
            .filter(|feature| !feature.label.is_empty())
            .map(|feature| DrawItem::Label(feature.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Rasterizes parsed features for one layer kind.
///
/// The canvas is created on the first step, then one shape or label is drawn
/// per step. The result is the canvas snapshot.
pub fn render_task(
    kind: CellLayerKind,
    features: Arc<TileFeatures>,
    config: Arc<MapConfig>,
    provider: Arc<dyn CanvasProvider>,
) -> BoxedMicroTask<Snapshot> {
    lazy(move || {
        let mut canvas = provider.create_canvas(tile_size());
        if kind == CellLayerKind::World {
            let ctx = canvas.context2d();
            ctx.set_fill_style(config.background);
            ctx.fill_rect(0.0, 0.0, TILE_SIZE as f64, TILE_SIZE as f64);
        }
        let items = draw_items(kind, &features, &config);
        fold(items, canvas, move |canvas: &mut Box<dyn Canvas>, item| {
            let ctx = canvas.context2d();
            match item {
                DrawItem::Shape(style, geometry) => paint(ctx, &style, &geometry),
                DrawItem::Label(feature) => draw_label(ctx, &config, &feature),
            }
        })
    })
    .map(|canvas| canvas.take_snapshot())
    .boxed()
}

/// Tile showing `message` centered on a flat background
pub fn error_tile_task(
    message: String,
    config: Arc<MapConfig>,
    provider: Arc<dyn CanvasProvider>,
) -> BoxedMicroTask<Snapshot> {
    lazy(move || {
        let mut canvas = provider.create_canvas(tile_size());
        let size = canvas.size().as_dvec2();
        let ctx = canvas.context2d();
        ctx.set_fill_style(config.error_background);
        ctx.fill_rect(0.0, 0.0, size.x, size.y);

        ctx.set_font(config.label_font);
        ctx.set_fill_style(config.error_color);
        let width = ctx.measure_text(&message);
        ctx.fill_text(&message, (size.x - width) / 2.0, (size.y + config.label_font.size) / 2.0);
        constant(canvas.take_snapshot())
    })
    .boxed()
}

/// Cell outline with the cell key written in the corner
#[cfg(feature = "tile_debug")]
pub fn debug_tile_task(
    cell: crate::projection::CellKey,
    provider: Arc<dyn CanvasProvider>,
) -> BoxedMicroTask<Snapshot> {
    lazy(move || {
        let mut canvas = provider.create_canvas(tile_size());
        let ctx = canvas.context2d();
        ctx.set_stroke_style(rgba(255, 0, 0, 255));
        ctx.set_line_width(1.0);
        ctx.stroke_rect(0.5, 0.5, TILE_SIZE as f64 - 1.0, TILE_SIZE as f64 - 1.0);
        ctx.set_fill_style(rgba(255, 0, 0, 255));
        ctx.set_font(Font::default());
        ctx.fill_text(&format!("{} (z{})", cell, cell.zoom), 4.0, 16.0);
        constant(canvas.take_snapshot())
    })
    .boxed()
}
