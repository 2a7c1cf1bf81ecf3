use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::log::debug;
use bevy::math::DVec2;

use super::protocol::{Geometry, GeometryCollectionDecoder, ProtocolError, RawLayer};
use super::types::TileError;
use crate::multitasking::MicroTask;
use crate::projection::{CellKey, DoubleRect, MapProjection};
use crate::resources::constants::TILE_SIZE;

/// One decoded geometry in tile pixels plus its classification
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub geometry: Geometry,
    pub kind: i32,
    pub sub_kind: i32,
    pub label: String,
    pub short_name: String,
}

/// Features of one tile keyed by layer name
pub type TileFeatures = BTreeMap<String, Vec<TileFeature>>;

/// Geographic degrees to pixels of one cell's tile
#[derive(Clone)]
pub struct TileTransform {
    projection: MapProjection,
    origin: DVec2,
    scale: f64,
}

impl TileTransform {
    pub fn new(projection: MapProjection, cell: CellKey) -> Self {
        let rect: DoubleRect = cell.compute_rect(&projection.map_rect());
        Self {
            projection,
            origin: rect.origin,
            scale: TILE_SIZE as f64 / rect.width(),
        }
    }

    pub fn apply(&self, geo: DVec2) -> DVec2 {
        (self.projection.apply(geo) - self.origin) * self.scale
    }
}

/// Decodes a geometry-collection payload into [`TileFeatures`].
///
/// The first step splits the payload into layers, every later step decodes a
/// single geometry. Geometries that fail to decode are left out; a payload
/// that cannot be split fails the whole task with [`TileError::Decode`].
pub struct ParseTask {
    cell: CellKey,
    decoder: Arc<dyn GeometryCollectionDecoder>,
    transform: TileTransform,
    payload: Option<Vec<u8>>,
    layers: Vec<RawLayer>,
    layer: usize,
    geometry: usize,
    features: Option<TileFeatures>,
    split_error: Option<ProtocolError>,
    omitted: usize,
}

impl ParseTask {
    pub fn new(
        cell: CellKey,
        payload: Vec<u8>,
        decoder: Arc<dyn GeometryCollectionDecoder>,
        projection: MapProjection,
    ) -> Self {
        Self {
            cell,
            decoder,
            transform: TileTransform::new(projection, cell),
            payload: Some(payload),
            layers: Vec::new(),
            layer: 0,
            geometry: 0,
            features: Some(TileFeatures::new()),
            split_error: None,
            omitted: 0,
        }
    }

    /// Geometries dropped so far because they failed to decode
    pub fn omitted(&self) -> usize {
        self.omitted
    }

    fn split(&mut self, payload: Vec<u8>) {
        match self.decoder.split_layers(&payload) {
            Ok(layers) => {
                if let Some(features) = self.features.as_mut() {
                    for layer in &layers {
                        features.entry(layer.name.clone()).or_default();
                    }
                }
                self.layers = layers;
            }
            Err(err) => {
                debug!("Dropping payload of cell {}: {}", self.cell, err);
                self.split_error = Some(err);
            }
        }
        self.skip_empty_layers();
    }

    fn skip_empty_layers(&mut self) {
        while self.layer < self.layers.len() && self.geometry >= self.layers[self.layer].geometries.len() {
            self.layer += 1;
            self.geometry = 0;
        }
    }

    fn decode_next(&mut self) {
        let Some(layer) = self.layers.get(self.layer) else {
            return;
        };
        let index = self.geometry;

        match self.decoder.decode_geometry(&layer.geometries[index]) {
            Ok(geometry) => {
                let transform = &self.transform;
                let feature = TileFeature {
                    geometry: geometry.map(|geo| transform.apply(geo)),
                    kind: layer.kinds.get(index).copied().unwrap_or_default(),
                    sub_kind: layer.sub_kinds.get(index).copied().unwrap_or_default(),
                    label: layer.labels.get(index).cloned().unwrap_or_default(),
                    short_name: layer.short_names.get(index).cloned().unwrap_or_default(),
                };
                if let Some(features) = self.features.as_mut() {
                    features.entry(layer.name.clone()).or_default().push(feature);
                }
            }
            Err(err) => {
                debug!("Omitting geometry {} of layer {} in cell {}: {}", index, layer.name, self.cell, err);
                self.omitted += 1;
            }
        }

        self.geometry += 1;
        self.skip_empty_layers();
    }
}

impl MicroTask for ParseTask {
    type Output = Result<TileFeatures, TileError>;

    fn resume(&mut self) {
        match self.payload.take() {
            Some(payload) => self.split(payload),
            None => self.decode_next(),
        }
    }

    fn alive(&self) -> bool {
        self.payload.is_some() || self.layer < self.layers.len()
    }

    fn take_result(&mut self) -> Option<Self::Output> {
        if self.alive() {
            return None;
        }
        if let Some(err) = self.split_error.take() {
            self.features = None;
            return Some(Err(TileError::Decode(err.to_string())));
        }
        self.features.take().map(Ok)
    }
}
