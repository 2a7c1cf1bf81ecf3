//! Binary geometry-collection payload of vector tiles.
//!
//! Little-endian throughout:
//!
//! ```text
//! payload  := "LMT1" u32:layer_count layer*
//! layer    := str:name u32:n (u32:len bytes)×n i32:kind×n i32:sub_kind×n str:label×n str:short_name×n
//! str      := u16:len utf8
//! geometry := u8:type body     1 = points, 2 = lines, 3 = polygons
//! points   := u32:count (f64:lon f64:lat)×count
//! lines    := u32:count points×count
//! polygons := u32:count (u32:rings points×rings)×count
//! ```
//!
//! The feature arrays of a layer are index-aligned with its geometries.

use bevy::math::DVec2;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"LMT1";

const POINTS: u8 = 1;
const LINES: u8 = 2;
const POLYGONS: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload does not start with the LMT1 magic")]
    BadMagic,
    #[error("unexpected end of data at offset {0}")]
    Truncated(usize),
    #[error("unknown geometry type {0}")]
    UnknownGeometry(u8),
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("{0} trailing bytes after geometry")]
    TrailingBytes(usize),
}

/// Decoded geometry, in whatever coordinate space it was produced in
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Points(Vec<DVec2>),
    Lines(Vec<Vec<DVec2>>),
    /// Polygons as lists of rings, outer ring first
    Polygons(Vec<Vec<Vec<DVec2>>>),
}

impl Geometry {
    pub fn map(self, f: impl Fn(DVec2) -> DVec2) -> Geometry {
        let line = |points: Vec<DVec2>| points.into_iter().map(&f).collect::<Vec<_>>();
        match self {
            Geometry::Points(points) => Geometry::Points(line(points)),
            Geometry::Lines(lines) => Geometry::Lines(lines.into_iter().map(line).collect()),
            Geometry::Polygons(polygons) => Geometry::Polygons(
                polygons
                    .into_iter()
                    .map(|rings| rings.into_iter().map(line).collect())
                    .collect(),
            ),
        }
    }

    /// Point to hang a label on: the first point, or the vertex average of
    /// the first line or outer ring.
    pub fn anchor(&self) -> Option<DVec2> {
        let average = |points: &[DVec2]| {
            (!points.is_empty()).then(|| points.iter().copied().sum::<DVec2>() / points.len() as f64)
        };
        match self {
            Geometry::Points(points) => points.first().copied(),
            Geometry::Lines(lines) => lines.first().and_then(|line| average(line)),
            Geometry::Polygons(polygons) => polygons
                .first()
                .and_then(|rings| rings.first())
                .and_then(|ring| average(ring)),
        }
    }
}

/// One layer of a payload with geometries still encoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLayer {
    pub name: String,
    pub geometries: Vec<Vec<u8>>,
    pub kinds: Vec<i32>,
    pub sub_kinds: Vec<i32>,
    pub labels: Vec<String>,
    pub short_names: Vec<String>,
}

/// Geometry-collection parser the tile pipeline depends on.
///
/// Splitting is cheap; geometries are decoded one at a time so parsing can
/// be spread over frames.
pub trait GeometryCollectionDecoder: Send + Sync {
    fn split_layers(&self, payload: &[u8]) -> Result<Vec<RawLayer>, ProtocolError>;

    /// Geometry in longitude/latitude degrees
    fn decode_geometry(&self, geometry: &[u8]) -> Result<Geometry, ProtocolError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryGeometryDecoder;

impl GeometryCollectionDecoder for BinaryGeometryDecoder {
    fn split_layers(&self, payload: &[u8]) -> Result<Vec<RawLayer>, ProtocolError> {
        let mut reader = ByteReader::new(payload);
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(ProtocolError::BadMagic);
        }

        let layer_count = reader.u32()?;
        let mut layers = Vec::new();
        for _ in 0..layer_count {
            let name = reader.string()?;
            let n = reader.u32()? as usize;

            let mut layer = RawLayer {
                name,
                ..Default::default()
            };
            for _ in 0..n {
                let len = reader.u32()? as usize;
                layer.geometries.push(reader.take(len)?.to_vec());
            }
            for _ in 0..n {
                layer.kinds.push(reader.i32()?);
            }
            for _ in 0..n {
                layer.sub_kinds.push(reader.i32()?);
            }
            for _ in 0..n {
                layer.labels.push(reader.string()?);
            }
            for _ in 0..n {
                layer.short_names.push(reader.string()?);
            }
            layers.push(layer);
        }
        Ok(layers)
    }

    fn decode_geometry(&self, geometry: &[u8]) -> Result<Geometry, ProtocolError> {
        let mut reader = ByteReader::new(geometry);
        let decoded = match reader.u8()? {
            POINTS => Geometry::Points(reader.points()?),
            LINES => {
                let count = reader.u32()?;
                Geometry::Lines((0..count).map(|_| reader.points()).collect::<Result<_, _>>()?)
            }
            POLYGONS => {
                let count = reader.u32()?;
                let mut polygons = Vec::new();
                for _ in 0..count {
                    let rings = reader.u32()?;
                    polygons.push((0..rings).map(|_| reader.points()).collect::<Result<_, _>>()?);
                }
                Geometry::Polygons(polygons)
            }
            other => return Err(ProtocolError::UnknownGeometry(other)),
        };
        if reader.remaining() > 0 {
            return Err(ProtocolError::TrailingBytes(reader.remaining()));
        }
        Ok(decoded)
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated(self.offset));
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidString)
    }

    fn points(&mut self) -> Result<Vec<DVec2>, ProtocolError> {
        let count = self.u32()? as usize;
        // Each point needs 16 bytes; reject counts the data cannot hold
        if count > self.remaining() / 16 {
            return Err(ProtocolError::Truncated(self.offset));
        }
        (0..count)
            .map(|_| Ok(DVec2::new(self.f64()?, self.f64()?)))
            .collect()
    }
}

/// Encoder for the same format, used to build test payloads.
#[cfg(test)]
pub mod writer {
    use super::*;
    use crate::multitasking::ManualTime;

    /// Binary decoder that spends `cost_ms` of manual time per geometry
    pub struct SlowDecoder {
        pub time: ManualTime,
        pub cost_ms: u64,
    }

    impl GeometryCollectionDecoder for SlowDecoder {
        fn split_layers(&self, payload: &[u8]) -> Result<Vec<RawLayer>, ProtocolError> {
            BinaryGeometryDecoder.split_layers(payload)
        }

        fn decode_geometry(&self, geometry: &[u8]) -> Result<Geometry, ProtocolError> {
            self.time.advance(self.cost_ms);
            BinaryGeometryDecoder.decode_geometry(geometry)
        }
    }

    pub struct LayerBuilder {
        pub name: String,
        pub features: Vec<(Vec<u8>, i32, i32, String, String)>,
    }

    impl LayerBuilder {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                features: Vec::new(),
            }
        }

        pub fn feature(mut self, geometry: Vec<u8>, kind: i32, label: &str) -> Self {
            self.features
                .push((geometry, kind, 0, label.to_string(), String::new()));
            self
        }
    }

    fn put_string(out: &mut Vec<u8>, value: &str) {
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }

    fn put_points(out: &mut Vec<u8>, points: &[DVec2]) {
        out.extend_from_slice(&(points.len() as u32).to_le_bytes());
        for point in points {
            out.extend_from_slice(&point.x.to_le_bytes());
            out.extend_from_slice(&point.y.to_le_bytes());
        }
    }

    pub fn points(points: &[DVec2]) -> Vec<u8> {
        let mut out = vec![POINTS];
        put_points(&mut out, points);
        out
    }

    pub fn lines(lines: &[Vec<DVec2>]) -> Vec<u8> {
        let mut out = vec![LINES];
        out.extend_from_slice(&(lines.len() as u32).to_le_bytes());
        for line in lines {
            put_points(&mut out, line);
        }
        out
    }

    pub fn polygon(rings: &[Vec<DVec2>]) -> Vec<u8> {
        let mut out = vec![POLYGONS];
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(rings.len() as u32).to_le_bytes());
        for ring in rings {
            put_points(&mut out, ring);
        }
        out
    }

    pub fn payload(layers: &[LayerBuilder]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&(layers.len() as u32).to_le_bytes());
        for layer in layers {
            put_string(&mut out, &layer.name);
            out.extend_from_slice(&(layer.features.len() as u32).to_le_bytes());
            for (geometry, ..) in &layer.features {
                out.extend_from_slice(&(geometry.len() as u32).to_le_bytes());
                out.extend_from_slice(geometry);
            }
            for (_, kind, ..) in &layer.features {
                out.extend_from_slice(&kind.to_le_bytes());
            }
            for (_, _, sub_kind, ..) in &layer.features {
                out.extend_from_slice(&sub_kind.to_le_bytes());
            }
            for (.., label, _) in &layer.features {
                put_string(&mut out, label);
            }
            for (.., short_name) in &layer.features {
                put_string(&mut out, short_name);
            }
        }
        out
    }
}
