use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bevy::math::{DVec2, UVec2};
use bevy::prelude::*;

use super::constants::*;
use crate::projection::MAX_CELL_ZOOM;
use crate::tile_system::MapConfig;

/// Where basemap cells come from
#[derive(Debug, Clone)]
pub enum BasemapConfig {
    /// Binary geometry-collection tiles rasterized locally
    Vector {
        url_template: String,
        map_config: MapConfig,
    },
    /// Pre-rendered image tiles; domains are URL templates used round-robin
    Raster { domains: Vec<String> },
}

impl Default for BasemapConfig {
    fn default() -> Self {
        BasemapConfig::Raster {
            domains: DEFAULT_RASTER_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Engine configuration
#[derive(Resource, Debug, Clone)]
pub struct LiveMapSettings {
    pub viewport_size: UVec2,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub initial_zoom: f64,
    /// Longitude, latitude in degrees
    pub initial_position: DVec2,
    /// Wall-clock budget for microtasks per frame
    pub computation_frame_time: Duration,
    /// Steps per microtask per scheduler pass
    pub quantum_iterations: u32,
    pub tile_cache_limit: usize,
    /// Extra rings of cells loaded around the view
    pub prefetch_margin: u32,
    pub basemap: BasemapConfig,
    /// TTF used for labels and error text
    pub font_path: Option<PathBuf>,
    pub debug_mode: bool,
    pub perf_stats: bool,
}

impl Default for LiveMapSettings {
    fn default() -> Self {
        Self {
            viewport_size: UVec2::new(800, 600),
            min_zoom: MIN_ZOOM_LEVEL,
            max_zoom: MAX_ZOOM_LEVEL,
            initial_zoom: 5.0,
            initial_position: DVec2::new(DEFAULT_CENTER_LON, DEFAULT_CENTER_LAT),
            computation_frame_time: Duration::from_millis(COMPUTATION_FRAME_TIME_MS),
            quantum_iterations: 64,
            tile_cache_limit: TILE_CACHE_LIMIT,
            prefetch_margin: 0,
            basemap: BasemapConfig::default(),
            font_path: None,
            debug_mode: false,
            perf_stats: false,
        }
    }
}

impl LiveMapSettings {
    /// Defaults overridden by `LIVEMAP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(domains) = var("LIVEMAP_RASTER_DOMAINS") {
            settings.basemap = BasemapConfig::Raster {
                domains: domains
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(String::from)
                    .collect(),
            };
        }
        if let Some(url_template) = var("LIVEMAP_VECTOR_URL") {
            settings.basemap = BasemapConfig::Vector {
                url_template,
                map_config: MapConfig::default(),
            };
        }
        if let Some(path) = var("LIVEMAP_FONT") {
            settings.font_path = Some(PathBuf::from(path));
        }
        if let Some(zoom) = var("LIVEMAP_ZOOM") {
            settings.initial_zoom = zoom
                .parse()
                .with_context(|| format!("LIVEMAP_ZOOM is not a number: {zoom}"))?;
        }
        if let Some(zoom) = var("LIVEMAP_MIN_ZOOM") {
            settings.min_zoom = zoom
                .parse()
                .with_context(|| format!("LIVEMAP_MIN_ZOOM is not a zoom level: {zoom}"))?;
        }
        if let Some(zoom) = var("LIVEMAP_MAX_ZOOM") {
            settings.max_zoom = zoom
                .parse()
                .with_context(|| format!("LIVEMAP_MAX_ZOOM is not a zoom level: {zoom}"))?;
        }
        if let Some(ms) = var("LIVEMAP_FRAME_TIME_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("LIVEMAP_FRAME_TIME_MS is not an integer: {ms}"))?;
            anyhow::ensure!(ms > 0, "LIVEMAP_FRAME_TIME_MS must be at least 1");
            settings.computation_frame_time = Duration::from_millis(ms);
        }
        if let Some(flag) = var("LIVEMAP_DEBUG") {
            settings.debug_mode = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Some(flag) = var("LIVEMAP_PERF_STATS") {
            settings.perf_stats = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let BasemapConfig::Raster { domains } = &settings.basemap {
            anyhow::ensure!(!domains.is_empty(), "no raster basemap domains configured");
        }
        settings.max_zoom = settings.max_zoom.min(MAX_CELL_ZOOM);
        anyhow::ensure!(
            settings.min_zoom <= settings.max_zoom,
            "min zoom {} is above max zoom {}",
            settings.min_zoom,
            settings.max_zoom
        );
        settings.initial_zoom = settings
            .initial_zoom
            .clamp(settings.min_zoom as f64, settings.max_zoom as f64);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let settings = LiveMapSettings::from_vars(vars(&[
            ("LIVEMAP_RASTER_DOMAINS", "https://x/{z}/{x}/{y}.png, https://y/{z}/{x}/{y}.png"),
            ("LIVEMAP_ZOOM", "40"),
            ("LIVEMAP_FRAME_TIME_MS", "4"),
            ("LIVEMAP_DEBUG", "true"),
        ]))
        .unwrap();

        match &settings.basemap {
            BasemapConfig::Raster { domains } => assert_eq!(domains.len(), 2),
            other => panic!("unexpected basemap {other:?}"),
        }
        assert_eq!(settings.initial_zoom, MAX_ZOOM_LEVEL as f64);
        assert_eq!(settings.computation_frame_time, Duration::from_millis(4));
        assert!(settings.debug_mode);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(LiveMapSettings::from_vars(vars(&[("LIVEMAP_ZOOM", "far")])).is_err());
        assert!(LiveMapSettings::from_vars(vars(&[("LIVEMAP_RASTER_DOMAINS", " , ")])).is_err());
        assert!(LiveMapSettings::from_vars(vars(&[("LIVEMAP_FRAME_TIME_MS", "0")])).is_err());
        assert!(LiveMapSettings::from_vars(vars(&[("LIVEMAP_MIN_ZOOM", "9"), ("LIVEMAP_MAX_ZOOM", "4")])).is_err());
    }

    #[test]
    fn test_max_zoom_is_capped_at_deepest_cell_level() {
        let settings = LiveMapSettings::from_vars(vars(&[("LIVEMAP_MAX_ZOOM", "40"), ("LIVEMAP_ZOOM", "40")])).unwrap();
        assert_eq!(settings.max_zoom, MAX_CELL_ZOOM);
        assert_eq!(settings.initial_zoom, MAX_CELL_ZOOM as f64);
    }
}
