/// Constants for the live map engine

/// Tile edge length in pixels at an integer zoom level
pub const TILE_SIZE: u32 = 256;

/// Edge length of the square world map rect (world units). At zoom 0 one
/// world unit is one pixel, so the whole world fits in a single tile.
pub const WORLD_MAP_SIZE: f64 = TILE_SIZE as f64;

/// Mercator latitude limit that makes the projected world square
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

pub const MIN_ZOOM_LEVEL: u8 = 1; // Furthest zoom out (least detail)
pub const MAX_ZOOM_LEVEL: u8 = 15; // Closest zoom in (most detail)

/// Initial view center, longitude and latitude in degrees
pub const DEFAULT_CENTER_LON: f64 = 0.0;
pub const DEFAULT_CENTER_LAT: f64 = 20.0;

pub const USER_AGENT: &str = concat!("livemap/", env!("CARGO_PKG_VERSION"));
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Scheduler budget per frame in milliseconds
pub const COMPUTATION_FRAME_TIME_MS: u64 = 10;

/// Cached cells kept around after leaving the view
pub const TILE_CACHE_LIMIT: usize = 36;

/// Raster basemap hosts, picked round-robin
pub const DEFAULT_RASTER_DOMAINS: [&str; 3] = [
    "https://a.tile.openstreetmap.org/{z}/{x}/{y}.png",
    "https://b.tile.openstreetmap.org/{z}/{x}/{y}.png",
    "https://c.tile.openstreetmap.org/{z}/{x}/{y}.png",
];
