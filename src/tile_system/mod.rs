//! Basemap tiles: fetch, parse, rasterize, cache and evict per cell.

pub mod cells;
pub mod components;
pub mod donor;
pub mod loader;
pub mod parser;
pub mod protocol;
pub mod raster;
pub mod renderer;
pub mod transport;
pub mod types;
pub mod url;

pub use cells::BasemapCellsRemovingSystem;
pub use components::*;
pub use donor::DonorTileCalculator;
pub use loader::{BasemapSource, TileLoadingSystem};
pub use parser::{ParseTask, TileFeature, TileFeatures};
pub use protocol::{BinaryGeometryDecoder, Geometry, GeometryCollectionDecoder, ProtocolError};
pub use renderer::{LayerStyle, MapConfig};
pub use transport::{FetchExecutor, HttpTransport, ResponseSlot, TileFetcher, TileTransport};
pub use types::{CellLayerKind, Tile, TileDrawOp, TileError};
pub use url::{DomainRotation, TileUrlTemplate};
