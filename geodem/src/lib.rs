//! # geodem - Tiled DEM Cache and Geoid Undulation Library
//!
//! Library for querying elevations from global DEM datasets stored as one
//! raster file per tile, and for interpolating geoid undulations from a
//! global binary grid.
//!
//! ## Features
//!
//! - **Tile addressing** for SRTM, ASTER GDEM, AW3D30, TanDEM-X and the
//!   Greek national grids ([`scheme`])
//! - **On-demand loading** with a shared tile cache and a negative cache for
//!   missing tiles ([`GdemService`])
//! - **Window queries and mosaics** over several tiles ([`window`])
//! - **Geoid undulations** from EGM96/EGM2008-style grids with spline or
//!   bilinear interpolation ([`geoid`])
//!
//! ## Quick Start
//!
//! ```ignore
//! use geodem::{BoundingBox, Dataset, GdemService, SearchPath};
//!
//! let service = GdemService::new(Dataset::Srtm, SearchPath::new(["/data/srtm"]));
//!
//! // Point query: the tile srtm_41_05.tif is loaded on first use
//! let h = service.point_elevation(23.72, 37.97)?;
//!
//! // Mosaic of every tile overlapping a window
//! let dem = service.join_dem(&BoundingBox::new(21.0, 36.5, 26.0, 41.0))?;
//! ```
//!
//! ## Tile Format
//!
//! Tiles are single-band GeoTIFFs georeferenced with the ModelTiepoint and
//! ModelPixelScale tags; other formats are read through a custom
//! [`TileDecoder`].

pub mod decoder;
pub mod error;
pub mod geoid;
pub mod scheme;
pub mod search;
pub mod service;
pub mod tile;
pub mod transform;
pub mod window;

// Re-export main types at crate root for convenience
pub use decoder::{write_geotiff, Decoders, GeoTiffDecoder, LoadOptions, TileDecoder};
pub use error::{GeodemError, Result};
pub use geoid::{GridGeometry, InterpolationParams, UndulationGrid, UNDULATION_SENTINEL};
pub use scheme::{BoundingBox, Dataset, TileBBox, TileIndex, TileScheme};
pub use search::SearchPath;
pub use service::{CacheStats, GdemService, GdemServiceBuilder};
pub use tile::{DemTile, Node, PixelGrid};
pub use transform::{CoordinateTransform, Identity};
pub use window::{FrameInfo, NodeFilter, WindowResult};
