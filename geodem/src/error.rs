//! Error types for the geodem library.

use std::path::PathBuf;
use thiserror::Error;

use crate::scheme::BoundingBox;

/// Errors that can occur when working with DEM tiles and geoid grids.
///
/// A tile that is simply absent from every search root is *not* surfaced as
/// an error by the query methods: it is remembered and reported as `None`.
/// [`GeodemError::FileNotFound`] is only returned by the lower-level
/// operations that open files directly.
#[derive(Error, Debug)]
pub enum GeodemError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The file was not found, or could not be opened, in any search root.
    #[error("file not found or inaccessible: {name} (searched {count} root(s))", count = .searched.len())]
    FileNotFound { name: String, searched: Vec<PathBuf> },

    /// The dataset name does not match any supported tiling scheme.
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    /// No decoder is registered for the file's format.
    #[error("no tile decoder for {path}")]
    UnsupportedFormat { path: PathBuf },

    /// A GeoTIFF is missing the tags needed to georeference it.
    #[error("invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Raster sample count does not match its declared dimensions.
    #[error("raster has {actual} samples, expected {expected}")]
    InvalidRaster { expected: usize, actual: usize },

    /// Tiles that should share one pixel grid do not.
    #[error("tile pixel grids do not align: {0}")]
    MismatchedPixelGrid(String),

    /// A window query produced no tiles and the caller asked to fail.
    #[error("no tiles found in window {bbox}")]
    NoTilesInWindow { bbox: BoundingBox },

    /// A window does not intersect the grid.
    #[error("window {bbox} is empty or outside the grid")]
    EmptyWindow { bbox: BoundingBox },

    /// The undulation grid file does not match the configured geometry.
    #[error("invalid grid file {path}: {reason}")]
    InvalidGridFile { path: PathBuf, reason: String },

    /// Row number outside the undulation grid (rows are 1-based).
    #[error("grid row {row} out of range 1..={nrows}")]
    RowOutOfRange { row: usize, nrows: usize },

    /// Column number outside the margin-extended grid row (1-based).
    #[error("grid column {col} out of range 1..={len}")]
    ColumnOutOfRange { col: usize, len: usize },

    /// Missing or malformed configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cache lock was poisoned (a thread panicked while holding it).
    #[error("tile cache lock was poisoned")]
    LockPoisoned,
}

/// Result type alias using [`GeodemError`].
pub type Result<T> = std::result::Result<T, GeodemError>;
