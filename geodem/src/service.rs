//! DEM tile cache and elevation service.
//!
//! This module provides [`GdemService`], a high-level interface for querying
//! elevation data of one dataset with on-demand tile loading and caching.
//!
//! ```ignore
//! use geodem::{Dataset, GdemService, SearchPath};
//!
//! let service = GdemService::builder(Dataset::Srtm)
//!     .search_path(SearchPath::new(["/data/srtm", "/mnt/archive/srtm"]))
//!     .cache_size(64)
//!     .build()?;
//!
//! let elevation = service.point_elevation(23.7, 37.9)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use moka::sync::Cache;
use tracing::debug;

use crate::decoder::{Decoders, LoadOptions, TileDecoder};
use crate::error::{GeodemError, Result};
use crate::geoid::{UndulationGrid, GEOID_FILE_ENV, UNDULATION_SENTINEL};
use crate::scheme::{normalize_lon180, Dataset, TileIndex, TileScheme};
use crate::search::SearchPath;
use crate::tile::DemTile;
use crate::transform::{CoordinateTransform, Identity};

/// Search path variable (platform path-list syntax).
pub const PATH_ENV: &str = "GEODEM_PATH";
/// Dataset name variable.
pub const DATASET_ENV: &str = "GEODEM_DATASET";
/// Optional cap on the number of loaded tiles.
pub const CACHE_SIZE_ENV: &str = "GEODEM_CACHE_SIZE";
/// Nodata value for tiles that do not declare one.
pub const NODATA_ENV: &str = "GEODEM_NODATA";

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of lookups served from memory.
    pub hit_count: u64,
    /// Number of lookups that had to go to disk.
    pub miss_count: u64,
    /// Number of times the search path was probed for a file.
    pub probe_count: u64,
    /// Number of tile names known to be missing.
    pub not_found_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Outcome of resolving a tile name through the cache.
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    /// Already loaded.
    Cached(Arc<DemTile>),
    /// Loaded from disk by this lookup.
    Loaded(Arc<DemTile>),
    /// Missing from every search root (possibly remembered from earlier).
    NotFound,
}

impl Lookup {
    pub(crate) fn tile(&self) -> Option<&Arc<DemTile>> {
        match self {
            Lookup::Cached(tile) | Lookup::Loaded(tile) => Some(tile),
            Lookup::NotFound => None,
        }
    }
}

/// Elevation service over one tiled dataset.
///
/// `GdemService` maps query points to tiles, loads tiles on first use and
/// keeps them for its lifetime (or up to the configured capacity). Names of
/// tiles that are absent from every search root are remembered, so a missing
/// tile costs one disk probe, not one per query.
///
/// All methods take `&self`; the service can be shared between threads
/// behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// use geodem::{Dataset, GdemService, SearchPath};
///
/// let service = GdemService::new(Dataset::Aw3d30, SearchPath::new(["/data/aw3d30"]));
///
/// // Query elevation - tile is loaded automatically
/// let h = service.point_elevation(138.7, 35.36)?;
///
/// // Second query in the same tile is answered from memory
/// let h2 = service.point_elevation_interpolated(138.71, 35.37)?;
///
/// let stats = service.cache_stats();
/// println!("Cache hit rate: {:.1}%", stats.hit_rate() * 100.0);
/// ```
pub struct GdemService {
    scheme: Box<dyn TileScheme>,
    search: SearchPath,
    decoders: Decoders,
    transform: Arc<dyn CoordinateTransform>,
    nodata: Option<f32>,
    capacity: Option<u64>,
    /// Loaded tiles, keyed by file name.
    loaded: Cache<String, Arc<DemTile>>,
    /// File names known to be missing.
    not_found: RwLock<HashSet<String>>,
    /// The tile that answered the previous point query.
    last_hit: RwLock<Option<(TileIndex, Arc<DemTile>)>>,
    geoid: Option<Mutex<UndulationGrid>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    probe_count: AtomicU64,
}

impl fmt::Debug for GdemService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GdemService")
            .field("dataset", &self.dataset())
            .field("search", &self.search)
            .field("transform", &self.transform)
            .field("capacity", &self.capacity)
            .field("geoid", &self.geoid.is_some())
            .finish_non_exhaustive()
    }
}

impl GdemService {
    /// Create a service with default settings: identity transform, GeoTIFF
    /// decoder, unbounded cache.
    pub fn new(dataset: Dataset, search: SearchPath) -> Self {
        GdemServiceBuilder::new(dataset).search_path(search).assemble()
    }

    /// Create a builder for more configuration options.
    pub fn builder(dataset: Dataset) -> GdemServiceBuilder {
        GdemServiceBuilder::new(dataset)
    }

    /// Attach an undulation grid used to turn ellipsoidal heights into
    /// orthometric ones.
    pub fn with_geoid(mut self, grid: UndulationGrid) -> Self {
        self.geoid = Some(Mutex::new(grid));
        self
    }

    pub fn dataset(&self) -> Dataset {
        self.scheme.dataset()
    }

    pub fn scheme(&self) -> &dyn TileScheme {
        self.scheme.as_ref()
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    pub fn transform(&self) -> &dyn CoordinateTransform {
        self.transform.as_ref()
    }

    pub fn decoders(&self) -> &Decoders {
        &self.decoders
    }

    pub fn has_geoid(&self) -> bool {
        self.geoid.is_some()
    }

    /// Maximum number of loaded tiles, if bounded.
    pub fn cache_capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// User coordinates to the dataset's native frame, with longitudes of
    /// geographic datasets wrapped to `[-180, 180)`.
    pub fn to_native(&self, x: f64, y: f64) -> (f64, f64) {
        let (nx, ny) = self.transform.to_native(x, y);
        if self.scheme.is_geographic() {
            (normalize_lon180(nx), ny)
        } else {
            (nx, ny)
        }
    }

    /// Get the elevation at `(x, y)` (user projection) from the pixel
    /// containing the point.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(elevation))` - height in metres
    /// - `Ok(None)` - nodata pixel, missing tile, point outside the dataset,
    ///   or no undulation available for an ellipsoidal dataset
    ///
    /// # Errors
    ///
    /// Returns an error if a tile file exists but cannot be decoded.
    pub fn point_elevation(&self, x: f64, y: f64) -> Result<Option<f64>> {
        let (nx, ny) = self.to_native(x, y);
        let Some(tile) = self.tile_at(nx, ny)? else {
            return Ok(None);
        };
        let height = tile.get_elevation(nx, ny);
        self.to_orthometric(height, &tile, nx, ny)
    }

    /// Same as [`Self::point_elevation`] with bilinear interpolation between
    /// the four surrounding pixel centres.
    pub fn point_elevation_interpolated(&self, x: f64, y: f64) -> Result<Option<f64>> {
        let (nx, ny) = self.to_native(x, y);
        let Some(tile) = self.tile_at(nx, ny)? else {
            return Ok(None);
        };
        let height = tile.get_elevation_interpolated(nx, ny);
        self.to_orthometric(height, &tile, nx, ny)
    }

    /// Elevations for many points; points that fail to resolve yield `None`.
    ///
    /// Consecutive points in the same tile are answered from the last-hit
    /// tile without touching the cache.
    pub fn point_elevations(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        points
            .iter()
            .map(|&(x, y)| {
                self.point_elevation(x, y).unwrap_or_else(|e| {
                    debug!(x, y, error = %e, "elevation lookup failed");
                    None
                })
            })
            .collect()
    }

    /// Tile containing a native point, loading it if needed.
    ///
    /// Points on a shared edge belong to the tile `frame_number` picks,
    /// whichever tile answered the previous query.
    fn tile_at(&self, x: f64, y: f64) -> Result<Option<Arc<DemTile>>> {
        let Some(index) = self.scheme.frame_number(x, y, true) else {
            return Ok(None);
        };
        {
            let last = self.last_hit.read().map_err(|_| GeodemError::LockPoisoned)?;
            if let Some((last_index, tile)) = last.as_ref() {
                if *last_index == index {
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(Arc::clone(tile)));
                }
            }
        }

        let name = self.scheme.frame_name(index);
        let Some(tile) = self.resolve_name(&name)?.tile().cloned() else {
            return Ok(None);
        };

        *self.last_hit.write().map_err(|_| GeodemError::LockPoisoned)? =
            Some((index, Arc::clone(&tile)));
        Ok(Some(tile))
    }

    /// Resolve a tile index through the cache.
    pub(crate) fn resolve_frame(&self, index: TileIndex) -> Result<Lookup> {
        self.resolve_name(&self.scheme.frame_name(index))
    }

    fn resolve_name(&self, name: &str) -> Result<Lookup> {
        if let Some(tile) = self.loaded.get(name) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(Lookup::Cached(tile));
        }
        if self.is_known_missing(name)? {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(Lookup::NotFound);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        match self.open_frame_file(name) {
            Ok(tile) => {
                let tile = Arc::new(tile);
                self.loaded.insert(name.to_string(), Arc::clone(&tile));
                debug!(name, "loaded tile");
                Ok(Lookup::Loaded(tile))
            }
            Err(GeodemError::FileNotFound { .. }) => {
                self.not_found
                    .write()
                    .map_err(|_| GeodemError::LockPoisoned)?
                    .insert(name.to_string());
                debug!(name, "tile not found, remembering");
                Ok(Lookup::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `name` was already probed and found missing.
    pub fn is_known_missing(&self, name: &str) -> Result<bool> {
        Ok(self
            .not_found
            .read()
            .map_err(|_| GeodemError::LockPoisoned)?
            .contains(name))
    }

    /// Find `name` on the search path and decode it, bypassing the cache.
    ///
    /// # Errors
    ///
    /// - [`GeodemError::FileNotFound`] if no root holds an openable copy
    /// - [`GeodemError::UnsupportedFormat`] if no decoder handles the file
    /// - the decoder's error if the file cannot be decoded
    pub fn open_frame_file(&self, name: &str) -> Result<DemTile> {
        self.probe_count.fetch_add(1, Ordering::Relaxed);
        let path = self.search.resolve(name)?;
        let decoder: &dyn TileDecoder = self.decoders.for_path(&path)?;
        let options = LoadOptions {
            orthometric: self.scheme.is_orthometric(),
            nodata: self.nodata,
        };
        decoder.load(&path, &options)
    }

    /// Subtract the geoid undulation from an ellipsoidal height.
    fn to_orthometric(
        &self,
        height: Option<f64>,
        tile: &DemTile,
        lon: f64,
        lat: f64,
    ) -> Result<Option<f64>> {
        let (Some(h), Some(geoid)) = (height, self.geoid.as_ref()) else {
            return Ok(height);
        };
        if tile.is_orthometric() {
            return Ok(Some(h));
        }
        let n = geoid
            .lock()
            .map_err(|_| GeodemError::LockPoisoned)?
            .undulation(lon, lat)?;
        if n == UNDULATION_SENTINEL {
            return Ok(None);
        }
        Ok(Some(h - n))
    }

    /// Snapshot of the loaded tiles, sorted by file name.
    pub fn loaded_tiles(&self) -> Vec<(String, Arc<DemTile>)> {
        let mut tiles: Vec<_> = self
            .loaded
            .iter()
            .map(|(name, tile)| (name.to_string(), tile))
            .collect();
        tiles.sort_by(|a, b| a.0.cmp(&b.0));
        tiles
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.loaded.run_pending_tasks();
        let not_found_count = self
            .not_found
            .read()
            .map(|set| set.len() as u64)
            .unwrap_or_default();
        CacheStats {
            entry_count: self.loaded.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            probe_count: self.probe_count.load(Ordering::Relaxed),
            not_found_count,
        }
    }

    /// Forget every loaded tile, every known-missing name and the last hit.
    ///
    /// Statistics counters are not reset.
    pub fn clear_cache(&self) {
        self.loaded.invalidate_all();
        self.loaded.run_pending_tasks();
        if let Ok(mut set) = self.not_found.write() {
            set.clear();
        }
        if let Ok(mut last) = self.last_hit.write() {
            *last = None;
        }
    }

    /// Release all cached state and drop the service.
    pub fn destroy(self) {
        self.clear_cache();
    }
}

/// Builder for [`GdemService`].
///
/// # Example
///
/// ```ignore
/// use geodem::GdemServiceBuilder;
///
/// // Reads GEODEM_PATH, GEODEM_DATASET, GEODEM_CACHE_SIZE, GEODEM_NODATA
/// let service = GdemServiceBuilder::from_env()?.build()?;
/// ```
#[derive(Debug)]
pub struct GdemServiceBuilder {
    dataset: Dataset,
    search: SearchPath,
    cache_size: Option<u64>,
    nodata: Option<f32>,
    decoders: Decoders,
    transform: Arc<dyn CoordinateTransform>,
    geoid: Option<UndulationGrid>,
}

impl GdemServiceBuilder {
    /// Create a builder for `dataset` with an empty search path.
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            search: SearchPath::default(),
            cache_size: None,
            nodata: None,
            decoders: Decoders::default(),
            transform: Arc::new(Identity),
            geoid: None,
        }
    }

    /// Create a builder from environment variables.
    ///
    /// Reads:
    /// - `GEODEM_PATH`: search path (required)
    /// - `GEODEM_DATASET`: dataset name (default `srtm`)
    /// - `GEODEM_CACHE_SIZE`: maximum loaded tiles (default unbounded)
    /// - `GEODEM_NODATA`: fallback nodata value
    /// - `GEODEM_GEOID_FILE`: undulation grid, looked up on the search path
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::InvalidConfig`] if `GEODEM_PATH` is unset or a
    /// variable cannot be parsed, and [`GeodemError::UnknownDataset`] for an
    /// unknown dataset name.
    pub fn from_env() -> Result<Self> {
        let search = SearchPath::from_env(PATH_ENV)?;

        let dataset = match std::env::var(DATASET_ENV) {
            Ok(name) if !name.trim().is_empty() => name.parse()?,
            _ => Dataset::Srtm,
        };

        let cache_size = env_parse::<u64>(CACHE_SIZE_ENV)?;
        let nodata = env_parse::<f32>(NODATA_ENV)?;

        let geoid = if std::env::var_os(GEOID_FILE_ENV).is_some() {
            Some(UndulationGrid::from_env(&search)?)
        } else {
            None
        };

        Ok(Self {
            dataset,
            search,
            cache_size,
            nodata,
            decoders: Decoders::default(),
            transform: Arc::new(Identity),
            geoid,
        })
    }

    /// Replace the search path.
    pub fn search_path(mut self, search: SearchPath) -> Self {
        self.search = search;
        self
    }

    /// Append a search root.
    pub fn root<P: AsRef<std::path::Path>>(mut self, root: P) -> Self {
        self.search.push(root);
        self
    }

    /// Cap the number of loaded tiles kept in memory.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Nodata value for tiles that do not declare their own.
    pub fn nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn decoders(mut self, decoders: Decoders) -> Self {
        self.decoders = decoders;
        self
    }

    /// Decoder for `.img` tiles.
    pub fn img_decoder(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.decoders = self.decoders.with_img(decoder);
        self
    }

    /// Transform between the caller's coordinates and the dataset's frame.
    pub fn transform(mut self, transform: Arc<dyn CoordinateTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Undulation grid for ellipsoidal datasets.
    pub fn geoid(mut self, grid: UndulationGrid) -> Self {
        self.geoid = Some(grid);
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::InvalidConfig`] if the search path is empty or
    /// the cache size is zero.
    pub fn build(self) -> Result<GdemService> {
        if self.search.is_empty() {
            return Err(GeodemError::InvalidConfig(
                "search path has no directory".to_string(),
            ));
        }
        if self.cache_size == Some(0) {
            return Err(GeodemError::InvalidConfig(
                "cache size must be positive".to_string(),
            ));
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> GdemService {
        let mut cache = Cache::builder();
        if let Some(size) = self.cache_size {
            cache = cache.max_capacity(size);
        }

        GdemService {
            scheme: self.dataset.scheme(),
            search: self.search,
            decoders: self.decoders,
            transform: self.transform,
            nodata: self.nodata,
            capacity: self.cache_size,
            loaded: cache.build(),
            not_found: RwLock::new(HashSet::new()),
            last_hit: RwLock::new(None),
            geoid: self.geoid.map(Mutex::new),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            probe_count: AtomicU64::new(0),
        }
    }
}

/// Parse an optional environment variable.
fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GeodemError::InvalidConfig(format!("{var}: cannot parse {value:?}"))),
        _ => Ok(None),
    }
}
