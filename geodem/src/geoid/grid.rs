//! Row-cached access to a global undulation grid file.
//!
//! The file holds `nrows` rows of `ncols` little-endian `f32`, north row
//! first, column 0 at the western edge. Rows are read on demand and kept for
//! the lifetime of the grid; each cached row is extended by `margin` cells on
//! both sides with values wrapped around in longitude, so that interpolation
//! windows near 0° and 360° never need special casing.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GeodemError, Result};
use crate::search::SearchPath;

/// Environment variable naming the grid file.
pub const GEOID_FILE_ENV: &str = "GEODEM_GEOID_FILE";

/// Layout of an undulation grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Latitude of row 1, in degrees.
    pub lat_north: f64,
    /// Longitude of raw column 0, in degrees.
    pub lon_west: f64,
    /// Row spacing in degrees (rows run southward).
    pub dlat: f64,
    /// Column spacing in degrees.
    pub dlon: f64,
    pub nrows: usize,
    pub ncols: usize,
    /// Extra cells on each side of a cached row.
    pub margin: usize,
}

impl GridGeometry {
    /// EGM96 on a 15' grid: 721 × 1441 nodes, 90°N..90°S, 0°..360°.
    pub fn egm96_15min() -> Self {
        Self {
            lat_north: 90.0,
            lon_west: 0.0,
            dlat: 0.25,
            dlon: 0.25,
            nrows: 721,
            ncols: 1441,
            margin: 3,
        }
    }

    /// EGM2008 on a 2.5' grid: 4321 × 8641 nodes, 90°N..90°S, 0°..360°.
    pub fn egm2008_2_5min() -> Self {
        Self {
            lat_north: 90.0,
            lon_west: 0.0,
            dlat: 2.5 / 60.0,
            dlon: 2.5 / 60.0,
            nrows: 4321,
            ncols: 8641,
            margin: 3,
        }
    }

    /// Preset whose file size is `len` bytes.
    pub fn for_file_len(len: u64) -> Option<Self> {
        [Self::egm96_15min(), Self::egm2008_2_5min()]
            .into_iter()
            .find(|g| g.file_len() == len)
    }

    /// Number of columns spanning 360° of longitude.
    pub fn period(&self) -> usize {
        (360.0 / self.dlon).round() as usize
    }

    /// Length of a margin-extended row.
    pub fn row_len(&self) -> usize {
        self.ncols + 2 * self.margin
    }

    /// Expected size of the grid file in bytes.
    pub fn file_len(&self) -> u64 {
        (self.nrows * self.ncols * 4) as u64
    }
}

/// Lazily loaded undulation grid.
///
/// The grid is a single-owner context: lookups take `&mut self` and load
/// rows into the cache on first access. [`UndulationGrid::init`] may be
/// called explicitly; otherwise it runs on the first lookup.
#[derive(Debug)]
pub struct UndulationGrid {
    file_name: String,
    search: SearchPath,
    geometry: GridGeometry,
    file: Option<File>,
    path: Option<PathBuf>,
    row_cache: HashMap<usize, Vec<f32>>,
    initialized: bool,
}

impl UndulationGrid {
    /// A grid stored as `file_name` in one of the `search` roots.
    pub fn new<S: Into<String>>(file_name: S, search: SearchPath, geometry: GridGeometry) -> Self {
        Self {
            file_name: file_name.into(),
            search,
            geometry,
            file: None,
            path: None,
            row_cache: HashMap::new(),
            initialized: false,
        }
    }

    /// A grid read from an explicit file path.
    pub fn open<P: AsRef<Path>>(path: P, geometry: GridGeometry) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(file_name, SearchPath::new([root]), geometry)
    }

    /// Configure from `GEODEM_GEOID_FILE`; see [`Self::locate`].
    ///
    /// # Errors
    ///
    /// [`GeodemError::InvalidConfig`] if the variable is unset, otherwise as
    /// [`Self::locate`].
    pub fn from_env(search: &SearchPath) -> Result<Self> {
        let value = std::env::var(GEOID_FILE_ENV).map_err(|_| {
            GeodemError::InvalidConfig(format!("{GEOID_FILE_ENV} environment variable not set"))
        })?;
        Self::locate(&value, search)
    }

    /// Find a grid file and infer its geometry.
    ///
    /// A value naming an existing file is opened directly; a bare file name
    /// is looked up along `search`. The geometry is picked from the file
    /// size (EGM96 15' or EGM2008 2.5').
    ///
    /// # Errors
    ///
    /// [`GeodemError::FileNotFound`] if the file is nowhere on the search
    /// path, and [`GeodemError::InvalidGridFile`] if its size matches no
    /// known grid.
    pub fn locate(name: &str, search: &SearchPath) -> Result<Self> {
        let direct = PathBuf::from(name);
        let path = if direct.is_file() {
            direct
        } else {
            search.resolve(name)?
        };

        let len = std::fs::metadata(&path)?.len();
        let geometry =
            GridGeometry::for_file_len(len).ok_or_else(|| GeodemError::InvalidGridFile {
                path: path.clone(),
                reason: format!("{len} bytes matches no known grid"),
            })?;
        Ok(Self::open(path, geometry))
    }

    /// Open the grid file and clear the row cache.
    ///
    /// # Errors
    ///
    /// [`GeodemError::FileNotFound`] if no search root holds the file, and
    /// [`GeodemError::InvalidGridFile`] if it is too short for the geometry.
    pub fn init(&mut self) -> Result<()> {
        let path = self.search.resolve(&self.file_name)?;
        let file = File::open(&path)?;

        let len = file.metadata()?.len();
        let expected = self.geometry.file_len();
        if len < expected {
            return Err(GeodemError::InvalidGridFile {
                path,
                reason: format!("{len} bytes, expected at least {expected}"),
            });
        }

        debug!(
            path = %path.display(),
            rows = self.geometry.nrows,
            cols = self.geometry.ncols,
            "opened undulation grid"
        );
        self.file = Some(file);
        self.path = Some(path);
        self.row_cache.clear();
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Path of the open grid file, once initialised.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of rows held in the cache.
    pub fn cached_rows(&self) -> usize {
        self.row_cache.len()
    }

    /// Margin-extended row `i` (1-based, row 1 is the northernmost).
    ///
    /// Cells `margin..margin + ncols` hold the raw row; the margins repeat
    /// the columns on the other side of the 0°/360° meridian, or NaN when the
    /// grid does not span the full circle.
    pub fn row(&mut self, i: usize) -> Result<&[f32]> {
        if !self.initialized {
            self.init()?;
        }
        if i == 0 || i > self.geometry.nrows {
            return Err(GeodemError::RowOutOfRange {
                row: i,
                nrows: self.geometry.nrows,
            });
        }

        match self.row_cache.entry(i) {
            Entry::Occupied(e) => Ok(e.into_mut().as_slice()),
            Entry::Vacant(e) => {
                let file = self.file.as_mut().ok_or_else(|| {
                    GeodemError::InvalidConfig("undulation grid file is not open".to_string())
                })?;
                let row = read_row(file, &self.geometry, i)?;
                Ok(e.insert(row).as_slice())
            }
        }
    }

    /// Value at row `i`, extended column `j` (both 1-based).
    pub fn cell(&mut self, i: usize, j: usize) -> Result<f32> {
        let len = self.geometry.row_len();
        if j == 0 || j > len {
            return Err(GeodemError::ColumnOutOfRange { col: j, len });
        }
        Ok(self.row(i)?[j - 1])
    }
}

/// Read raw row `i` and extend it with wrapped margins.
fn read_row(file: &mut File, geometry: &GridGeometry, i: usize) -> Result<Vec<f32>> {
    let ncols = geometry.ncols;
    let offset = ((i - 1) * ncols * 4) as u64;
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = vec![0u8; ncols * 4];
    file.read_exact(&mut bytes)?;

    let raw: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    let period = geometry.period() as i64;
    let margin = geometry.margin as i64;
    let row = (0..geometry.row_len() as i64)
        .map(|k| {
            let src = k - margin;
            let src = if (0..ncols as i64).contains(&src) {
                src
            } else {
                src.rem_euclid(period)
            };
            raw.get(src as usize).copied().unwrap_or(f32::NAN)
        })
        .collect();
    Ok(row)
}
