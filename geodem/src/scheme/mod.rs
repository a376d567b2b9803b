//! Tile addressing for the supported DEM datasets.
//!
//! Every dataset splits its coverage into rectangular frames (tiles) stored
//! one per file. A [`TileScheme`] maps a point in the dataset's native frame
//! to the integer index of the tile containing it, the index to the file
//! name on disk, and the index back to the tile's extent.
//!
//! # Index convention
//!
//! A [`TileIndex`] is a pair `(nl, np)`: `nl` runs along longitude (or
//! easting), `np` along latitude (or northing). Geographically adjacent
//! tiles differ by exactly one in the corresponding component, which lets
//! window queries iterate over plain integer ranges.
//!
//! # Example
//!
//! ```
//! use geodem::scheme::{Dataset, TileIndex};
//!
//! let scheme = Dataset::Srtm.scheme();
//! let index = scheme.frame_number(23.0, 38.0, true).unwrap();
//! assert_eq!(index, TileIndex::new(41, 5));
//! assert_eq!(scheme.frame_name(index), "srtm_41_05.tif");
//! ```

mod geographic;
mod greek;

use std::fmt;
use std::str::FromStr;

use crate::error::GeodemError;

pub use geographic::{DegreeScheme, Srtm5Scheme, TandemXScheme};
pub use greek::GreekScheme;

/// Integer index of a tile within a dataset's tiling grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    /// Index along longitude / easting.
    pub nl: i32,
    /// Index along latitude / northing.
    pub np: i32,
}

impl TileIndex {
    pub fn new(nl: i32, np: i32) -> Self {
        Self { nl, np }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.nl, self.np)
    }
}

/// An axis-aligned rectangle.
///
/// Used both for tile extents in a dataset's native frame (see [`TileBBox`])
/// and for query windows in user coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western boundary (minimum longitude or easting).
    pub min_x: f64,
    /// Southern boundary (minimum latitude or northing).
    pub min_y: f64,
    /// Eastern boundary.
    pub max_x: f64,
    /// Northern boundary.
    pub max_y: f64,
}

/// Extent of a tile in the dataset's native frame.
pub type TileBBox = BoundingBox;

impl BoundingBox {
    /// Create a new bounding box from its west, south, east and north edges.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounding box of two arbitrary opposite corners.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    /// Check whether a point lies inside the box (edges included).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check whether two boxes overlap with a non-empty interior.
    ///
    /// Boxes that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Addressing functions of one dataset's tiling.
///
/// Implementations must keep the three required methods mutually
/// consistent: for every point `p` inside the dataset's domain,
/// `frame_xymm(frame_number(p))` contains `p` and
/// `frame_name(frame_number(p))` is the file that holds it.
pub trait TileScheme: Send + Sync + fmt::Debug {
    /// The dataset this scheme addresses.
    fn dataset(&self) -> Dataset;

    /// Index of the tile containing `(x, y)`.
    ///
    /// With `check` set, returns `None` when the point lies outside the
    /// dataset's coverage. With `check` unset the arithmetic is applied to
    /// any finite point, which window queries rely on for their corners.
    fn frame_number(&self, x: f64, y: f64, check: bool) -> Option<TileIndex>;

    /// File name of the tile at `index`.
    fn frame_name(&self, index: TileIndex) -> String;

    /// Extent of the tile at `index`, or `None` if `check` is set and the
    /// index lies outside the dataset's valid range.
    fn frame_xymm(&self, index: TileIndex, check: bool) -> Option<TileBBox>;

    /// Wildcard pattern (`*`, `?`) matching this dataset's file names.
    fn frame_pattern(&self) -> String;

    /// Whether the stored heights are orthometric (geoid-referenced).
    fn is_orthometric(&self) -> bool {
        true
    }

    /// Whether the native frame is longitude/latitude in degrees.
    fn is_geographic(&self) -> bool {
        true
    }

    /// File name of the tile containing `(x, y)`, if covered.
    fn frame_name_at(&self, x: f64, y: f64) -> Option<String> {
        self.frame_number(x, y, true)
            .map(|index| self.frame_name(index))
    }
}

/// Supported DEM datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// CGIAR SRTM v4.1, 5° × 5° tiles.
    Srtm,
    /// USGS SRTM 1 arc-second v3, 1° × 1° tiles.
    Srtm1Arc,
    /// ASTER GDEM v2.
    AsterV2,
    /// ALOS World 3D 30 m.
    Aw3d30,
    /// ALOS World 3D 30 m, version 3.1.
    Aw3d30V31,
    /// TanDEM-X intermediate DEM (0.4 arc-second).
    TandemXIntermediate,
    /// Height error map of the TanDEM-X intermediate DEM.
    TandemXIntermediateHem,
    /// TanDEM-X DEM, 0.4 arc-second (~12 m).
    TandemX12,
    /// Height error map of the 12 m TanDEM-X DEM.
    TandemX12Hem,
    /// TanDEM-X DEM, 1 arc-second (~30 m).
    TandemX30,
    /// Height error map of the 30 m TanDEM-X DEM.
    TandemX30Hem,
    /// TanDEM-X DEM, 3 arc-second (~90 m).
    TandemX90,
    /// Height error map of the 90 m TanDEM-X DEM.
    TandemX90Hem,
    /// Greek national grid, legacy 4 km × 3 km `.img` sheets.
    GreekOld,
    /// Greek national grid, LSO 4 km × 3 km sheets.
    GreekLso,
    /// Greek national grid, VLSO 800 m × 600 m sheets.
    GreekVlso,
}

impl Dataset {
    /// Every supported dataset.
    pub const ALL: [Dataset; 16] = [
        Dataset::Srtm,
        Dataset::Srtm1Arc,
        Dataset::AsterV2,
        Dataset::Aw3d30,
        Dataset::Aw3d30V31,
        Dataset::TandemXIntermediate,
        Dataset::TandemXIntermediateHem,
        Dataset::TandemX12,
        Dataset::TandemX12Hem,
        Dataset::TandemX30,
        Dataset::TandemX30Hem,
        Dataset::TandemX90,
        Dataset::TandemX90Hem,
        Dataset::GreekOld,
        Dataset::GreekLso,
        Dataset::GreekVlso,
    ];

    /// Canonical name, as accepted by [`Dataset::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Srtm => "srtm",
            Dataset::Srtm1Arc => "srtm1arc",
            Dataset::AsterV2 => "aster",
            Dataset::Aw3d30 => "aw3d30",
            Dataset::Aw3d30V31 => "aw3d30v31",
            Dataset::TandemXIntermediate => "tandemx-idem",
            Dataset::TandemXIntermediateHem => "tandemx-idem-hem",
            Dataset::TandemX12 => "tandemx12",
            Dataset::TandemX12Hem => "tandemx12-hem",
            Dataset::TandemX30 => "tandemx30",
            Dataset::TandemX30Hem => "tandemx30-hem",
            Dataset::TandemX90 => "tandemx90",
            Dataset::TandemX90Hem => "tandemx90-hem",
            Dataset::GreekOld => "greek-old",
            Dataset::GreekLso => "greek-lso",
            Dataset::GreekVlso => "greek-vlso",
        }
    }

    /// Build the addressing scheme for this dataset.
    pub fn scheme(&self) -> Box<dyn TileScheme> {
        use geographic::{TandemLayer, TandemProduct};

        match *self {
            Dataset::Srtm => Box::new(Srtm5Scheme),
            Dataset::Srtm1Arc => Box::new(DegreeScheme::new(*self, -56, 60)),
            Dataset::AsterV2 => Box::new(DegreeScheme::new(*self, -83, 83)),
            Dataset::Aw3d30 | Dataset::Aw3d30V31 => Box::new(DegreeScheme::new(*self, -90, 90)),
            Dataset::TandemXIntermediate => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Intermediate,
                TandemLayer::Dem,
            )),
            Dataset::TandemXIntermediateHem => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Intermediate,
                TandemLayer::Hem,
            )),
            Dataset::TandemX12 => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem12,
                TandemLayer::Dem,
            )),
            Dataset::TandemX12Hem => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem12,
                TandemLayer::Hem,
            )),
            Dataset::TandemX30 => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem30,
                TandemLayer::Dem,
            )),
            Dataset::TandemX30Hem => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem30,
                TandemLayer::Hem,
            )),
            Dataset::TandemX90 => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem90,
                TandemLayer::Dem,
            )),
            Dataset::TandemX90Hem => Box::new(TandemXScheme::new(
                *self,
                TandemProduct::Dem90,
                TandemLayer::Hem,
            )),
            Dataset::GreekOld => Box::new(GreekScheme::new(*self, 4000, 3000, "img")),
            Dataset::GreekLso => Box::new(GreekScheme::new(*self, 4000, 3000, "tif")),
            Dataset::GreekVlso => Box::new(GreekScheme::new(*self, 800, 600, "tif")),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = GeodemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Dataset::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| GeodemError::UnknownDataset(s.to_string()))
    }
}

/// Normalise a longitude to `[-180, 180)`.
pub fn normalize_lon180(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample points inside each dataset's domain, in its native frame.
    fn sample_points(dataset: Dataset) -> Vec<(f64, f64)> {
        match dataset {
            Dataset::GreekOld | Dataset::GreekLso | Dataset::GreekVlso => vec![
                (400_000.0, 4_392_000.0),
                (476_543.2, 4_201_234.5),
                (123_456.0, 3_900_001.0),
                (800_000.0, 4_500_000.0),
                (399_999.9, 4_391_999.9),
            ],
            Dataset::Srtm | Dataset::Srtm1Arc => vec![
                (23.0, 38.0),
                (-122.4, 37.8),
                (151.2, -33.9),
                (0.0, 0.0),
                (-0.5, -0.5),
                (179.99, 55.5),
                (-180.0, -50.5),
            ],
            Dataset::AsterV2 => vec![
                (23.0, 38.0),
                (-122.4, 37.8),
                (151.2, -33.9),
                (-0.5, -0.5),
                (25.3, 66.6),
                (-45.0, 81.2),
                (166.5, -77.8),
            ],
            _ => vec![
                (23.0, 38.0),
                (-122.4, 37.8),
                (151.2, -33.9),
                (0.0, 0.0),
                (-0.5, -0.5),
                (179.99, 55.5),
                (-180.0, -50.5),
                (25.3, 66.6),
                (-45.0, 81.2),
                (12.0, 88.4),
                (166.5, -77.8),
            ],
        }
    }

    #[test]
    fn test_srtm_documented_frame() {
        let scheme = Dataset::Srtm.scheme();
        let index = scheme.frame_number(23.0, 38.0, true).unwrap();
        // nl = floor((23 + 180) / 5) + 1, np = floor((60 - 38) / 5) + 1
        assert_eq!(index, TileIndex::new(41, 5));
        assert_eq!(scheme.frame_name(index), "srtm_41_05.tif");
    }

    #[test]
    fn test_frame_contains_point_for_every_dataset() {
        for dataset in Dataset::ALL {
            let scheme = dataset.scheme();
            for (x, y) in sample_points(dataset) {
                let index = scheme
                    .frame_number(x, y, true)
                    .unwrap_or_else(|| panic!("{dataset}: ({x}, {y}) not covered"));
                let bbox = scheme
                    .frame_xymm(index, true)
                    .unwrap_or_else(|| panic!("{dataset}: {index} has no extent"));
                assert!(
                    bbox.contains(x, y),
                    "{dataset}: ({x}, {y}) outside {bbox} of {index}"
                );
            }
        }
    }

    #[test]
    fn test_frame_name_is_stable_within_tile() {
        for dataset in Dataset::ALL {
            let scheme = dataset.scheme();
            for (x, y) in sample_points(dataset) {
                let index = scheme.frame_number(x, y, true).unwrap();
                let bbox = scheme.frame_xymm(index, true).unwrap();
                let cx = (bbox.min_x + bbox.max_x) / 2.0;
                let cy = (bbox.min_y + bbox.max_y) / 2.0;
                assert_eq!(
                    scheme.frame_name_at(cx, cy).unwrap(),
                    scheme.frame_name(index),
                    "{dataset}: centre of {index} names a different frame"
                );
            }
        }
    }

    #[test]
    fn test_frame_number_is_monotone() {
        let fixed_width = [
            Dataset::Srtm,
            Dataset::Srtm1Arc,
            Dataset::AsterV2,
            Dataset::Aw3d30,
            Dataset::Aw3d30V31,
            Dataset::GreekOld,
            Dataset::GreekLso,
            Dataset::GreekVlso,
        ];
        for dataset in fixed_width {
            let scheme = dataset.scheme();
            let (x, y) = sample_points(dataset)[1];
            let index = scheme.frame_number(x, y, true).unwrap();
            let bbox = scheme.frame_xymm(index, true).unwrap();

            let east = scheme
                .frame_number(x + bbox.width(), y, true)
                .unwrap();
            assert_eq!(east.nl, index.nl + 1, "{dataset}: east neighbour");
            assert_eq!(east.np, index.np);

            let north = scheme
                .frame_number(x, y + bbox.height(), true)
                .unwrap();
            assert_eq!(north.nl, index.nl);
            assert_eq!((north.np - index.np).abs(), 1, "{dataset}: north neighbour");
        }

        // TanDEM-X tiles are 1° wide below 50° latitude.
        let scheme = Dataset::TandemX30.scheme();
        let a = scheme.frame_number(10.5, 45.5, true).unwrap();
        let b = scheme.frame_number(11.5, 46.5, true).unwrap();
        assert_eq!(b.nl, a.nl + 1);
        assert_eq!(b.np, a.np + 1);
    }

    #[test]
    fn test_unchecked_frame_number_outside_domain() {
        let scheme = Dataset::Srtm.scheme();
        assert_eq!(scheme.frame_number(23.0, 70.0, true), None);
        let index = scheme.frame_number(23.0, 70.0, false).unwrap();
        assert_eq!(index, TileIndex::new(41, -1));
        assert_eq!(scheme.frame_xymm(index, true), None);
        assert!(scheme.frame_xymm(index, false).is_some());
    }

    #[test]
    fn test_dataset_from_str() {
        assert_eq!("srtm".parse::<Dataset>().unwrap(), Dataset::Srtm);
        assert_eq!("TANDEMX90".parse::<Dataset>().unwrap(), Dataset::TandemX90);
        assert_eq!(
            "greek_vlso".parse::<Dataset>().unwrap(),
            Dataset::GreekVlso
        );
        for dataset in Dataset::ALL {
            assert_eq!(dataset.as_str().parse::<Dataset>().unwrap(), dataset);
        }

        let err = "srtm9".parse::<Dataset>().unwrap_err();
        assert!(matches!(err, GeodemError::UnknownDataset(name) if name == "srtm9"));
    }

    #[test]
    fn test_orthometric_flags() {
        assert!(Dataset::Srtm.scheme().is_orthometric());
        assert!(Dataset::GreekLso.scheme().is_orthometric());
        assert!(!Dataset::TandemX90.scheme().is_orthometric());
        assert!(Dataset::TandemX90Hem.scheme().is_orthometric());
        assert!(!Dataset::GreekOld.scheme().is_geographic());
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::from_corners((25.0, 40.0), (20.0, 35.0));
        assert_eq!(bbox, BoundingBox::new(20.0, 35.0, 25.0, 40.0));
        assert!(bbox.contains(20.0, 40.0));
        assert!(!bbox.contains(19.9, 37.0));

        // Touching edge only
        let other = BoundingBox::new(25.0, 35.0, 30.0, 40.0);
        assert!(!bbox.intersects(&other));
        let other = BoundingBox::new(24.5, 39.5, 30.0, 45.0);
        assert!(bbox.intersects(&other));
    }

    #[test]
    fn test_normalize_lon180() {
        assert_eq!(normalize_lon180(0.0), 0.0);
        assert_eq!(normalize_lon180(180.0), -180.0);
        assert_eq!(normalize_lon180(190.0), -170.0);
        assert_eq!(normalize_lon180(-190.0), 170.0);
        assert_eq!(normalize_lon180(359.5), -0.5);
    }
}
