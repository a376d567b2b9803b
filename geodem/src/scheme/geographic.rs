//! Tiling schemes of the global longitude/latitude datasets.
//!
//! File names follow each producer's convention: the tile is named after its
//! **southwest corner**, with `n`/`s` and `e`/`w` hemisphere letters and
//! zero-padded absolute degrees (`n37_w123`, `s078e166`). The CGIAR SRTM
//! release is the exception: it numbers 5° tiles from the north-west corner
//! of its coverage (`srtm_41_05`).

use super::{Dataset, TileBBox, TileIndex, TileScheme};

/// Hemisphere letter for a latitude in whole degrees.
fn lat_prefix(lat: i32) -> char {
    if lat >= 0 {
        'n'
    } else {
        's'
    }
}

/// Hemisphere letter for a longitude in whole degrees.
fn lon_prefix(lon: i32) -> char {
    if lon >= 0 {
        'e'
    } else {
        'w'
    }
}

fn is_finite(x: f64, y: f64) -> bool {
    x.is_finite() && y.is_finite()
}

/// CGIAR SRTM v4.1: 5° × 5° tiles between 60°N and 60°S.
///
/// `nl = floor((lon + 180) / 5) + 1` counts columns eastward from 180°W and
/// `np = floor((60 - lat) / 5) + 1` counts rows southward from 60°N.
#[derive(Debug, Clone, Copy, Default)]
pub struct Srtm5Scheme;

impl Srtm5Scheme {
    const SIZE: f64 = 5.0;
    const COLUMNS: i32 = 72;
    const ROWS: i32 = 24;

    fn is_valid(index: TileIndex) -> bool {
        (1..=Self::COLUMNS).contains(&index.nl) && (1..=Self::ROWS).contains(&index.np)
    }
}

impl TileScheme for Srtm5Scheme {
    fn dataset(&self) -> Dataset {
        Dataset::Srtm
    }

    fn frame_number(&self, x: f64, y: f64, check: bool) -> Option<TileIndex> {
        if !is_finite(x, y) {
            return None;
        }
        let nl = ((x + 180.0) / Self::SIZE).floor() as i32 + 1;
        let np = ((60.0 - y) / Self::SIZE).floor() as i32 + 1;
        let index = TileIndex::new(nl, np);
        if check && !Self::is_valid(index) {
            return None;
        }
        Some(index)
    }

    fn frame_name(&self, index: TileIndex) -> String {
        format!("srtm_{:02}_{:02}.tif", index.nl, index.np)
    }

    fn frame_xymm(&self, index: TileIndex, check: bool) -> Option<TileBBox> {
        if check && !Self::is_valid(index) {
            return None;
        }
        let min_x = f64::from(index.nl - 1) * Self::SIZE - 180.0;
        let max_y = 60.0 - f64::from(index.np - 1) * Self::SIZE;
        Some(TileBBox::new(
            min_x,
            max_y - Self::SIZE,
            min_x + Self::SIZE,
            max_y,
        ))
    }

    fn frame_pattern(&self) -> String {
        "srtm_??_??.tif".to_string()
    }
}

/// 1° × 1° tiles named after their southwest corner.
///
/// Shared by the USGS SRTM 1 arc-second release, ASTER GDEM v2 and both
/// AW3D30 releases; they differ only in latitude coverage and file name.
#[derive(Debug, Clone, Copy)]
pub struct DegreeScheme {
    dataset: Dataset,
    lat_min: i32,
    lat_max: i32,
}

impl DegreeScheme {
    /// Create a scheme covering latitudes `[lat_min, lat_max)`.
    pub fn new(dataset: Dataset, lat_min: i32, lat_max: i32) -> Self {
        Self {
            dataset,
            lat_min,
            lat_max,
        }
    }

    fn is_valid(&self, index: TileIndex) -> bool {
        (-180..180).contains(&index.nl) && (self.lat_min..self.lat_max).contains(&index.np)
    }
}

impl TileScheme for DegreeScheme {
    fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn frame_number(&self, x: f64, y: f64, check: bool) -> Option<TileIndex> {
        if !is_finite(x, y) {
            return None;
        }
        let index = TileIndex::new(x.floor() as i32, y.floor() as i32);
        if check && !self.is_valid(index) {
            return None;
        }
        Some(index)
    }

    fn frame_name(&self, index: TileIndex) -> String {
        let (lat_p, lat) = (lat_prefix(index.np), index.np.abs());
        let (lon_p, lon) = (lon_prefix(index.nl), index.nl.abs());
        match self.dataset {
            Dataset::AsterV2 => format!("astgtm2_{lat_p}{lat:02}{lon_p}{lon:03}_dem.tif"),
            Dataset::Aw3d30 => format!("{lat_p}{lat:03}{lon_p}{lon:03}_ave_dsm.tif"),
            Dataset::Aw3d30V31 => format!("alpsmlc30_{lat_p}{lat:03}{lon_p}{lon:03}_dsm.tif"),
            _ => format!("{lat_p}{lat:02}_{lon_p}{lon:03}_1arc_v3.tif"),
        }
    }

    fn frame_xymm(&self, index: TileIndex, check: bool) -> Option<TileBBox> {
        if check && !self.is_valid(index) {
            return None;
        }
        let x = f64::from(index.nl);
        let y = f64::from(index.np);
        Some(TileBBox::new(x, y, x + 1.0, y + 1.0))
    }

    fn frame_pattern(&self) -> String {
        match self.dataset {
            Dataset::AsterV2 => "astgtm2_???????_dem.tif",
            Dataset::Aw3d30 => "????????_ave_dsm.tif",
            Dataset::Aw3d30V31 => "alpsmlc30_????????_dsm.tif",
            _ => "???_????_1arc_v3.tif",
        }
        .to_string()
    }
}

/// TanDEM-X product family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TandemProduct {
    /// Intermediate DEM (IDEM), 0.4 arc-second.
    Intermediate,
    /// Final DEM, 0.4 arc-second (~12 m).
    Dem12,
    /// Final DEM, 1 arc-second (~30 m).
    Dem30,
    /// Final DEM, 3 arc-second (~90 m).
    Dem90,
}

impl TandemProduct {
    /// Resolution code embedded in file names.
    fn code(&self) -> &'static str {
        match self {
            TandemProduct::Intermediate | TandemProduct::Dem12 => "04",
            TandemProduct::Dem30 => "10",
            TandemProduct::Dem90 => "30",
        }
    }
}

/// Raster layer of a TanDEM-X tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TandemLayer {
    /// Heights.
    Dem,
    /// Height error map.
    Hem,
}

impl TandemLayer {
    fn suffix(&self) -> &'static str {
        match self {
            TandemLayer::Dem => "dem",
            TandemLayer::Hem => "hem",
        }
    }
}

/// TanDEM-X tiling: 1° of latitude, longitude width growing poleward.
///
/// The width depends on the latitude of the tile's equatorward edge:
/// 1° below 50°, then 2°, 3°, 4° and 6° up to 85°, and 12° beyond. Tiles are
/// aligned to multiples of their width counted from 180°W, and named after
/// their southwest corner.
///
/// `nl` is measured in degrees, so inside wider bands several `nl` values
/// fall in the same tile. [`TileScheme::frame_number`] always returns the
/// aligned western edge, and [`TileScheme::frame_name`] and
/// [`TileScheme::frame_xymm`] resolve any `nl` to the tile containing that
/// degree column.
#[derive(Debug, Clone, Copy)]
pub struct TandemXScheme {
    dataset: Dataset,
    product: TandemProduct,
    layer: TandemLayer,
}

impl TandemXScheme {
    pub fn new(dataset: Dataset, product: TandemProduct, layer: TandemLayer) -> Self {
        Self {
            dataset,
            product,
            layer,
        }
    }

    /// Longitude width in degrees of the tiles in latitude row `np`.
    pub fn band_width(np: i32) -> i32 {
        let edge = if np >= 0 { np } else { -np - 1 };
        match edge {
            e if e < 50 => 1,
            e if e < 60 => 2,
            e if e < 70 => 3,
            e if e < 80 => 4,
            e if e < 85 => 6,
            _ => 12,
        }
    }

    /// Western edge of the tile in row `np` containing degree column `nl`.
    fn align(nl: i32, np: i32) -> i32 {
        let width = Self::band_width(np);
        (nl + 180).div_euclid(width) * width - 180
    }

    fn is_valid(index: TileIndex) -> bool {
        (-180..180).contains(&index.nl) && (-90..90).contains(&index.np)
    }
}

impl TileScheme for TandemXScheme {
    fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn frame_number(&self, x: f64, y: f64, check: bool) -> Option<TileIndex> {
        if !is_finite(x, y) {
            return None;
        }
        let np = y.floor() as i32;
        let index = TileIndex::new(Self::align(x.floor() as i32, np), np);
        if check && !Self::is_valid(index) {
            return None;
        }
        Some(index)
    }

    fn frame_name(&self, index: TileIndex) -> String {
        let nl = Self::align(index.nl, index.np);
        let (lat_p, lat) = (lat_prefix(index.np), index.np.abs());
        let (lon_p, lon) = (lon_prefix(nl), nl.abs());
        let layer = self.layer.suffix();
        match self.product {
            TandemProduct::Intermediate => {
                format!("tdm1_idem_04_{lat_p}{lat:02}{lon_p}{lon:03}_{layer}.tif")
            }
            _ => format!(
                "tdm1_dem__{}_{lat_p}{lat:02}{lon_p}{lon:03}_{layer}.tif",
                self.product.code()
            ),
        }
    }

    fn frame_xymm(&self, index: TileIndex, check: bool) -> Option<TileBBox> {
        let nl = Self::align(index.nl, index.np);
        if check && !Self::is_valid(TileIndex::new(nl, index.np)) {
            return None;
        }
        let x = f64::from(nl);
        let y = f64::from(index.np);
        let width = f64::from(Self::band_width(index.np));
        Some(TileBBox::new(x, y, x + width, y + 1.0))
    }

    fn frame_pattern(&self) -> String {
        let layer = self.layer.suffix();
        match self.product {
            TandemProduct::Intermediate => format!("tdm1_idem_04_???????_{layer}.tif"),
            _ => format!("tdm1_dem__{}_???????_{layer}.tif", self.product.code()),
        }
    }

    fn is_orthometric(&self) -> bool {
        // Heights are WGS84 ellipsoidal; error maps need no geoid correction.
        self.layer == TandemLayer::Hem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srtm5_names_and_extent() {
        let scheme = Srtm5Scheme;
        assert_eq!(scheme.frame_name(TileIndex::new(41, 5)), "srtm_41_05.tif");
        assert_eq!(scheme.frame_name(TileIndex::new(1, 1)), "srtm_01_01.tif");
        assert_eq!(
            scheme.frame_xymm(TileIndex::new(41, 5), true),
            Some(TileBBox::new(20.0, 35.0, 25.0, 40.0))
        );
        assert_eq!(
            scheme.frame_xymm(TileIndex::new(1, 24), true),
            Some(TileBBox::new(-180.0, -60.0, -175.0, -55.0))
        );
        assert_eq!(scheme.frame_xymm(TileIndex::new(73, 1), true), None);
        assert_eq!(scheme.frame_xymm(TileIndex::new(1, 25), true), None);
    }

    #[test]
    fn test_srtm5_coverage() {
        let scheme = Srtm5Scheme;
        assert_eq!(scheme.frame_number(0.0, 60.0, true), Some(TileIndex::new(37, 1)));
        assert_eq!(scheme.frame_number(0.0, 61.0, true), None);
        assert_eq!(scheme.frame_number(0.0, -60.0, true), None);
        assert_eq!(scheme.frame_number(f64::NAN, 10.0, false), None);
    }

    #[test]
    fn test_degree_names() {
        let srtm1 = DegreeScheme::new(Dataset::Srtm1Arc, -56, 60);
        assert_eq!(
            srtm1.frame_name_at(-122.4, 37.8).unwrap(),
            "n37_w123_1arc_v3.tif"
        );
        assert_eq!(srtm1.frame_name_at(-0.5, -0.5).unwrap(), "s01_w001_1arc_v3.tif");

        let aster = DegreeScheme::new(Dataset::AsterV2, -83, 83);
        assert_eq!(
            aster.frame_name_at(24.5, 34.5).unwrap(),
            "astgtm2_n34e024_dem.tif"
        );

        let aw3d30 = DegreeScheme::new(Dataset::Aw3d30, -90, 90);
        assert_eq!(
            aw3d30.frame_name_at(166.5, -77.2).unwrap(),
            "s078e166_ave_dsm.tif"
        );

        let v31 = DegreeScheme::new(Dataset::Aw3d30V31, -90, 90);
        assert_eq!(
            v31.frame_name_at(138.7, 36.1).unwrap(),
            "alpsmlc30_n036e138_dsm.tif"
        );
    }

    #[test]
    fn test_degree_coverage() {
        let srtm1 = DegreeScheme::new(Dataset::Srtm1Arc, -56, 60);
        assert!(srtm1.frame_number(10.0, 59.9, true).is_some());
        assert!(srtm1.frame_number(10.0, 60.0, true).is_none());
        assert!(srtm1.frame_number(10.0, -56.5, true).is_none());
        assert!(srtm1.frame_number(180.0, 10.0, true).is_none());
        assert_eq!(
            srtm1.frame_number(180.0, 10.0, false),
            Some(TileIndex::new(180, 10))
        );
    }

    #[test]
    fn test_tandem_band_width() {
        assert_eq!(TandemXScheme::band_width(0), 1);
        assert_eq!(TandemXScheme::band_width(-1), 1);
        assert_eq!(TandemXScheme::band_width(49), 1);
        assert_eq!(TandemXScheme::band_width(50), 2);
        assert_eq!(TandemXScheme::band_width(-50), 1);
        assert_eq!(TandemXScheme::band_width(-51), 2);
        assert_eq!(TandemXScheme::band_width(66), 3);
        assert_eq!(TandemXScheme::band_width(79), 4);
        assert_eq!(TandemXScheme::band_width(84), 6);
        assert_eq!(TandemXScheme::band_width(89), 12);
        assert_eq!(TandemXScheme::band_width(-90), 12);
    }

    #[test]
    fn test_tandem_names() {
        let dem90 = TandemXScheme::new(Dataset::TandemX90, TandemProduct::Dem90, TandemLayer::Dem);
        assert_eq!(
            dem90.frame_name_at(7.5, 45.5).unwrap(),
            "tdm1_dem__30_n45e007_dem.tif"
        );

        let hem30 = TandemXScheme::new(Dataset::TandemX30Hem, TandemProduct::Dem30, TandemLayer::Hem);
        assert_eq!(
            hem30.frame_name_at(-70.2, -33.4).unwrap(),
            "tdm1_dem__10_s34w071_hem.tif"
        );

        let idem = TandemXScheme::new(
            Dataset::TandemXIntermediate,
            TandemProduct::Intermediate,
            TandemLayer::Dem,
        );
        assert_eq!(
            idem.frame_name_at(23.7, 37.9).unwrap(),
            "tdm1_idem_04_n37e023_dem.tif"
        );
    }

    #[test]
    fn test_tandem_wide_band_alignment() {
        let scheme = TandemXScheme::new(Dataset::TandemX30, TandemProduct::Dem30, TandemLayer::Dem);

        // 66°N lies in the 3° band; 25.3°E falls in the tile starting at 24°E.
        let index = scheme.frame_number(25.3, 66.6, true).unwrap();
        assert_eq!(index, TileIndex::new(24, 66));
        assert_eq!(
            scheme.frame_xymm(index, true),
            Some(TileBBox::new(24.0, 66.0, 27.0, 67.0))
        );
        assert_eq!(scheme.frame_name(index), "tdm1_dem__10_n66e024_dem.tif");

        // Any degree column inside the tile resolves to the same frame.
        assert_eq!(
            scheme.frame_name(TileIndex::new(26, 66)),
            scheme.frame_name(index)
        );
        assert_eq!(
            scheme.frame_xymm(TileIndex::new(26, 66), true),
            scheme.frame_xymm(index, true)
        );

        // West of Greenwich in the southern 2° band.
        let index = scheme.frame_number(-0.5, -55.5, true).unwrap();
        assert_eq!(index, TileIndex::new(-2, -56));
        assert_eq!(scheme.frame_name(index), "tdm1_dem__10_s56w002_dem.tif");
    }

    #[test]
    fn test_patterns() {
        assert_eq!(Srtm5Scheme.frame_pattern(), "srtm_??_??.tif");
        let dem90 = TandemXScheme::new(Dataset::TandemX90, TandemProduct::Dem90, TandemLayer::Dem);
        assert_eq!(dem90.frame_pattern(), "tdm1_dem__30_???????_dem.tif");
        let srtm1 = DegreeScheme::new(Dataset::Srtm1Arc, -56, 60);
        assert_eq!(srtm1.frame_pattern(), "???_????_1arc_v3.tif");
    }
}
