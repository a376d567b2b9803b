//! Sheet layout of the Greek national orthophoto DEMs (EGSA87 / GGRS87).
//!
//! Sheets are fixed-size rectangles in projected metres. A sheet file is
//! named after its **northwest corner** in hectometres, easting then
//! northing, each zero-padded to five digits: the 4 km × 3 km sheet whose
//! corner is at (400 000 E, 4 395 000 N) is `0400043950.img`.

use super::{Dataset, TileBBox, TileIndex, TileScheme};

/// Easting range covered by the national grid, in metres.
const X_RANGE: (f64, f64) = (100_000.0, 1_000_000.0);
/// Northing range covered by the national grid, in metres.
const Y_RANGE: (f64, f64) = (3_800_000.0, 4_700_000.0);

/// Fixed-size sheets on the EGSA87 projected grid.
///
/// `nl = floor(x / W)` and `np = floor(y / H) + 1`, so `np * H` is the
/// northern edge of the sheet.
#[derive(Debug, Clone)]
pub struct GreekScheme {
    dataset: Dataset,
    tile_w: i32,
    tile_h: i32,
    ext: &'static str,
}

impl GreekScheme {
    /// Create a scheme of `tile_w` × `tile_h` metre sheets stored as `.ext`.
    pub fn new(dataset: Dataset, tile_w: i32, tile_h: i32, ext: &'static str) -> Self {
        Self {
            dataset,
            tile_w,
            tile_h,
            ext,
        }
    }

    fn bbox(&self, index: TileIndex) -> TileBBox {
        let w = f64::from(self.tile_w);
        let h = f64::from(self.tile_h);
        let min_x = f64::from(index.nl) * w;
        let max_y = f64::from(index.np) * h;
        TileBBox::new(min_x, max_y - h, min_x + w, max_y)
    }

    fn covers(x: f64, y: f64) -> bool {
        (X_RANGE.0..X_RANGE.1).contains(&x) && (Y_RANGE.0..Y_RANGE.1).contains(&y)
    }
}

impl TileScheme for GreekScheme {
    fn dataset(&self) -> Dataset {
        self.dataset
    }

    fn frame_number(&self, x: f64, y: f64, check: bool) -> Option<TileIndex> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        if check && !Self::covers(x, y) {
            return None;
        }
        let nl = (x / f64::from(self.tile_w)).floor() as i32;
        let np = (y / f64::from(self.tile_h)).floor() as i32 + 1;
        Some(TileIndex::new(nl, np))
    }

    fn frame_name(&self, index: TileIndex) -> String {
        // i64: the northing in hectometres of an unchecked index may overflow i32 math.
        let east = i64::from(index.nl) * i64::from(self.tile_w) / 100;
        let north = i64::from(index.np) * i64::from(self.tile_h) / 100;
        format!("{east:05}{north:05}.{}", self.ext)
    }

    fn frame_xymm(&self, index: TileIndex, check: bool) -> Option<TileBBox> {
        let bbox = self.bbox(index);
        let domain = TileBBox::new(X_RANGE.0, Y_RANGE.0, X_RANGE.1, Y_RANGE.1);
        if check && !bbox.intersects(&domain) {
            return None;
        }
        Some(bbox)
    }

    fn frame_pattern(&self) -> String {
        format!("??????????.{}", self.ext)
    }

    fn is_orthometric(&self) -> bool {
        true
    }

    fn is_geographic(&self) -> bool {
        false
    }
}
