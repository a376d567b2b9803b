//! Window queries, mosaics and inventories over a [`GdemService`].
//!
//! A window is a rectangle in user coordinates. Its corners are mapped to
//! the dataset's native frame and every tile index between them is resolved
//! through the service cache, in a fixed order: `nl` ascending, then `np`
//! descending.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GeodemError, Result};
use crate::scheme::{normalize_lon180, BoundingBox, TileBBox, TileIndex, TileScheme};
use crate::search::MatchingFiles;
use crate::service::{GdemService, Lookup};
use crate::tile::{DemTile, Node, PixelGrid, TileNodes};

/// Nodata value of a mosaic whose template tile declares none.
pub const DEFAULT_NODATA: f32 = -32768.0;

/// Tiles touched by a window query.
#[derive(Debug, Clone, Default)]
pub struct WindowResult {
    /// Every tile that contributes to the window, in visiting order.
    pub tiles: Vec<Arc<DemTile>>,
    /// Indices loaded from disk by this query.
    pub loaded: Vec<TileIndex>,
    /// Indices whose file is missing from every search root.
    pub not_found: Vec<TileIndex>,
    /// Indices outside the dataset's coverage.
    pub not_covered: Vec<TileIndex>,
}

impl WindowResult {
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// A tile file on disk and its extent in user coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub name: String,
    pub path: PathBuf,
    pub bounds: BoundingBox,
}

/// Which nodes [`GdemService::iter_nodes`] yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFilter {
    #[default]
    All,
    ValidOnly,
    InvalidOnly,
}

impl NodeFilter {
    pub fn accepts(&self, node: &Node) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::ValidOnly => node.valid,
            NodeFilter::InvalidOnly => !node.valid,
        }
    }
}

impl GdemService {
    /// A user-coordinate window mapped to the native frame.
    ///
    /// Geographic windows are shifted as a whole so the western edge falls
    /// in `[-180, 180)`; an eastern edge at 180° stays at 180°.
    fn native_window(&self, bbox: &BoundingBox) -> BoundingBox {
        let transform = self.transform();
        let mut native = BoundingBox::from_corners(
            transform.to_native(bbox.min_x, bbox.min_y),
            transform.to_native(bbox.max_x, bbox.max_y),
        );
        if self.scheme().is_geographic() {
            let shift = normalize_lon180(native.min_x) - native.min_x;
            native.min_x += shift;
            native.max_x += shift;
        }
        native
    }

    /// User-coordinate extent of a native rectangle.
    fn user_bounds(&self, native: &BoundingBox) -> BoundingBox {
        let transform = self.transform();
        BoundingBox::from_corners(
            transform.from_native(native.min_x, native.min_y),
            transform.from_native(native.max_x, native.max_y),
        )
    }

    /// Resolve every tile overlapping `bbox` (user coordinates).
    ///
    /// Missing files are remembered as in point queries; indices outside the
    /// dataset are listed in [`WindowResult::not_covered`].
    ///
    /// # Errors
    ///
    /// Returns an error if a tile file exists but cannot be decoded.
    pub fn query_window(&self, bbox: &BoundingBox) -> Result<WindowResult> {
        let native = self.native_window(bbox);
        let scheme = self.scheme();
        let mut result = WindowResult::default();

        let (Some(a), Some(b)) = (
            scheme.frame_number(native.min_x, native.min_y, false),
            scheme.frame_number(native.max_x, native.max_y, false),
        ) else {
            return Ok(result);
        };

        // Tile widths may change from row to row, so each row gets its own
        // column range.
        let corner_cols = (a.nl.min(b.nl), a.nl.max(b.nl));
        let rows: Vec<(i32, (i32, i32))> = (a.np.min(b.np)..=a.np.max(b.np))
            .rev()
            .map(|np| (np, row_columns(scheme, &native, np).unwrap_or(corner_cols)))
            .collect();
        let first = rows.iter().map(|(_, (lo, _))| *lo).min().unwrap_or(corner_cols.0);
        let last = rows.iter().map(|(_, (_, hi))| *hi).max().unwrap_or(corner_cols.1);

        let mut seen = HashSet::new();
        for nl in first..=last {
            for &(np, (lo, hi)) in &rows {
                if nl < lo || nl > hi {
                    continue;
                }
                let index = TileIndex::new(nl, np);
                if !seen.insert(scheme.frame_name(index)) {
                    continue;
                }
                if scheme
                    .frame_xymm(index, false)
                    .is_some_and(|extent| !overlaps(&extent, &native))
                {
                    continue;
                }
                if scheme.frame_xymm(index, true).is_none() {
                    result.not_covered.push(index);
                    continue;
                }
                match self.resolve_frame(index)? {
                    Lookup::Cached(tile) => result.tiles.push(tile),
                    Lookup::Loaded(tile) => {
                        result.tiles.push(tile);
                        result.loaded.push(index);
                    }
                    Lookup::NotFound => result.not_found.push(index),
                }
            }
        }

        debug!(
            %bbox,
            tiles = result.tiles.len(),
            loaded = result.loaded.len(),
            not_found = result.not_found.len(),
            not_covered = result.not_covered.len(),
            "window query"
        );
        Ok(result)
    }

    /// Tiles overlapping `bbox`, reporting gaps through `tracing`.
    ///
    /// # Errors
    ///
    /// With `fail_hard`, returns [`GeodemError::NoTilesInWindow`] when no tile
    /// was found; without it an empty list is returned.
    pub fn query_window_or_fail(
        &self,
        bbox: &BoundingBox,
        fail_hard: bool,
    ) -> Result<Vec<Arc<DemTile>>> {
        let result = self.query_window(bbox)?;
        let scheme = self.scheme();

        for index in &result.not_covered {
            warn!(%index, dataset = %self.dataset(), "tile outside dataset coverage");
        }
        for index in &result.not_found {
            warn!(name = %scheme.frame_name(*index), "tile not found");
        }

        if result.tiles.is_empty() {
            if fail_hard {
                return Err(GeodemError::NoTilesInWindow { bbox: *bbox });
            }
            warn!(%bbox, "no tiles found in window");
        }
        Ok(result.tiles)
    }

    /// Mosaic the tiles overlapping `bbox` into one raster.
    ///
    /// The first tile found sets the pixel grid; the output is anchored at
    /// the window's north-west corner snapped to that grid and sized to
    /// cover the window. Returns `Ok(None)` if no tile overlaps the window.
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::MismatchedPixelGrid`] if a tile does not share
    /// the first tile's pixel size and alignment.
    pub fn join_dem(&self, bbox: &BoundingBox) -> Result<Option<DemTile>> {
        let tiles = self.query_window(bbox)?.tiles;
        let Some(template) = tiles.first() else {
            return Ok(None);
        };

        let native = self.native_window(bbox);
        let grid = mosaic_grid(template.grid(), &native);
        let nodata = template.nodata().unwrap_or(DEFAULT_NODATA);
        let mut out = DemTile::filled(grid, nodata, Some(nodata))
            .with_orthometric(template.is_orthometric());

        for tile in &tiles {
            let (dc, dr) = out.grid().offset_of(tile.grid())?;
            let Some((src_col, dst_col, cols)) = clip_axis(dc, tile.width()) else {
                continue;
            };
            let Some((src_row, dst_row, rows)) = clip_axis(dr, tile.height()) else {
                continue;
            };
            out.paste_block(tile, (src_col, src_row), (dst_col, dst_row), (cols, rows));
        }

        Ok(Some(out))
    }

    /// Lazily list tile files on the search path with their extents.
    ///
    /// Each file is opened only to read its bounds; nothing is cached.
    /// With `bbox` (user coordinates), files not overlapping it are skipped.
    pub fn iter_available_frames(&self, bbox: Option<&BoundingBox>) -> AvailableFrames<'_> {
        AvailableFrames {
            service: self,
            files: self.search_path().matching(&self.scheme().frame_pattern()),
            window: bbox.map(|b| self.native_window(b)),
        }
    }

    /// Collected [`Self::iter_available_frames`].
    pub fn enumerate_frame_rectangles(&self, bbox: Option<&BoundingBox>) -> Vec<FrameInfo> {
        self.iter_available_frames(bbox).collect()
    }

    /// Nodes of the loaded tiles, in file-name order, in user coordinates.
    ///
    /// Only tiles already in the cache are visited; nothing is loaded.
    pub fn iter_nodes(
        &self,
        filter: NodeFilter,
        bbox: Option<&BoundingBox>,
    ) -> impl Iterator<Item = Node> + '_ {
        let window = bbox.map(|b| self.native_window(b));
        self.loaded_tiles()
            .into_iter()
            .filter(move |(_, tile)| window.map_or(true, |w| tile.bounds().intersects(&w)))
            .flat_map(|(_, tile)| TileNodes::new(tile))
            .filter(move |node| {
                filter.accepts(node) && window.map_or(true, |w| w.contains(node.x, node.y))
            })
            .map(move |node| {
                let (x, y) = self.transform().from_native(node.x, node.y);
                Node { x, y, ..node }
            })
    }
}

/// Column range `(lo, hi)` of the tiles in row `np` spanned by `window`.
fn row_columns(scheme: &dyn TileScheme, window: &BoundingBox, np: i32) -> Option<(i32, i32)> {
    let sample = TileIndex::new(scheme.frame_number(window.min_x, window.min_y, false)?.nl, np);
    let extent = scheme.frame_xymm(sample, false)?;
    let y = (extent.min_y + extent.max_y) / 2.0;
    let lo = scheme.frame_number(window.min_x, y, false)?.nl;
    let hi = scheme.frame_number(window.max_x, y, false)?.nl;
    Some((lo.min(hi), lo.max(hi)))
}

/// Whether a tile extent shares more than an edge with `window`.
///
/// Along an axis where the window is degenerate, touching counts.
fn overlaps(extent: &TileBBox, window: &BoundingBox) -> bool {
    let axis = |lo: f64, hi: f64, w_lo: f64, w_hi: f64| {
        if w_hi > w_lo {
            lo < w_hi && hi > w_lo
        } else {
            lo <= w_lo && w_lo <= hi
        }
    };
    axis(extent.min_x, extent.max_x, window.min_x, window.max_x)
        && axis(extent.min_y, extent.max_y, window.min_y, window.max_y)
}

/// Output grid of a mosaic: `template`'s pixel size and alignment, covering
/// `window`.
fn mosaic_grid(template: &PixelGrid, window: &BoundingBox) -> PixelGrid {
    let (col, row) = template.to_pixel(window.min_x, window.max_y);
    let (west, north) = template.to_coord(col.floor(), row.floor());
    let width = ((window.max_x - west) / template.pixel_width).ceil().max(1.0);
    let height = ((north - window.min_y) / template.pixel_height).ceil().max(1.0);
    PixelGrid::new(
        west,
        north,
        template.pixel_width,
        template.pixel_height,
        width as usize,
        height as usize,
    )
}

/// Clip a source span of `len` pixels placed at `offset` in the output.
///
/// Returns `(src_start, dst_start, len)`, or `None` if nothing remains.
fn clip_axis(offset: i64, len: usize) -> Option<(usize, usize, usize)> {
    let len = len as i64;
    let skip = (-offset).max(0);
    if skip >= len {
        return None;
    }
    Some((skip as usize, offset.max(0) as usize, (len - skip) as usize))
}

/// Iterator returned by [`GdemService::iter_available_frames`].
#[derive(Debug)]
pub struct AvailableFrames<'a> {
    service: &'a GdemService,
    files: MatchingFiles,
    window: Option<BoundingBox>,
}

impl AvailableFrames<'_> {
    fn frame_info(&self, name: String, path: PathBuf) -> Result<FrameInfo> {
        let path = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("zip")) {
            self.service.search_path().resolve(&name)?
        } else {
            path
        };
        let bounds = self.service.decoders().for_path(&path)?.read_bounds(&path)?;
        Ok(FrameInfo { name, path, bounds })
    }
}

impl Iterator for AvailableFrames<'_> {
    type Item = FrameInfo;

    fn next(&mut self) -> Option<FrameInfo> {
        loop {
            let (name, path) = self.files.next()?;
            let info = match self.frame_info(name, path) {
                Ok(info) => info,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable frame");
                    continue;
                }
            };
            if self.window.map_or(true, |w| w.intersects(&info.bounds)) {
                let bounds = self.service.user_bounds(&info.bounds);
                return Some(FrameInfo { bounds, ..info });
            }
        }
    }
}
