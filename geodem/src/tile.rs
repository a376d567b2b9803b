//! In-memory DEM rasters and elevation extraction.
//!
//! A [`DemTile`] is a north-up raster of `f32` heights on a regular
//! [`PixelGrid`]. Tiles are produced by a [`TileDecoder`](crate::decoder::TileDecoder)
//! or assembled by a mosaic, and are shared behind an `Arc` by the tile cache.

use std::sync::Arc;

use crate::error::{GeodemError, Result};
use crate::scheme::BoundingBox;

/// Relative tolerance on pixel sizes.
const GRID_EPSILON: f64 = 1e-6;
/// Largest fraction of a pixel two aligned origins may disagree by.
const OFFSET_TOLERANCE: f64 = 1e-3;

/// Georeferencing of a north-up raster.
///
/// `(west, north)` is the outer corner of pixel `(0, 0)`; columns grow
/// eastward by `pixel_width`, rows grow southward by `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGrid {
    pub west: f64,
    pub north: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub width: usize,
    pub height: usize,
}

impl PixelGrid {
    pub fn new(
        west: f64,
        north: f64,
        pixel_width: f64,
        pixel_height: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            west,
            north,
            pixel_width,
            pixel_height,
            width,
            height,
        }
    }

    /// Fractional `(col, row)` of a point; integer values are pixel corners.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.west) / self.pixel_width,
            (self.north - y) / self.pixel_height,
        )
    }

    /// Coordinates of a fractional `(col, row)` position.
    pub fn to_coord(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.west + col * self.pixel_width,
            self.north - row * self.pixel_height,
        )
    }

    /// Outer extent of the raster.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.west,
            self.north - self.height as f64 * self.pixel_height,
            self.west + self.width as f64 * self.pixel_width,
            self.north,
        )
    }

    /// Integer pixel offset of `other`'s origin within this grid.
    ///
    /// Fails with [`GeodemError::MismatchedPixelGrid`] when the pixel sizes
    /// differ or the origins are not a whole number of pixels apart.
    pub fn offset_of(&self, other: &PixelGrid) -> Result<(i64, i64)> {
        let same_size = approx_eq(self.pixel_width, other.pixel_width)
            && approx_eq(self.pixel_height, other.pixel_height);
        if !same_size {
            return Err(GeodemError::MismatchedPixelGrid(format!(
                "pixel size {}x{} differs from {}x{}",
                other.pixel_width, other.pixel_height, self.pixel_width, self.pixel_height
            )));
        }

        let (col, row) = self.to_pixel(other.west, other.north);
        let (c, r) = (col.round(), row.round());
        if (col - c).abs() > OFFSET_TOLERANCE || (row - r).abs() > OFFSET_TOLERANCE {
            return Err(GeodemError::MismatchedPixelGrid(format!(
                "origin ({}, {}) is not on the grid anchored at ({}, {})",
                other.west, other.north, self.west, self.north
            )));
        }
        Ok((c as i64, r as i64))
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= GRID_EPSILON * a.abs().max(b.abs())
}

/// One raster node: the centre of a pixel and its stored value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// False for nodata (and NaN) samples.
    pub valid: bool,
}

/// A loaded DEM raster.
///
/// # Example
///
/// ```
/// use geodem::{DemTile, PixelGrid};
///
/// let grid = PixelGrid::new(20.0, 40.0, 0.5, 0.5, 2, 2);
/// let tile = DemTile::new(grid, vec![1.0, 2.0, 3.0, 4.0], None).unwrap();
/// assert_eq!(tile.get_elevation(20.75, 39.25), Some(4.0));
/// assert_eq!(tile.get_elevation(19.0, 39.5), None);
/// ```
#[derive(Debug, Clone)]
pub struct DemTile {
    grid: PixelGrid,
    /// Row-major, north row first.
    data: Vec<f32>,
    nodata: Option<f32>,
    orthometric: bool,
}

impl DemTile {
    /// Wrap decoded samples.
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::InvalidRaster`] if `data` does not hold exactly
    /// `width * height` samples.
    pub fn new(grid: PixelGrid, data: Vec<f32>, nodata: Option<f32>) -> Result<Self> {
        let expected = grid.width * grid.height;
        if data.len() != expected {
            return Err(GeodemError::InvalidRaster {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            grid,
            data,
            nodata,
            orthometric: true,
        })
    }

    /// A raster with every sample set to `value`.
    pub fn filled(grid: PixelGrid, value: f32, nodata: Option<f32>) -> Self {
        Self {
            grid,
            data: vec![value; grid.width * grid.height],
            nodata,
            orthometric: true,
        }
    }

    /// Mark whether the heights are orthometric (geoid-referenced).
    pub fn with_orthometric(mut self, orthometric: bool) -> Self {
        self.orthometric = orthometric;
        self
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn is_orthometric(&self) -> bool {
        self.orthometric
    }

    /// Raw samples, row-major from the north-west corner.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn bounds(&self) -> BoundingBox {
        self.grid.bounds()
    }

    /// `(pixel_width, pixel_height)`.
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.grid.pixel_width, self.grid.pixel_height)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.bounds().contains(x, y)
    }

    fn is_valid(&self, value: f32) -> bool {
        !value.is_nan() && self.nodata != Some(value)
    }

    /// Sample at `(col, row)`, or `None` if outside the raster or nodata.
    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        let v = self.data[row * self.grid.width + col];
        self.is_valid(v).then_some(v)
    }

    /// Nearest-pixel height at `(x, y)`.
    ///
    /// Returns `None` outside the tile or on nodata. Points on the eastern
    /// or southern edge read the last column or row.
    pub fn get_elevation(&self, x: f64, y: f64) -> Option<f64> {
        if self.grid.width == 0 || self.grid.height == 0 || !self.contains(x, y) {
            return None;
        }
        let (col, row) = self.grid.to_pixel(x, y);
        let col = (col.floor().max(0.0) as usize).min(self.grid.width - 1);
        let row = (row.floor().max(0.0) as usize).min(self.grid.height - 1);
        self.value(col, row).map(f64::from)
    }

    /// Bilinear height between the four surrounding pixel centres.
    ///
    /// Outside the band of pixel centres the nearest edge is used. Returns
    /// `None` outside the tile or when any of the four samples is nodata.
    pub fn get_elevation_interpolated(&self, x: f64, y: f64) -> Option<f64> {
        if self.grid.width == 0 || self.grid.height == 0 || !self.contains(x, y) {
            return None;
        }
        let (col, row) = self.grid.to_pixel(x, y);
        let (c0, c1, fx) = Self::bracket(col - 0.5, self.grid.width);
        let (r0, r1, fy) = Self::bracket(row - 0.5, self.grid.height);

        let v00 = f64::from(self.value(c0, r0)?);
        let v10 = f64::from(self.value(c1, r0)?);
        let v01 = f64::from(self.value(c0, r1)?);
        let v11 = f64::from(self.value(c1, r1)?);

        Some(
            v00 * (1.0 - fx) * (1.0 - fy)
                + v10 * fx * (1.0 - fy)
                + v01 * (1.0 - fx) * fy
                + v11 * fx * fy,
        )
    }

    /// Lower index, upper index and weight of a fractional position in `0..len`.
    fn bracket(pos: f64, len: usize) -> (usize, usize, f64) {
        let last = (len - 1) as f64;
        let pos = pos.clamp(0.0, last);
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(len - 1);
        (i0, i1, pos - i0 as f64)
    }

    /// Heights sampled along the segment from `from` to `to`.
    ///
    /// The segment is split into steps no longer than one pixel; both end
    /// points are included. Samples outside the tile or on nodata have
    /// `valid == false` and a NaN height.
    pub fn profile(&self, from: (f64, f64), to: (f64, f64)) -> Vec<Node> {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = (dx.abs() / self.grid.pixel_width)
            .max(dy.abs() / self.grid.pixel_height)
            .ceil()
            .max(1.0) as usize;

        (0..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                let (x, y) = (from.0 + t * dx, from.1 + t * dy);
                match self.get_elevation(x, y) {
                    Some(z) => Node { x, y, z, valid: true },
                    None => Node {
                        x,
                        y,
                        z: f64::NAN,
                        valid: false,
                    },
                }
            })
            .collect()
    }

    /// Paste a block of `src` into this raster, skipping nodata samples.
    ///
    /// `src_origin` and `dst_origin` are `(col, row)` pixel positions and
    /// `size` is `(cols, rows)`. The block is shrunk to fit both rasters.
    pub(crate) fn paste_block(
        &mut self,
        src: &DemTile,
        src_origin: (usize, usize),
        dst_origin: (usize, usize),
        size: (usize, usize),
    ) {
        let cols = size
            .0
            .min(src.grid.width.saturating_sub(src_origin.0))
            .min(self.grid.width.saturating_sub(dst_origin.0));
        let rows = size
            .1
            .min(src.grid.height.saturating_sub(src_origin.1))
            .min(self.grid.height.saturating_sub(dst_origin.1));

        for r in 0..rows {
            let s = (src_origin.1 + r) * src.grid.width + src_origin.0;
            let d = (dst_origin.1 + r) * self.grid.width + dst_origin.0;
            for c in 0..cols {
                let v = src.data[s + c];
                if src.is_valid(v) {
                    self.data[d + c] = v;
                }
            }
        }
    }

    /// The node at `(col, row)`, positioned at the pixel centre.
    pub fn node_at(&self, col: usize, row: usize) -> Option<Node> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        let z = self.data[row * self.grid.width + col];
        let (x, y) = self.grid.to_coord(col as f64 + 0.5, row as f64 + 0.5);
        Some(Node {
            x,
            y,
            z: f64::from(z),
            valid: self.is_valid(z),
        })
    }

    /// Iterate over every node, row by row from the north-west corner.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        let width = self.grid.width;
        (0..self.data.len()).filter_map(move |i| self.node_at(i % width, i / width))
    }
}

/// Owning node iterator over a shared tile.
#[derive(Debug, Clone)]
pub struct TileNodes {
    tile: Arc<DemTile>,
    next: usize,
}

impl TileNodes {
    pub fn new(tile: Arc<DemTile>) -> Self {
        Self { tile, next: 0 }
    }
}

impl Iterator for TileNodes {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let width = self.tile.width();
        if width == 0 || self.next >= self.tile.data.len() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        self.tile.node_at(i % width, i / width)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.tile.data.len().saturating_sub(self.next);
        (left, Some(left))
    }
}
