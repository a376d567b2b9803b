//! Undulation interpolation over an [`UndulationGrid`].
//!
//! Positions are expressed in the grid's 1-based row numbering and in
//! margin-extended column numbering: row 1 is `lat_north`, extended column
//! `margin + 1` is `lon_west`.

use crate::error::{GeodemError, Result};
use crate::scheme::BoundingBox;
use crate::tile::{DemTile, PixelGrid};

use super::grid::{GridGeometry, UndulationGrid};

/// Value returned for points the grid cannot answer.
pub const UNDULATION_SENTINEL: f64 = 999_999.0;

/// Length of one degree of arc on the mean Earth sphere, in km.
const KM_PER_DEGREE: f64 = 111.195;

/// Interpolation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationParams {
    /// Requested window width in nodes. Even widths are reduced by one;
    /// anything below 2 selects bilinear interpolation.
    pub window: usize,
    /// Points closer than this to the grid boundary are rejected (km).
    pub edge_km: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            window: 5,
            edge_km: 0.0,
        }
    }
}

impl InterpolationParams {
    pub fn bilinear() -> Self {
        Self {
            window: 2,
            edge_km: 0.0,
        }
    }

    /// Effective window width: odd, or 2 for bilinear.
    pub fn window_size(&self) -> usize {
        let n = if self.window % 2 == 0 {
            self.window.saturating_sub(1)
        } else {
            self.window
        };
        n.max(2)
    }
}

/// Undulation at `(lon, lat)` in metres, or [`UNDULATION_SENTINEL`].
///
/// Longitude is wrapped to `[0, 360)`. Latitudes outside `[-90, 90]` and
/// non-finite input give the sentinel. Where the spline window does not fit
/// inside the grid (near the poles) the value is interpolated bilinearly.
pub fn undulation(
    grid: &mut UndulationGrid,
    params: &InterpolationParams,
    lon: f64,
    lat: f64,
) -> Result<f64> {
    if !lon.is_finite() || !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Ok(UNDULATION_SENTINEL);
    }
    let lon = lon.rem_euclid(360.0);

    let value = interpolate(grid, params, lon, lat)?;
    if value == UNDULATION_SENTINEL && params.window_size() > 2 {
        let bilinear = InterpolationParams {
            window: 2,
            ..*params
        };
        return interpolate(grid, &bilinear, lon, lat);
    }
    Ok(value)
}

/// Edge exclusion in grid cells, `(rows, cols)`.
fn edge_cells(geometry: &GridGeometry, edge_km: f64, lat: f64) -> (i64, i64) {
    if edge_km <= 0.0 {
        return (0, 0);
    }
    let rows = (edge_km / (KM_PER_DEGREE * geometry.dlat)).ceil();
    let scale = lat.to_radians().cos();
    let cols = if scale > 1e-9 {
        (edge_km / (KM_PER_DEGREE * geometry.dlon * scale)).ceil()
    } else {
        f64::MAX
    };
    let limit = geometry.row_len() as f64;
    (rows.min(limit) as i64, cols.min(limit) as i64)
}

/// Core interpolation at an already normalised point.
///
/// Returns [`UNDULATION_SENTINEL`] when the window does not fit inside the
/// grid or touches the edge-exclusion band. Bilinear interpolation clamps
/// instead: positions before the first usable node take that node with
/// weight 0, positions at or past the last take it with weight 1.
pub fn interpolate(
    grid: &mut UndulationGrid,
    params: &InterpolationParams,
    lon: f64,
    lat: f64,
) -> Result<f64> {
    let g = *grid.geometry();
    let n = params.window_size() as i64;
    let (edge_rows, edge_cols) = edge_cells(&g, params.edge_km, lat);

    let ri = (g.lat_north - lat) / g.dlat + 1.0;
    let rj = (lon - g.lon_west) / g.dlon + 1.0 + g.margin as f64;

    let (row_first, row_last) = (1 + edge_rows, g.nrows as i64 - edge_rows);
    let (col_first, col_last) = (1 + edge_cols, g.row_len() as i64 - edge_cols);
    if row_first > row_last || col_first > col_last {
        return Ok(UNDULATION_SENTINEL);
    }

    let value = if n == 2 {
        let inside = |pos: f64, first: i64, last: i64| pos >= first as f64 && pos <= last as f64;
        if !inside(ri, row_first, row_last) || !inside(rj, col_first, col_last) {
            return Ok(UNDULATION_SENTINEL);
        }
        let (i0, i1, ti) = clamp_axis(ri, row_first, row_last);
        let (j0, j1, tj) = clamp_axis(rj, col_first, col_last);

        let v00 = f64::from(grid.cell(i0, j0)?);
        let v01 = f64::from(grid.cell(i0, j1)?);
        let v10 = f64::from(grid.cell(i1, j0)?);
        let v11 = f64::from(grid.cell(i1, j1)?);
        let top = v00 + (v01 - v00) * tj;
        let bottom = v10 + (v11 - v10) * tj;
        top + (bottom - top) * ti
    } else {
        let half = (n - 1) / 2;
        let i0 = ri.round() as i64 - half;
        let j0 = rj.round() as i64 - half;
        if i0 < row_first || i0 + n - 1 > row_last || j0 < col_first || j0 + n - 1 > col_last {
            return Ok(UNDULATION_SENTINEL);
        }

        let width = n as usize;
        let start = (j0 - 1) as usize;
        let mut along_rows = Vec::with_capacity(width);
        for i in i0..i0 + n {
            let row = grid.row(i as usize)?;
            let samples: Vec<f64> = row[start..start + width].iter().map(|&v| f64::from(v)).collect();
            along_rows.push(spline_eval(&samples, rj - j0 as f64));
        }
        spline_eval(&along_rows, ri - i0 as f64)
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Ok(UNDULATION_SENTINEL)
    }
}

/// Bracketing indices and weight of `pos` on the axis `first..=last`.
fn clamp_axis(pos: f64, first: i64, last: i64) -> (usize, usize, f64) {
    let (i0, i1, t) = if pos < first as f64 {
        (first, (first + 1).min(last), 0.0)
    } else if pos >= last as f64 {
        ((last - 1).max(first), last, 1.0)
    } else {
        let i0 = pos.floor() as i64;
        (i0, i0 + 1, pos - i0 as f64)
    };
    (i0 as usize, i1 as usize, t)
}

/// Natural cubic spline through `y` at unit spacing, evaluated at `t`
/// (`t = 0` is `y[0]`).
pub fn spline_eval(y: &[f64], t: f64) -> f64 {
    let n = y.len();
    match n {
        0 => return f64::NAN,
        1 => return y[0],
        2 => return y[0] + (y[1] - y[0]) * t,
        _ => {}
    }

    // Second derivatives; the natural end conditions pin both ends to zero.
    // Interior equations: m[i-1] + 4 m[i] + m[i+1] = 6 (y[i+1] - 2 y[i] + y[i-1]).
    let mut m = vec![0.0; n];
    let k = n - 2;
    let mut c = vec![0.0; k];
    let mut d = vec![0.0; k];
    for idx in 0..k {
        let i = idx + 1;
        let rhs = 6.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]);
        if idx == 0 {
            c[idx] = 1.0 / 4.0;
            d[idx] = rhs / 4.0;
        } else {
            let denom = 4.0 - c[idx - 1];
            c[idx] = 1.0 / denom;
            d[idx] = (rhs - d[idx - 1]) / denom;
        }
    }
    for idx in (0..k).rev() {
        m[idx + 1] = if idx + 1 < k {
            d[idx] - c[idx] * m[idx + 2]
        } else {
            d[idx]
        };
    }

    let seg = (t.floor().max(0.0) as usize).min(n - 2);
    let u = t - seg as f64;
    let w = 1.0 - u;
    w * y[seg]
        + u * y[seg + 1]
        + ((w * w * w - w) * m[seg] + (u * u * u - u) * m[seg + 1]) / 6.0
}

/// Nearest grid node `(col, row)`, or `(-1, -1)` outside the grid.
///
/// Indices are 0-based in the raw file grid: row 0 is `lat_north` and
/// column 0 is `lon_west`, with no margin offset. The same node is
/// `cell(row + 1, col + margin + 1)` in the margin-extended rows of
/// [`UndulationGrid`].
pub fn pixel_coordinate(geometry: &GridGeometry, lon: f64, lat: f64) -> (i64, i64) {
    if !lon.is_finite() || !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return (-1, -1);
    }
    let lon = lon.rem_euclid(360.0);

    let row = ((geometry.lat_north - lat) / geometry.dlat).round() as i64;
    let mut col = ((lon - geometry.lon_west) / geometry.dlon).round() as i64;
    if col < 0 || col >= geometry.ncols as i64 {
        col = col.rem_euclid(geometry.period() as i64);
    }
    if row < 0 || row >= geometry.nrows as i64 || col >= geometry.ncols as i64 {
        return (-1, -1);
    }
    (col, row)
}

/// Extract the grid nodes covering `bbox` as a raster.
///
/// Each node becomes one pixel centred on it. Longitudes may run past 0° or
/// 360°; columns wrap around the globe. Rows are loaded into the grid's
/// cache as they are copied.
///
/// # Errors
///
/// [`GeodemError::EmptyWindow`] when `bbox` is degenerate or lies entirely
/// north or south of the grid.
pub fn join_grid(grid: &mut UndulationGrid, bbox: &BoundingBox) -> Result<DemTile> {
    let g = *grid.geometry();
    let finite = [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
        .iter()
        .all(|v| v.is_finite());
    let lat_south = g.lat_north - (g.nrows - 1) as f64 * g.dlat;
    if !finite
        || bbox.min_x > bbox.max_x
        || bbox.min_y > bbox.max_y
        || bbox.min_y > g.lat_north
        || bbox.max_y < lat_south
    {
        return Err(GeodemError::EmptyWindow { bbox: *bbox });
    }

    let row_start = ((g.lat_north - bbox.max_y) / g.dlat).floor().max(0.0) as usize;
    let row_end = (((g.lat_north - bbox.min_y) / g.dlat).ceil() as usize).min(g.nrows - 1);
    let col_start = ((bbox.min_x - g.lon_west) / g.dlon).floor() as i64;
    let col_end = (((bbox.max_x - g.lon_west) / g.dlon).ceil() as i64).min(col_start + g.period() as i64);

    let period = g.period() as i64;
    let width = (col_end - col_start + 1) as usize;
    let height = row_end - row_start + 1;
    let mut data = Vec::with_capacity(width * height);
    for r in row_start..=row_end {
        let row = grid.row(r + 1)?;
        for c in col_start..=col_end {
            let raw = if (0..g.ncols as i64).contains(&c) {
                c
            } else {
                c.rem_euclid(period)
            };
            let value = row.get(raw as usize + g.margin).copied().unwrap_or(f32::NAN);
            data.push(if (raw as usize) < g.ncols { value } else { f32::NAN });
        }
    }

    let pixel_grid = PixelGrid::new(
        g.lon_west + col_start as f64 * g.dlon - g.dlon / 2.0,
        g.lat_north - row_start as f64 * g.dlat + g.dlat / 2.0,
        g.dlon,
        g.dlat,
        width,
        height,
    );
    DemTile::new(pixel_grid, data, None)
}

impl UndulationGrid {
    /// Undulation at `(lon, lat)` with the default window.
    pub fn undulation(&mut self, lon: f64, lat: f64) -> Result<f64> {
        undulation(self, &InterpolationParams::default(), lon, lat)
    }

    /// See [`pixel_coordinate`].
    pub fn pixel_coordinate(&self, lon: f64, lat: f64) -> (i64, i64) {
        pixel_coordinate(self.geometry(), lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoid::grid::tests::{coarse_geometry, create_test_grid, node_value};
    use tempfile::TempDir;

    fn open_coarse(dir: &TempDir) -> UndulationGrid {
        UndulationGrid::open(create_test_grid(dir.path()), coarse_geometry())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_window_size() {
        let size = |window| InterpolationParams { window, edge_km: 0.0 }.window_size();
        assert_eq!(size(0), 2);
        assert_eq!(size(1), 2);
        assert_eq!(size(2), 2);
        assert_eq!(size(3), 3);
        assert_eq!(size(4), 3);
        assert_eq!(size(5), 5);
        assert_eq!(size(6), 5);
    }

    #[test]
    fn test_spline_eval() {
        let y = [1.0, 4.0, 2.0, 5.0, 3.0];
        for (i, &v) in y.iter().enumerate() {
            assert_close(spline_eval(&y, i as f64), v);
        }
        // Straight lines are reproduced exactly.
        assert_close(spline_eval(&[0.0, 2.0, 4.0, 6.0], 1.25), 2.5);
        // Symmetric data gives a symmetric curve.
        let sym = [0.0, 1.0, 3.0, 1.0, 0.0];
        assert_close(spline_eval(&sym, 1.5), spline_eval(&sym, 2.5));
    }

    #[test]
    fn test_spline_and_bilinear_agree_on_linear_grid() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);

        // Row 2.5, column 1.5 of a field equal to 100 * row + col.
        let spline = undulation(&mut grid, &InterpolationParams::default(), 45.0, 15.0).unwrap();
        assert_close(spline, 251.5);
        let bilinear = undulation(&mut grid, &InterpolationParams::bilinear(), 45.0, 15.0).unwrap();
        assert_close(bilinear, 251.5);
    }

    #[test]
    fn test_node_values() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        assert_close(grid.undulation(60.0, 0.0).unwrap(), f64::from(node_value(3, 2)));
        assert_close(
            undulation(&mut grid, &InterpolationParams::bilinear(), 90.0, 30.0).unwrap(),
            f64::from(node_value(2, 3)),
        );
    }

    #[test]
    fn test_boundary_rows_use_bilinear_clamp() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);

        // The last row cannot host a 5-node window; the bilinear fallback
        // returns the node itself.
        let south = grid.undulation(30.0, -90.0).unwrap();
        assert_close(south, f64::from(grid.cell(7, 5).unwrap()));
        assert_close(south, f64::from(node_value(6, 1)));

        let north = grid.undulation(30.0, 90.0).unwrap();
        assert_close(north, f64::from(node_value(0, 1)));

        // Last raw column (360°) matches its node.
        let east = undulation(&mut grid, &InterpolationParams::bilinear(), 360.0 - 1e-9, 30.0);
        assert_close(east.unwrap(), f64::from(node_value(2, 12)));
    }

    #[test]
    fn test_sentinel_out_of_range() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        assert_eq!(grid.undulation(10.0, 91.0).unwrap(), UNDULATION_SENTINEL);
        assert_eq!(grid.undulation(10.0, -90.5).unwrap(), UNDULATION_SENTINEL);
        assert_eq!(grid.undulation(f64::NAN, 0.0).unwrap(), UNDULATION_SENTINEL);
        assert_eq!(grid.undulation(0.0, f64::INFINITY).unwrap(), UNDULATION_SENTINEL);
        // Nothing was read for rejected points.
        assert_eq!(grid.cached_rows(), 0);
    }

    #[test]
    fn test_longitude_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let west = grid.undulation(-30.0, 0.0).unwrap();
        let east = grid.undulation(330.0, 0.0).unwrap();
        assert_close(west, east);
        let wrapped = grid.undulation(690.0, 0.0).unwrap();
        assert_close(wrapped, east);
    }

    #[test]
    fn test_edge_exclusion() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let params = InterpolationParams {
            window: 5,
            edge_km: 4000.0,
        };
        // Two rows on each side are excluded: 75°N is inside the band.
        assert_eq!(
            undulation(&mut grid, &params, 45.0, 75.0).unwrap(),
            UNDULATION_SENTINEL
        );
        // At the equator the spline window reaches into the band, so the
        // bilinear fallback answers.
        assert_close(undulation(&mut grid, &params, 45.0, 0.0).unwrap(), 301.5);
    }

    #[test]
    fn test_pixel_coordinate() {
        let g = coarse_geometry();
        assert_eq!(pixel_coordinate(&g, 0.0, 90.0), (0, 0));
        assert_eq!(pixel_coordinate(&g, 45.0, 15.0), (2, 3));
        assert_eq!(pixel_coordinate(&g, -30.0, 0.0), (11, 3));
        assert_eq!(pixel_coordinate(&g, 359.9, -90.0), (12, 6));
        assert_eq!(pixel_coordinate(&g, 0.0, 91.0), (-1, -1));
        assert_eq!(pixel_coordinate(&g, f64::NAN, 0.0), (-1, -1));

        // Raw indices; the margin is only added when addressing cached rows.
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let (col, row) = grid.pixel_coordinate(45.0, 15.0);
        let (col, row) = (col as usize, row as usize);
        assert_eq!(
            grid.cell(row + 1, col + g.margin + 1).unwrap(),
            node_value(row, col)
        );

        let egm96 = GridGeometry::egm96_15min();
        let (col, row) = pixel_coordinate(&egm96, 0.0, 90.0);
        assert_eq!((col, row), (0, 0));
        assert!(col < (egm96.ncols + 2 * egm96.margin) as i64);
        assert!(row < (egm96.nrows + 2 * egm96.margin) as i64);
    }

    #[test]
    fn test_join_grid() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let raster = join_grid(&mut grid, &BoundingBox::new(25.0, -5.0, 65.0, 35.0)).unwrap();

        assert_eq!((raster.width(), raster.height()), (4, 4));
        assert_eq!(raster.grid().west, -15.0);
        assert_eq!(raster.grid().north, 75.0);
        assert_eq!(raster.data()[0], node_value(1, 0));
        assert_eq!(raster.data()[15], node_value(4, 3));
        assert_eq!(grid.cached_rows(), 4);

        // Each pixel is centred on its node.
        assert_eq!(raster.get_elevation(60.0, 0.0), Some(f64::from(node_value(3, 2))));
    }

    #[test]
    fn test_join_grid_wraps_columns() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let raster = join_grid(&mut grid, &BoundingBox::new(-40.0, 0.0, 10.0, 10.0)).unwrap();

        assert_eq!((raster.width(), raster.height()), (4, 2));
        assert_eq!(raster.grid().west, -75.0);
        let first_row: Vec<f32> = raster.data()[..4].to_vec();
        assert_eq!(
            first_row,
            vec![
                node_value(2, 10),
                node_value(2, 11),
                node_value(2, 0),
                node_value(2, 1)
            ]
        );
    }

    #[test]
    fn test_join_grid_empty_window() {
        let dir = TempDir::new().unwrap();
        let mut grid = open_coarse(&dir);
        let result = join_grid(&mut grid, &BoundingBox::new(0.0, 95.0, 10.0, 100.0));
        assert!(matches!(result, Err(GeodemError::EmptyWindow { .. })));
        let result = join_grid(&mut grid, &BoundingBox::new(10.0, 0.0, 0.0, 10.0));
        assert!(matches!(result, Err(GeodemError::EmptyWindow { .. })));
    }
}
