//! Geoid undulation grids.
//!
//! [`UndulationGrid`] gives row-cached access to a global grid of geoid
//! heights above the WGS84 ellipsoid; [`interp`] turns it into point values.
//!
//! ```ignore
//! use geodem::geoid::{GridGeometry, UndulationGrid};
//!
//! let mut grid = UndulationGrid::open("/data/geoid/egm96_15.grd", GridGeometry::egm96_15min());
//! let n = grid.undulation(23.7, 37.9)?;
//! ```

pub mod grid;
pub mod interp;

pub use grid::{GridGeometry, UndulationGrid, GEOID_FILE_ENV};
pub use interp::{
    interpolate, join_grid, pixel_coordinate, undulation, InterpolationParams,
    UNDULATION_SENTINEL,
};
