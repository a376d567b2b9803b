use anyhow::{Context, Result};
use geodem::geoid::undulation;
use geodem::{InterpolationParams, UNDULATION_SENTINEL};

use super::GlobalArgs;

pub fn run(global: &GlobalArgs, lon: f64, lat: f64, window: usize, edge_km: f64) -> Result<()> {
    let search = global.search_path()?;
    let mut grid = global
        .geoid_grid(&search)?
        .context("No geoid grid configured. Use --geoid or set GEODEM_GEOID_FILE")?;

    let params = InterpolationParams { window, edge_km };
    let n = undulation(&mut grid, &params, lon, lat).context("Failed to interpolate undulation")?;

    if n == UNDULATION_SENTINEL {
        println!("out of range");
    } else {
        println!("{:.3}", n);
    }
    Ok(())
}
