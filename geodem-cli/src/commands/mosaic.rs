use anyhow::{bail, Context, Result};
use geodem::{write_geotiff, BoundingBox};
use std::path::PathBuf;

use super::GlobalArgs;

pub fn run(global: &GlobalArgs, bbox: BoundingBox, output: PathBuf) -> Result<()> {
    let service = global.build_service()?;

    let Some(mosaic) = service
        .join_dem(&bbox)
        .with_context(|| format!("Failed to mosaic {bbox}"))?
    else {
        bail!("No tiles found in window {bbox}");
    };

    write_geotiff(&output, &mosaic)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let stats = service.cache_stats();
    println!(
        "Wrote {}x{} mosaic of {} tile(s) to {}",
        mosaic.width(),
        mosaic.height(),
        stats.entry_count,
        output.display()
    );
    println!("  Extent: {}", mosaic.bounds());
    Ok(())
}
