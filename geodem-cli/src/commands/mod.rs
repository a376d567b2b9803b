pub mod batch;
pub mod geoid;
pub mod list;
pub mod mosaic;
pub mod query;
pub mod window;

use anyhow::{Context, Result};
use clap::Args;
use geodem::{BoundingBox, Dataset, GdemService, SearchPath, UndulationGrid};
use std::ffi::OsStr;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directories holding the tiles (platform path-list syntax)
    #[arg(short, long, env = "GEODEM_PATH", global = true)]
    pub path: Option<String>,

    /// Dataset name (srtm, srtm1arc, aster, aw3d30, tandemx30, greek-lso, ...)
    #[arg(
        short,
        long,
        env = "GEODEM_DATASET",
        default_value = "srtm",
        global = true
    )]
    pub dataset: Dataset,

    /// Geoid undulation grid, as a path or a file name on the search path
    #[arg(long, env = "GEODEM_GEOID_FILE", global = true)]
    pub geoid: Option<String>,

    /// Maximum tiles kept in memory
    #[arg(long, env = "GEODEM_CACHE_SIZE", global = true)]
    pub cache_size: Option<u64>,

    /// Nodata value for tiles that do not declare one
    #[arg(long, env = "GEODEM_NODATA", global = true, allow_hyphen_values = true)]
    pub nodata: Option<f32>,
}

impl GlobalArgs {
    pub fn search_path(&self) -> Result<SearchPath> {
        let path = self
            .path
            .as_deref()
            .context("GEODEM_PATH environment variable not set. Use --path or set GEODEM_PATH")?;
        let search = SearchPath::from_env_value(OsStr::new(path));
        if search.is_empty() {
            anyhow::bail!("Search path lists no directory: {path:?}");
        }
        Ok(search)
    }

    /// The undulation grid, if one was configured.
    pub fn geoid_grid(&self, search: &SearchPath) -> Result<Option<UndulationGrid>> {
        self.geoid
            .as_deref()
            .map(|name| {
                UndulationGrid::locate(name, search)
                    .with_context(|| format!("Failed to open geoid grid {name}"))
            })
            .transpose()
    }

    /// Build the elevation service from the shared options.
    pub fn build_service(&self) -> Result<GdemService> {
        let search = self.search_path()?;
        let mut builder = GdemService::builder(self.dataset);

        if let Some(grid) = self.geoid_grid(&search)? {
            builder = builder.geoid(grid);
        }
        if let Some(size) = self.cache_size {
            builder = builder.cache_size(size);
        }
        if let Some(nodata) = self.nodata {
            builder = builder.nodata(nodata);
        }

        builder
            .search_path(search)
            .build()
            .context("Failed to create DEM service")
    }
}

/// Parse `xmin,ymin,xmax,ymax`.
pub fn parse_bbox(s: &str) -> std::result::Result<BoundingBox, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in {s:?}: {e}"))?;
    match values.as_slice() {
        &[x0, y0, x1, y1] => Ok(BoundingBox::from_corners((x0, y0), (x1, y1))),
        _ => Err(format!(
            "expected xmin,ymin,xmax,ymax, got {} value(s)",
            values.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("20,35,25.5,40").unwrap(),
            BoundingBox::new(20.0, 35.0, 25.5, 40.0)
        );
        // Corners in any order.
        assert_eq!(
            parse_bbox("25, 40, 20, 35").unwrap(),
            BoundingBox::new(20.0, 35.0, 25.0, 40.0)
        );
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}
