use anyhow::{Context, Result};
use geodem::{BoundingBox, TileIndex};
use serde::Serialize;

use super::GlobalArgs;

#[derive(Serialize)]
struct WindowResponse {
    bbox: [f64; 4],
    tiles: usize,
    loaded: Vec<String>,
    not_found: Vec<String>,
    not_covered: Vec<[i32; 2]>,
}

pub fn run(global: &GlobalArgs, bbox: BoundingBox, fail_hard: bool, json: bool) -> Result<()> {
    let service = global.build_service()?;

    let result = service
        .query_window(&bbox)
        .with_context(|| format!("Window query failed for {bbox}"))?;
    // Served from the cache: logs the gaps and applies --fail-hard
    service.query_window_or_fail(&bbox, fail_hard)?;

    let names = |indices: &[TileIndex]| -> Vec<String> {
        indices
            .iter()
            .map(|i| service.scheme().frame_name(*i))
            .collect()
    };
    let response = WindowResponse {
        bbox: [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y],
        tiles: result.tiles.len(),
        loaded: names(&result.loaded),
        not_found: names(&result.not_found),
        not_covered: result.not_covered.iter().map(|i| [i.nl, i.np]).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Window {} ({})", bbox, service.dataset());
    println!("  Tiles: {}", response.tiles);
    for name in &response.loaded {
        println!("    {}", name);
    }
    if !response.not_found.is_empty() {
        println!("  Not found: {}", response.not_found.len());
        for name in &response.not_found {
            println!("    {}", name);
        }
    }
    if !response.not_covered.is_empty() {
        println!("  Outside dataset: {}", response.not_covered.len());
    }

    Ok(())
}
