//! Basic example demonstrating geodem library usage.
//!
//! Run with: cargo run --example basic -- /path/to/srtm/tiles

use geodem::{BoundingBox, Dataset, GdemService, GeodemError, SearchPath};
use std::env;

fn main() -> Result<(), GeodemError> {
    // Get data directory from command line
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/srtm/tiles");
        std::process::exit(1);
    });

    let service = GdemService::new(Dataset::Srtm, SearchPath::new([&data_dir]));

    // Query some peaks (longitude, latitude)
    let locations = [
        ("Mount Olympus, Greece", 22.3583, 40.0856),
        ("Mount Etna, Italy", 14.9934, 37.7510),
        ("Mont Blanc, France", 6.8652, 45.8326),
    ];

    println!("Elevation queries:");
    println!("{:-<60}", "");

    for (name, lon, lat) in &locations {
        let nearest = service.point_elevation(*lon, *lat)?;
        let smooth = service.point_elevation_interpolated(*lon, *lat)?;
        match (nearest, smooth) {
            (Some(h), Some(hi)) => println!("{name}: {h:.0}m (interpolated {hi:.1}m)"),
            (Some(h), None) => println!("{name}: {h:.0}m"),
            _ => println!("{name}: no data (tile missing or void)"),
        }
    }

    // Tiles around the Aegean
    let window = BoundingBox::new(20.0, 35.0, 30.0, 42.0);
    let result = service.query_window(&window)?;
    println!("\nWindow {window}:");
    println!("  Tiles available: {}", result.tiles.len());
    println!("  Tiles missing: {}", result.not_found.len());

    // Show cache statistics
    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Disk probes: {}", stats.probe_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
