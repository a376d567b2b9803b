use anyhow::Result;
use geodem::BoundingBox;

use super::GlobalArgs;

pub fn run(global: &GlobalArgs, bbox: Option<BoundingBox>) -> Result<()> {
    let service = global.build_service()?;

    let mut frames = service.enumerate_frame_rectangles(bbox.as_ref());
    if frames.is_empty() {
        println!(
            "No {} tiles found on: {}",
            service.dataset(),
            format_roots(&service)
        );
        return Ok(());
    }

    // Sort by filename
    frames.sort_by(|a, b| a.name.cmp(&b.name));

    let width = frames.iter().map(|f| f.name.len()).max().unwrap_or(4).max(4);
    println!("{:<width$} {:>12} {:>12} {:>12} {:>12}", "TILE", "WEST", "SOUTH", "EAST", "NORTH");
    println!("{}", "-".repeat(width + 52));

    let mut total_size: u64 = 0;
    for frame in &frames {
        total_size += std::fs::metadata(&frame.path).map(|m| m.len()).unwrap_or(0);
        let b = frame.bounds;
        println!(
            "{:<width$} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
            frame.name, b.min_x, b.min_y, b.max_x, b.max_y
        );
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Dataset: {}", service.dataset());
    println!("  Total tiles: {}", frames.len());
    println!("  Total size: {}", format_size(total_size));
    println!("  Search path: {}", format_roots(&service));

    Ok(())
}

fn format_roots(service: &geodem::GdemService) -> String {
    service
        .search_path()
        .roots()
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
