use anyhow::{bail, Context, Result};
use geodem::GdemService;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::GlobalArgs;

pub fn run(
    global: &GlobalArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    x_col: String,
    y_col: String,
    interpolate: bool,
) -> Result<()> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "csv" {
        bail!("Unsupported file format: {}. Use .csv", extension);
    }

    let service = global.build_service()?;
    let output_path = output.unwrap_or_else(|| default_output(&input));
    process_csv(&service, &input, &output_path, &x_col, &y_col, interpolate)?;

    let stats = service.cache_stats();
    println!("Output written to: {}", output_path.display());
    println!(
        "Tiles loaded: {}, missing: {}",
        stats.entry_count, stats.not_found_count
    );
    Ok(())
}

/// `<input stem>_elevation.csv` next to the input.
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_elevation.csv", stem))
}

fn process_csv(
    service: &GdemService,
    input: &Path,
    output: &Path,
    x_col: &str,
    y_col: &str,
    interpolate: bool,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let x_idx = headers
        .iter()
        .position(|h| h == x_col)
        .with_context(|| format!("Column '{}' not found in CSV", x_col))?;
    let y_idx = headers
        .iter()
        .position(|h| h == y_col)
        .with_context(|| format!("Column '{}' not found in CSV", y_col))?;

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let total = records.len() as u64;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let output_file = File::create(output).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    // Write header
    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("elevation");
    writer.write_record(&new_headers)?;

    for (line, record) in records.iter().enumerate() {
        let x: f64 = record
            .get(x_idx)
            .context("Missing x")?
            .trim()
            .parse()
            .with_context(|| format!("Invalid x on record {}", line + 1))?;
        let y: f64 = record
            .get(y_idx)
            .context("Missing y")?
            .trim()
            .parse()
            .with_context(|| format!("Invalid y on record {}", line + 1))?;

        let elevation = if interpolate {
            service.point_elevation_interpolated(x, y)
        } else {
            service.point_elevation(x, y)
        }
        .with_context(|| format!("Failed to get elevation at ({x}, {y})"))?;
        let elevation = match elevation {
            Some(h) if interpolate => format!("{:.2}", h),
            Some(h) => h.to_string(),
            None => "void".to_string(),
        };

        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        writer.write_record(&new_record)?;

        pb.inc(1);
    }

    pb.finish_with_message("done");
    writer.flush()?;
    Ok(())
}
