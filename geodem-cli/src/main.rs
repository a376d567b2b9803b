use anyhow::Result;
use clap::{Parser, Subcommand};
use geodem::BoundingBox;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{parse_bbox, GlobalArgs};

/// Tiled DEM and geoid undulation CLI tool
#[derive(Parser)]
#[command(name = "geodem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation for a single coordinate
    Query {
        /// Easting or longitude
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,

        /// Northing or latitude
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,

        /// Use bilinear interpolation for sub-pixel accuracy
        #[arg(short, long)]
        interpolate: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Resolve the tiles overlapping a window
    Window {
        /// Window as xmin,ymin,xmax,ymax
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: BoundingBox,

        /// Fail if no tile is found
        #[arg(long)]
        fail_hard: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Mosaic the tiles overlapping a window into one GeoTIFF
    Mosaic {
        /// Window as xmin,ymin,xmax,ymax
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: BoundingBox,

        /// Output GeoTIFF
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List tile files on the search path
    List {
        /// Only tiles overlapping xmin,ymin,xmax,ymax
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,
    },

    /// Interpolate the geoid undulation at a point
    Geoid {
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Interpolation window in nodes (2 = bilinear)
        #[arg(short, long, default_value = "5")]
        window: usize,

        /// Reject points closer than this to the grid edge (km)
        #[arg(long, default_value = "0")]
        edge_km: f64,
    },

    /// Add elevations to the coordinates of a CSV file
    Batch {
        /// Input CSV file
        input: PathBuf,

        /// Output file (defaults to <input>_elevation.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for easting or longitude
        #[arg(long, default_value = "x")]
        x_col: String,

        /// Column name for northing or latitude
        #[arg(long, default_value = "y")]
        y_col: String,

        /// Use bilinear interpolation
        #[arg(short, long)]
        interpolate: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geodem=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Query {
            x,
            y,
            interpolate,
            json,
        } => commands::query::run(&cli.global, x, y, interpolate, json),
        Commands::Window {
            bbox,
            fail_hard,
            json,
        } => commands::window::run(&cli.global, bbox, fail_hard, json),
        Commands::Mosaic { bbox, output } => commands::mosaic::run(&cli.global, bbox, output),
        Commands::List { bbox } => commands::list::run(&cli.global, bbox),
        Commands::Geoid {
            lon,
            lat,
            window,
            edge_km,
        } => commands::geoid::run(&cli.global, lon, lat, window, edge_km),
        Commands::Batch {
            input,
            output,
            x_col,
            y_col,
            interpolate,
        } => commands::batch::run(&cli.global, input, output, x_col, y_col, interpolate),
    }
}
