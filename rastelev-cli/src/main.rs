use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Raster elevation query CLI tool
#[derive(Parser)]
#[command(name = "rastelev")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path or URL of the GeoTIFF elevation raster
    #[arg(short, long, env = "RASTELEV_DATASET", global = true)]
    dataset: Option<String>,

    /// Maximum raster chunks in cache
    #[arg(
        short,
        long,
        env = "RASTELEV_CHUNK_CACHE",
        default_value = "256",
        global = true
    )]
    cache_size: u64,

    /// CRS of the dataset, for rasters without geokeys (e.g. EPSG:2056)
    #[arg(long, env = "RASTELEV_DATASET_CRS", global = true)]
    dataset_crs: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation at a single point
    Point {
        /// X coordinate (easting or longitude)
        #[arg(allow_negative_numbers = true)]
        x: f64,

        /// Y coordinate (northing or latitude)
        #[arg(allow_negative_numbers = true)]
        y: f64,

        /// CRS of the point (defaults to the dataset's CRS)
        #[arg(long)]
        crs: Option<String>,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Sample an elevation profile along a polyline
    Profile {
        /// Vertices as x,y pairs (at least two)
        #[arg(allow_negative_numbers = true, required_unless_present = "request")]
        coordinates: Vec<String>,

        /// JSON file holding a full profile request instead of vertices
        #[arg(short, long, conflicts_with = "coordinates")]
        request: Option<PathBuf>,

        /// Segment lengths, comma separated (planar lengths if omitted)
        #[arg(long, value_delimiter = ',')]
        distances: Option<Vec<f64>>,

        /// Number of evenly spaced samples
        #[arg(short, long, default_value = "100")]
        samples: usize,

        /// CRS of the vertices (defaults to the dataset's CRS)
        #[arg(long)]
        crs: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: commands::profile::OutputFormat,
    },

    /// Add elevations to coordinates from a file
    Batch {
        /// Input file (CSV or GeoJSON)
        input: PathBuf,

        /// Output file (same format as input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for x (CSV only)
        #[arg(long, default_value = "x")]
        x_col: String,

        /// Column name for y (CSV only)
        #[arg(long, default_value = "y")]
        y_col: String,

        /// CRS of the input coordinates (defaults to the dataset's CRS)
        #[arg(long)]
        crs: Option<String>,
    },

    /// Display information about the dataset
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = commands::DatasetOptions {
        dataset: cli.dataset,
        cache_size: cli.cache_size,
        dataset_crs: cli.dataset_crs,
    };

    match cli.command {
        Commands::Point { x, y, crs, json } => commands::point::run(&options, x, y, crs, json),
        Commands::Profile {
            coordinates,
            request,
            distances,
            samples,
            crs,
            format,
        } => commands::profile::run(
            &options,
            coordinates,
            request,
            distances,
            samples,
            crs,
            format,
        ),
        Commands::Batch {
            input,
            output,
            x_col,
            y_col,
            crs,
        } => commands::batch::run(&options, input, output, x_col, y_col, crs),
        Commands::Info => commands::info::run(&options),
    }
}
