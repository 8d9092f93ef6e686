use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openelev::Settings;
use std::path::PathBuf;

mod commands;

/// GeoTIFF elevation query tool
#[derive(Parser)]
#[command(name = "openelev")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing raster tiles
    #[arg(short, long, env = "TIF_DIRECTORY", global = true)]
    tif_directory: Option<PathBuf>,

    /// Elevation cache capacity
    #[arg(long, env = "CACHE_MAX_SIZE", default_value = "100000", global = true)]
    cache_max_size: u64,

    /// Maximum concurrent raster reads
    #[arg(long, env = "MAX_WORKERS", default_value = "100", global = true)]
    max_workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Append an elevation column to a CSV of coordinates
    Batch {
        /// Input CSV file
        input: PathBuf,

        /// Output file (defaults to <input>_elevation.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude
        #[arg(long, default_value = "lon")]
        lon_col: String,
    },

    /// Display georeferencing metadata for a raster file
    Info {
        /// Path to a GeoTIFF file
        file: PathBuf,
    },

    /// List the tiles in the catalog
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Query { lat, lon, json } => {
            commands::query::run(settings(&cli)?, lat, lon, json).await
        }
        Commands::Batch {
            ref input,
            ref output,
            ref lat_col,
            ref lon_col,
        } => {
            commands::batch::run(
                settings(&cli)?,
                input.clone(),
                output.clone(),
                lat_col,
                lon_col,
            )
            .await
        }
        Commands::Info { ref file } => commands::info::run(file),
        Commands::List => commands::list::run(&tif_directory(&cli)?),
    }
}

fn settings(cli: &Cli) -> Result<Settings> {
    Ok(Settings::new(tif_directory(cli)?)
        .cache_max_size(cli.cache_max_size)
        .max_workers(cli.max_workers))
}

fn tif_directory(cli: &Cli) -> Result<PathBuf> {
    cli.tif_directory.clone().context(
        "TIF_DIRECTORY environment variable not set. Use --tif-directory or set TIF_DIRECTORY",
    )
}
