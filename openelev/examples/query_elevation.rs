//! Query the elevation at a coordinate from a local tile directory.
//!
//! Usage: cargo run --example query_elevation -- <tif_dir> <lat> <lon>

use openelev::{Coordinate, ElevationEngine, Settings};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: query_elevation <tif_dir> <lat> <lon>");
        std::process::exit(2);
    }

    let lat: f64 = args[2].parse()?;
    let lon: f64 = args[3].parse()?;

    let engine = ElevationEngine::initialize(Settings::new(&args[1]))?;
    let elevation = engine.lookup(Coordinate::new(lat, lon)?).await?;
    println!("Elevation at ({lat}, {lon}): {elevation:.1}m");

    Ok(())
}
