use anyhow::{bail, Result};
use openelev::catalog;
use std::path::Path;

pub fn run(tif_directory: &Path) -> Result<()> {
    if !tif_directory.exists() {
        bail!("Tile directory does not exist: {}", tif_directory.display());
    }

    let report = catalog::scan(tif_directory)?;

    if report.tiles.is_empty() {
        println!("No raster tiles found in: {}", tif_directory.display());
        return Ok(());
    }

    println!("{:<40} {:>14} {:>28}", "TILE", "PIXELS", "COVERAGE");
    println!("{}", "-".repeat(84));

    for tile in &report.tiles {
        let name = tile
            .path
            .strip_prefix(tif_directory)
            .unwrap_or(&tile.path)
            .display()
            .to_string();
        let pixels = format!("{}x{}", tile.width, tile.height);
        let coverage = format!(
            "[{:.2}, {:.2}] x [{:.2}, {:.2}]",
            tile.bounds.min_lat, tile.bounds.max_lat, tile.bounds.min_lon, tile.bounds.max_lon
        );
        println!("{:<40} {:>14} {:>28}", name, pixels, coverage);
    }

    println!();
    println!("Summary:");
    println!("  Total tiles: {}", report.tiles.len());
    if report.skipped > 0 {
        println!("  Skipped (unreadable): {}", report.skipped);
    }
    println!("  Tile directory: {}", tif_directory.display());

    Ok(())
}
