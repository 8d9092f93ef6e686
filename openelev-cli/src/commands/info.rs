use anyhow::{bail, Context, Result};
use openelev::Tile;
use std::path::Path;

pub fn run(file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("File not found: {}", file.display());
    }

    let tile = Tile::from_file(file, 0).context("Failed to read raster metadata")?;
    let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);

    println!("File:       {}", file.display());
    println!("Size:       {}", format_size(size));
    println!("Dimensions: {} x {} pixels", tile.width, tile.height);
    println!(
        "Pixel size: {:.6} x {:.6} degrees",
        tile.transform.pixel_width, tile.transform.pixel_height
    );
    println!(
        "Bounds:     lat [{:.4}, {:.4}], lon [{:.4}, {:.4}]",
        tile.bounds.min_lat, tile.bounds.max_lat, tile.bounds.min_lon, tile.bounds.max_lon
    );
    println!("CRS:        {}", tile.crs);
    match tile.nodata {
        Some(nodata) => println!("Nodata:     {}", nodata),
        None => println!("Nodata:     (none declared)"),
    }

    Ok(())
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
