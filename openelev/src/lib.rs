//! # OpenElev - GeoTIFF Elevation Lookup Engine
//!
//! Answers "what is the ground elevation at (lat, lon)?" from a directory
//! of GeoTIFF raster tiles.
//!
//! ## How it works
//!
//! - **Catalog**: the tile directory is scanned once; each file's
//!   bounding box, affine geotransform, dimensions, nodata sentinel, and
//!   CRS become an immutable [`Tile`] record.
//! - **Spatial index**: an R-tree over tile bounding boxes resolves a
//!   coordinate to its covering tiles in deterministic priority order.
//!   The index is persisted to disk and reloaded on start while the
//!   directory's content signature is unchanged.
//! - **Sampler**: one pixel is read per query via the tile's inverse
//!   affine transform, decoding only the TIFF chunk that holds it.
//! - **Cache**: outcomes (elevations and "no data" alike) are cached
//!   under quantized coordinate keys with a bounded capacity.
//! - **Worker pool**: raster reads are blocking I/O and run on a
//!   semaphore-bounded blocking pool, never on the async runtime itself.
//!
//! ## Quick Start
//!
//! ```ignore
//! use openelev::{Coordinate, ElevationEngine, Settings};
//!
//! let engine = ElevationEngine::initialize(Settings::from_env())?;
//!
//! let coord = Coordinate::new(47.6062, -122.3321)?; // Seattle
//! let elevation = engine.lookup(coord).await?;
//! println!("Elevation: {elevation}m");
//! ```

pub mod catalog;
pub mod config;
pub mod coord;
pub mod engine;
pub mod error;
pub mod index;
pub mod raster;
pub mod tile;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main types at crate root for convenience
pub use config::Settings;
pub use coord::Coordinate;
pub use engine::{ElevationEngine, EngineStats, ReindexStats};
pub use error::{ElevationError, Result};
pub use index::SpatialIndex;
pub use raster::Sample;
pub use tile::{GeoTransform, Tile, TileBounds};
