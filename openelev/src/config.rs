//! Engine configuration, sourced from the environment.

use std::env;
use std::path::PathBuf;

/// Default elevation cache capacity (quantized coordinate entries).
pub const DEFAULT_CACHE_MAX_SIZE: u64 = 100_000;

/// Default bound on concurrent blocking raster reads.
pub const DEFAULT_MAX_WORKERS: usize = 100;

/// Engine settings.
///
/// # Environment Variables
///
/// | Variable | Description | Default |
/// |----------|-------------|---------|
/// | `TIF_DIRECTORY` | Directory containing raster tiles | `/app/tif_files` |
/// | `INDEX_DIRECTORY` | Persisted spatial index location | `<TIF_DIRECTORY>/index` |
/// | `CACHE_MAX_SIZE` | Elevation cache capacity | 100000 |
/// | `MAX_WORKERS` | Worker pool bound | 100 |
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory scanned for raster tiles.
    pub tif_directory: PathBuf,
    /// Directory holding the persisted spatial index.
    pub index_directory: PathBuf,
    /// Elevation cache capacity.
    pub cache_max_size: u64,
    /// Upper bound on concurrently executing raster reads.
    pub max_workers: usize,
}

impl Settings {
    /// Settings for a tile directory, everything else defaulted.
    pub fn new<P: Into<PathBuf>>(tif_directory: P) -> Self {
        let tif_directory = tif_directory.into();
        let index_directory = tif_directory.join("index");
        Self {
            tif_directory,
            index_directory,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let tif_directory = PathBuf::from(
            env::var("TIF_DIRECTORY").unwrap_or_else(|_| "/app/tif_files".to_string()),
        );
        let index_directory = env::var("INDEX_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| tif_directory.join("index"));
        let cache_max_size = env::var("CACHE_MAX_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_MAX_SIZE);
        let max_workers = env::var("MAX_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_WORKERS);

        Self {
            tif_directory,
            index_directory,
            cache_max_size,
            max_workers,
        }
    }

    /// Override the index directory.
    pub fn index_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.index_directory = dir.into();
        self
    }

    /// Override the elevation cache capacity.
    pub fn cache_max_size(mut self, size: u64) -> Self {
        self.cache_max_size = size;
        self
    }

    /// Override the worker pool bound.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }
}
