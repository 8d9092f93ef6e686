//! The elevation lookup engine.
//!
//! [`ElevationEngine`] owns the spatial index, the outcome cache, and the
//! bounded pool for blocking raster reads. One instance serves all
//! concurrent requests; construct it once at startup with
//! [`ElevationEngine::initialize`], swap its tile set with
//! [`ElevationEngine::reindex`], and stop it with
//! [`ElevationEngine::shutdown`].
//!
//! # Example
//!
//! ```ignore
//! use openelev::{Coordinate, ElevationEngine, Settings};
//!
//! let engine = ElevationEngine::initialize(Settings::new("/data/tiles"))?;
//! let elevation = engine.lookup(Coordinate::new(47.5, -122.5)?).await?;
//! println!("Elevation: {elevation}m");
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::config::Settings;
use crate::coord::Coordinate;
use crate::error::{ElevationError, Result};
use crate::index::SpatialIndex;
use crate::raster::{self, Sample};
use crate::tile::Tile;

/// Upper bound on one raster read, pool queueing excluded. A stuck read
/// degrades to a per-tile failure instead of hanging the request.
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully resolved outcome, cached under the quantized coordinate key.
/// Negative outcomes are cached too: recomputing them costs a full index
/// query plus up to one read per covering tile.
#[derive(Debug, Clone, Copy)]
enum CachedOutcome {
    Elevation(f64),
    NoCoverage,
}

/// How one candidate tile resolved.
enum TileOutcome {
    Value(f64),
    NoData,
    Failed,
}

/// Counters exposed by [`ElevationEngine::stats`].
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Entries currently in the elevation cache.
    pub cache_entries: u64,
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Lookups that had to consult the index.
    pub cache_misses: u64,
    /// Total single-pixel raster reads performed.
    pub raster_reads: u64,
    /// Tiles in the current spatial index.
    pub indexed_tiles: usize,
}

impl EngineStats {
    /// Cache hit rate (0.0 to 1.0); 0.0 before any lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Result of one [`ElevationEngine::reindex`] run.
#[derive(Debug, Clone, Default)]
pub struct ReindexStats {
    /// Tiles in the rebuilt index.
    pub indexed_tiles: usize,
    /// Wall time of the rescan in milliseconds.
    pub elapsed_ms: u64,
}

/// Elevation lookup engine.
pub struct ElevationEngine {
    settings: Settings,
    /// Swapped wholesale by reindex; lookups clone the Arc out and never
    /// hold the lock across I/O.
    index: RwLock<Arc<SpatialIndex>>,
    cache: Cache<(i64, i64), CachedOutcome>,
    workers: Arc<Semaphore>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    read_count: Arc<AtomicU64>,
}

impl ElevationEngine {
    /// Build or load the spatial index and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::IndexUnavailable`] when the tile
    /// directory is missing or holds no readable tiles. Fatal at startup.
    pub fn initialize(settings: Settings) -> Result<Self> {
        let index = SpatialIndex::build_or_load(&settings)?;
        tracing::info!(
            tiles = index.len(),
            cache_max_size = settings.cache_max_size,
            max_workers = settings.max_workers,
            "elevation engine initialized"
        );
        Ok(Self {
            cache: Cache::builder()
                .max_capacity(settings.cache_max_size)
                .build(),
            workers: Arc::new(Semaphore::new(settings.max_workers)),
            index: RwLock::new(Arc::new(index)),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            read_count: Arc::new(AtomicU64::new(0)),
            settings,
        })
    }

    /// Look up the elevation at a validated coordinate.
    ///
    /// Cache hits resolve synchronously without touching the worker pool.
    /// On a miss the spatial index is queried and candidate tiles are
    /// sampled in priority order; nodata and read failures fall through
    /// to the next overlapping tile.
    ///
    /// # Errors
    ///
    /// [`ElevationError::NoCoverage`] when no tile covers the coordinate
    /// or every covering tile is nodata there;
    /// [`ElevationError::Shutdown`] when the engine was stopped.
    pub async fn lookup(&self, coord: Coordinate) -> Result<f64> {
        let key = coord.cache_key();

        if let Some(outcome) = self.cache.get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return match outcome {
                CachedOutcome::Elevation(v) => Ok(v),
                CachedOutcome::NoCoverage => Err(no_coverage(coord)),
            };
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let index = Arc::clone(&self.index.read().expect("index lock poisoned"));
        let candidates = index.query(coord);
        if candidates.is_empty() {
            self.cache.insert(key, CachedOutcome::NoCoverage);
            return Err(no_coverage(coord));
        }

        let mut failed_reads = 0usize;
        for tile in candidates {
            match self.sample_tile(tile, coord).await? {
                TileOutcome::Value(v) => {
                    self.cache.insert(key, CachedOutcome::Elevation(v));
                    return Ok(v);
                }
                TileOutcome::NoData => {}
                TileOutcome::Failed => failed_reads += 1,
            }
        }

        // A dataset gap looks like missing coverage, not a server error.
        // Outcomes that involved read errors are not cached: a transient
        // failure must not poison the negative cache.
        if failed_reads == 0 {
            self.cache.insert(key, CachedOutcome::NoCoverage);
        }
        Err(no_coverage(coord))
    }

    /// Resolve a batch strictly in input order.
    ///
    /// Each item is awaited before the next starts, so a duplicate later
    /// in the batch is served by the completed cache write of its
    /// predecessor rather than a second raster read.
    pub async fn lookup_many(&self, coords: &[Coordinate]) -> Vec<Result<f64>> {
        let mut results = Vec::with_capacity(coords.len());
        for &coord in coords {
            results.push(self.lookup(coord).await);
        }
        results
    }

    /// Submit one blocking sample to the worker pool and wait for it.
    ///
    /// The permit is held for the duration of the read, bounding the
    /// number of concurrently open raster files. On timeout the running
    /// read is abandoned, not killed; it releases its permit when it
    /// finishes on its own.
    async fn sample_tile(&self, tile: Arc<Tile>, coord: Coordinate) -> Result<TileOutcome> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| ElevationError::Shutdown)?;
        let reads = Arc::clone(&self.read_count);
        let path = tile.path.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            reads.fetch_add(1, Ordering::Relaxed);
            raster::sample(&tile, coord)
        });

        match timeout(SAMPLE_TIMEOUT, task).await {
            Ok(Ok(Ok(Sample::Elevation(v)))) => Ok(TileOutcome::Value(v)),
            Ok(Ok(Ok(Sample::NoData))) => Ok(TileOutcome::NoData),
            Ok(Ok(Err(err))) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "raster read failed, falling through to next candidate"
                );
                Ok(TileOutcome::Failed)
            }
            Ok(Err(join_err)) => {
                tracing::error!(path = %path.display(), error = %join_err, "raster read task died");
                Ok(TileOutcome::Failed)
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "raster read timed out");
                Ok(TileOutcome::Failed)
            }
        }
    }

    /// Rescan the tile directory and atomically swap in the new index.
    ///
    /// On failure the previous index stays in service. The outcome cache
    /// is cleared after a swap since cached entries may describe tiles
    /// that no longer exist.
    pub fn reindex(&self) -> Result<ReindexStats> {
        let start = Instant::now();
        let index = SpatialIndex::rebuild(&self.settings)?;
        let stats = ReindexStats {
            indexed_tiles: index.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        *self.index.write().expect("index lock poisoned") = Arc::new(index);
        self.cache.invalidate_all();

        tracing::info!(
            tiles = stats.indexed_tiles,
            elapsed_ms = stats.elapsed_ms,
            "reindex complete"
        );
        Ok(stats)
    }

    /// Stop accepting new raster reads.
    ///
    /// Lookups waiting on the pool resolve with
    /// [`ElevationError::Shutdown`]; already-running reads finish on
    /// their own, and cache hits keep resolving.
    pub fn shutdown(&self) {
        self.workers.close();
        tracing::info!("elevation engine shut down");
    }

    /// Engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache_entries: self.cache.entry_count(),
            cache_hits: self.hit_count.load(Ordering::Relaxed),
            cache_misses: self.miss_count.load(Ordering::Relaxed),
            raster_reads: self.read_count.load(Ordering::Relaxed),
            indexed_tiles: self.index.read().expect("index lock poisoned").len(),
        }
    }

    /// The settings this engine was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    fn flush_cache(&self) {
        self.cache.run_pending_tasks();
    }
}

fn no_coverage(coord: Coordinate) -> ElevationError {
    ElevationError::NoCoverage {
        lat: coord.lat(),
        lon: coord.lon(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{grid, write_geotiff};
    use std::path::Path;
    use tempfile::TempDir;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    /// 2x2 tile over lat/lon [-1, 1], uniform 42 except nodata in the
    /// pixel containing (0.0, 0.0).
    fn write_scenario_tile(dir: &Path) {
        // (0, 0) inverts to column 1, row 1 (the SE pixel)
        write_geotiff(
            &dir.join("scenario.tif"),
            2,
            2,
            (-1.0, 1.0),
            (1.0, 1.0),
            Some(-9999.0),
            &[42.0, 42.0, 42.0, -9999.0],
        );
    }

    fn engine_for(tmp: &TempDir) -> ElevationEngine {
        ElevationEngine::initialize(Settings::new(tmp.path())).unwrap()
    }

    #[tokio::test]
    async fn test_scenario_single_tile() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        // Valid pixel
        assert_eq!(engine.lookup(coord(0.5, 0.5)).await.unwrap(), 42.0);

        // Nodata pixel inside the bbox
        assert!(matches!(
            engine.lookup(coord(0.0, 0.0)).await,
            Err(ElevationError::NoCoverage { .. })
        ));

        // Outside every tile
        assert!(matches!(
            engine.lookup(coord(10.0, 10.0)).await,
            Err(ElevationError::NoCoverage { .. })
        ));

        // Invalid coordinates never reach the engine
        assert!(matches!(
            Coordinate::new(200.0, 0.0),
            Err(ElevationError::InvalidCoordinate { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_deterministic_and_cache_transparent() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        let first = engine.lookup(coord(0.5, 0.5)).await.unwrap();
        let second = engine.lookup(coord(0.5, 0.5)).await.unwrap();
        assert_eq!(first, second);

        let stats = engine.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.raster_reads, 1);
    }

    #[tokio::test]
    async fn test_batch_order_and_intra_batch_caching() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        let coords = vec![coord(0.5, 0.5), coord(0.5, 0.5), coord(10.0, 10.0)];
        let results = engine.lookup_many(&coords).await;

        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 42.0);
        assert_eq!(*results[1].as_ref().unwrap(), 42.0);
        assert!(matches!(
            results[2],
            Err(ElevationError::NoCoverage { .. })
        ));

        // The duplicate was served from cache: one raster read total
        assert_eq!(engine.stats().raster_reads, 1);
    }

    #[tokio::test]
    async fn test_negative_outcomes_cached() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        // Nodata pixel: first miss does a read, second is a cache hit
        assert!(engine.lookup(coord(0.0, 0.0)).await.is_err());
        let reads_after_first = engine.stats().raster_reads;
        assert!(engine.lookup(coord(0.0, 0.0)).await.is_err());
        assert_eq!(engine.stats().raster_reads, reads_after_first);

        // No-coverage outcome is cached without any read at all
        assert!(engine.lookup(coord(10.0, 10.0)).await.is_err());
        assert!(engine.lookup(coord(10.0, 10.0)).await.is_err());
        assert_eq!(engine.stats().raster_reads, reads_after_first);
        assert_eq!(engine.stats().cache_hits, 2);
    }

    #[tokio::test]
    async fn test_overlap_fall_through() {
        let tmp = TempDir::new().unwrap();
        // Same bbox twice; scan order puts a.tif first. a.tif is all
        // nodata, b.tif has real values.
        write_geotiff(
            &tmp.path().join("a.tif"),
            2,
            2,
            (-1.0, 1.0),
            (1.0, 1.0),
            Some(-9999.0),
            &grid(2, 2, -9999.0),
        );
        write_geotiff(
            &tmp.path().join("b.tif"),
            2,
            2,
            (-1.0, 1.0),
            (1.0, 1.0),
            Some(-9999.0),
            &grid(2, 2, 7.0),
        );
        let engine = engine_for(&tmp);

        // Falls through a.tif's nodata to b.tif's value
        assert_eq!(engine.lookup(coord(0.5, 0.5)).await.unwrap(), 7.0);
        // Both tiles were sampled
        assert_eq!(engine.stats().raster_reads, 2);
    }

    #[tokio::test]
    async fn test_read_failure_falls_through_without_caching() {
        let tmp = TempDir::new().unwrap();
        write_geotiff(
            &tmp.path().join("a.tif"),
            2,
            2,
            (-1.0, 1.0),
            (1.0, 1.0),
            None,
            &grid(2, 2, 7.0),
        );
        let engine = engine_for(&tmp);

        // Corrupt the tile after indexing: sampling now fails
        std::fs::write(tmp.path().join("a.tif"), b"truncated").unwrap();

        assert!(matches!(
            engine.lookup(coord(0.5, 0.5)).await,
            Err(ElevationError::NoCoverage { .. })
        ));

        // The failure outcome was not cached: a retry reads again
        let reads = engine.stats().raster_reads;
        assert!(engine.lookup(coord(0.5, 0.5)).await.is_err());
        assert!(engine.stats().raster_reads > reads);
    }

    #[tokio::test]
    async fn test_cache_capacity_bound() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine =
            ElevationEngine::initialize(Settings::new(tmp.path()).cache_max_size(4)).unwrap();

        for i in 0..20 {
            let lon = -0.9 + 0.05 * i as f64;
            let _ = engine.lookup(coord(0.5, lon)).await;
        }

        engine.flush_cache();
        assert!(engine.stats().cache_entries <= 4);
    }

    #[tokio::test]
    async fn test_reindex_picks_up_new_tiles() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        assert!(engine.lookup(coord(5.5, 5.5)).await.is_err());

        // New tile over lat/lon [5, 6]
        write_geotiff(
            &tmp.path().join("new.tif"),
            2,
            2,
            (5.0, 6.0),
            (0.5, 0.5),
            None,
            &grid(2, 2, 99.0),
        );
        let stats = engine.reindex().unwrap();
        assert_eq!(stats.indexed_tiles, 2);

        // The stale negative outcome was invalidated along with the cache
        assert_eq!(engine.lookup(coord(5.5, 5.5)).await.unwrap(), 99.0);
    }

    #[tokio::test]
    async fn test_reindex_failure_keeps_old_index() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        std::fs::remove_file(tmp.path().join("scenario.tif")).unwrap();
        assert!(engine.reindex().is_err());

        // Old index still answers (through the cache-missing path)
        assert_eq!(engine.stats().indexed_tiles, 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_reads() {
        let tmp = TempDir::new().unwrap();
        write_scenario_tile(tmp.path());
        let engine = engine_for(&tmp);

        let cached = engine.lookup(coord(0.5, 0.5)).await.unwrap();
        engine.shutdown();

        // Cache hits still resolve
        assert_eq!(engine.lookup(coord(0.5, 0.5)).await.unwrap(), cached);

        // Uncached lookups surface the shutdown
        assert!(matches!(
            engine.lookup(coord(0.9, -0.9)).await,
            Err(ElevationError::Shutdown)
        ));
    }

    #[test]
    fn test_hit_rate() {
        let stats = EngineStats {
            cache_hits: 80,
            cache_misses: 20,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.8);
        assert_eq!(EngineStats::default().hit_rate(), 0.0);
    }
}
