//! Bounding-box spatial index with on-disk persistence.
//!
//! The index answers "which tiles cover this point" via an R-tree over
//! tile bounding boxes. Its persisted form is a JSON manifest of tile
//! records keyed to the tile directory's content signature; loading the
//! manifest skips reopening every GeoTIFF, which is the expensive part of
//! a rebuild.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::catalog::{self, DirectorySignature};
use crate::config::Settings;
use crate::coord::Coordinate;
use crate::error::{ElevationError, Result};
use crate::tile::Tile;

/// Manifest filename inside `INDEX_DIRECTORY`.
pub const MANIFEST_FILE: &str = "spatial_index.json";

/// R-tree entry wrapping a shared tile.
struct IndexedTile(Arc<Tile>);

impl RTreeObject for IndexedTile {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.0.bounds.min_lon, self.0.bounds.min_lat],
            [self.0.bounds.max_lon, self.0.bounds.max_lat],
        )
    }
}

impl PointDistance for IndexedTile {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope().distance_2(point)
    }
}

/// Serialized index: the signature it was built from plus every tile
/// record in catalog order.
#[derive(Serialize, Deserialize)]
struct Manifest {
    signature: DirectorySignature,
    tiles: Vec<Tile>,
}

/// Read-only point-containment index over the tile catalog.
///
/// Immutable after construction and safe to share across lookups without
/// locking; a reindex builds a replacement rather than patching in place.
pub struct SpatialIndex {
    tree: RTree<IndexedTile>,
    len: usize,
}

impl SpatialIndex {
    /// Bulk-load an index from catalog-ordered tiles.
    pub fn build(tiles: Vec<Tile>) -> Self {
        let len = tiles.len();
        let entries = tiles
            .into_iter()
            .map(|tile| IndexedTile(Arc::new(tile)))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            len,
        }
    }

    /// Number of indexed tiles.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tiles whose bounding box contains `coord`, in catalog order.
    ///
    /// The order is the overlap priority: the lookup takes the first
    /// candidate with a valid pixel and falls through to the next on
    /// nodata. An empty result means no coverage.
    pub fn query(&self, coord: Coordinate) -> Vec<Arc<Tile>> {
        let mut hits: Vec<Arc<Tile>> = self
            .tree
            .locate_all_at_point(&[coord.lon(), coord.lat()])
            .filter(|entry| entry.0.bounds.contains(coord.lat(), coord.lon()))
            .map(|entry| Arc::clone(&entry.0))
            .collect();
        hits.sort_by_key(|tile| tile.seq);
        hits
    }

    /// Load the persisted index when it is still fresh, otherwise rescan
    /// the tile directory, rebuild, and rewrite the manifest.
    pub fn build_or_load(settings: &Settings) -> Result<Self> {
        let signature = catalog::signature(&settings.tif_directory)?;
        let manifest_path = settings.index_directory.join(MANIFEST_FILE);

        if let Some(manifest) = read_manifest(&manifest_path) {
            if manifest.signature == signature {
                tracing::info!(
                    path = %manifest_path.display(),
                    tiles = manifest.tiles.len(),
                    "loaded spatial index from disk"
                );
                return Ok(Self::build(manifest.tiles));
            }
            tracing::info!("tile directory changed, rebuilding spatial index");
        }

        Self::rebuild_with(settings, signature)
    }

    /// Force a full rescan regardless of any persisted manifest.
    pub fn rebuild(settings: &Settings) -> Result<Self> {
        let signature = catalog::signature(&settings.tif_directory)?;
        Self::rebuild_with(settings, signature)
    }

    fn rebuild_with(settings: &Settings, signature: DirectorySignature) -> Result<Self> {
        let report = catalog::scan(&settings.tif_directory)?;
        if report.tiles.is_empty() {
            return Err(ElevationError::IndexUnavailable {
                reason: format!(
                    "no readable raster tiles in {}",
                    settings.tif_directory.display()
                ),
            });
        }
        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "some tile files were not indexed");
        }

        let manifest = Manifest {
            signature,
            tiles: report.tiles,
        };
        persist(&manifest, &settings.index_directory, &manifest_path_of(settings));
        Ok(Self::build(manifest.tiles))
    }
}

fn manifest_path_of(settings: &Settings) -> std::path::PathBuf {
    settings.index_directory.join(MANIFEST_FILE)
}

/// A stale or unreadable manifest is discarded, never trusted.
fn read_manifest(path: &Path) -> Option<Manifest> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "discarding unreadable index manifest"
            );
            None
        }
    }
}

/// Persistence failures are logged, not fatal: the in-memory index is
/// already built and the next start simply rescans.
fn persist(manifest: &Manifest, dir: &Path, path: &Path) {
    let write = || -> std::io::Result<()> {
        fs::create_dir_all(dir)?;
        let json = serde_json::to_vec(manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    };
    match write() {
        Ok(()) => tracing::info!(
            path = %path.display(),
            tiles = manifest.tiles.len(),
            "persisted spatial index"
        ),
        Err(err) => tracing::warn!(
            path = %path.display(),
            error = %err,
            "failed to persist spatial index"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{grid, write_geotiff};
    use crate::tile::{GeoTransform, TileBounds};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn tile(seq: usize, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Tile {
        Tile {
            path: PathBuf::from(format!("tile-{seq}.tif")),
            seq,
            bounds: TileBounds {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            },
            transform: GeoTransform {
                origin_x: min_lon,
                origin_y: max_lat,
                pixel_width: (max_lon - min_lon) / 10.0,
                pixel_height: (max_lat - min_lat) / 10.0,
            },
            width: 10,
            height: 10,
            nodata: None,
            crs: "EPSG:4326".to_string(),
        }
    }

    #[test]
    fn test_query_point_containment() {
        let index = SpatialIndex::build(vec![
            tile(0, 0.0, 0.0, 1.0, 1.0),
            tile(1, 5.0, 5.0, 6.0, 6.0),
        ]);

        let hits = index.query(Coordinate::new(0.5, 0.5).unwrap());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seq, 0);

        let hits = index.query(Coordinate::new(3.0, 3.0).unwrap());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_query_overlap_ordered_by_sequence() {
        // Insert out of order; query must still come back seq-sorted
        let index = SpatialIndex::build(vec![
            tile(2, 0.0, 0.0, 2.0, 2.0),
            tile(0, 0.5, 0.5, 1.5, 1.5),
            tile(1, 0.0, 0.0, 1.0, 1.0),
        ]);

        let hits = index.query(Coordinate::new(0.75, 0.75).unwrap());
        let seqs: Vec<usize> = hits.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_query_edge_convention() {
        let index = SpatialIndex::build(vec![tile(0, 0.0, 0.0, 1.0, 1.0)]);

        // North-west corner is inside
        assert_eq!(index.query(Coordinate::new(1.0, 0.0).unwrap()).len(), 1);
        // South and east edges are outside
        assert!(index.query(Coordinate::new(0.0, 0.5).unwrap()).is_empty());
        assert!(index.query(Coordinate::new(0.5, 1.0).unwrap()).is_empty());
    }

    fn settings_for(tmp: &TempDir) -> Settings {
        Settings::new(tmp.path())
    }

    fn write_tile(dir: &Path, name: &str, origin: (f64, f64)) {
        write_geotiff(
            &dir.join(name),
            4,
            4,
            origin,
            (0.25, 0.25),
            None,
            &grid(4, 4, 12.0),
        );
    }

    #[test]
    fn test_build_or_load_persists_manifest() {
        let tmp = TempDir::new().unwrap();
        write_tile(tmp.path(), "a.tif", (0.0, 1.0));

        let settings = settings_for(&tmp);
        let index = SpatialIndex::build_or_load(&settings).unwrap();
        assert_eq!(index.len(), 1);

        let manifest_path = settings.index_directory.join(MANIFEST_FILE);
        assert!(manifest_path.exists());

        // Second start loads the manifest and yields an equivalent index
        let reloaded = SpatialIndex::build_or_load(&settings).unwrap();
        assert_eq!(reloaded.len(), 1);
        let hits = reloaded.query(Coordinate::new(0.5, 0.5).unwrap());
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_build_or_load_detects_stale_manifest() {
        let tmp = TempDir::new().unwrap();
        write_tile(tmp.path(), "a.tif", (0.0, 1.0));

        let settings = settings_for(&tmp);
        let index = SpatialIndex::build_or_load(&settings).unwrap();
        assert_eq!(index.len(), 1);

        // New tile invalidates the recorded signature
        write_tile(tmp.path(), "b.tif", (1.0, 1.0));
        let rebuilt = SpatialIndex::build_or_load(&settings).unwrap();
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn test_build_or_load_discards_corrupt_manifest() {
        let tmp = TempDir::new().unwrap();
        write_tile(tmp.path(), "a.tif", (0.0, 1.0));

        let settings = settings_for(&tmp);
        fs::create_dir_all(&settings.index_directory).unwrap();
        fs::write(settings.index_directory.join(MANIFEST_FILE), b"{broken").unwrap();

        let index = SpatialIndex::build_or_load(&settings).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_build_or_load_empty_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_for(&tmp);

        let result = SpatialIndex::build_or_load(&settings);
        assert!(matches!(
            result,
            Err(ElevationError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_rebuild_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_tile(tmp.path(), "a.tif", (0.0, 1.0));
        write_tile(tmp.path(), "b.tif", (0.5, 1.0));

        let settings = settings_for(&tmp);
        let first = SpatialIndex::rebuild(&settings).unwrap();
        let second = SpatialIndex::rebuild(&settings).unwrap();

        // Functionally equivalent: same answers for the same points
        for (lat, lon) in [(0.9, 0.1), (0.9, 0.6), (0.1, 0.1), (5.0, 5.0)] {
            let coord = Coordinate::new(lat, lon).unwrap();
            let a: Vec<_> = first.query(coord).iter().map(|t| t.seq).collect();
            let b: Vec<_> = second.query(coord).iter().map(|t| t.seq).collect();
            assert_eq!(a, b);
        }
    }
}
