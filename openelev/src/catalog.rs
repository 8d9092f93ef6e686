//! Tile directory scanning and change detection.
//!
//! The catalog walks the tile directory in sorted order, producing the
//! ordered [`Tile`] sequence the spatial index is built from and the
//! directory content signature that decides whether a persisted index is
//! still valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};
use crate::tile::Tile;

/// One file's identity stamp inside a [`DirectorySignature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    /// Path relative to the tile directory.
    pub path: PathBuf,
    /// File size in bytes.
    pub len: u64,
    /// Modification time, seconds since the epoch.
    pub mtime_secs: u64,
}

/// Content signature of a tile directory: the sorted raster file set with
/// sizes and modification times. Equal signatures mean the persisted
/// index still describes the directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectorySignature {
    pub files: Vec<FileStamp>,
}

/// Result of one catalog scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Tiles in scan order.
    pub tiles: Vec<Tile>,
    /// Candidate files skipped because they could not be read.
    pub skipped: usize,
}

fn is_raster(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("tif") | Some("tiff")
    )
}

/// Recursively collect raster file paths under `dir`, sorted so the
/// catalog order is stable across rescans.
fn raster_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ElevationError::IndexUnavailable {
            reason: format!("tile directory not found: {}", dir.display()),
        });
    }
    let mut files = Vec::new();
    collect(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(&path, out)?;
        } else if is_raster(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Scan a directory into an ordered tile catalog.
///
/// Files that fail to open or lack georeferencing are logged and skipped;
/// the scan only fails when the directory itself cannot be read.
pub fn scan(dir: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    for path in raster_files(dir)? {
        match Tile::from_file(&path, report.tiles.len()) {
            Ok(tile) => {
                tracing::info!(path = %path.display(), "indexed tile");
                report.tiles.push(tile);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable tile");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

/// Compute the current content signature of a tile directory.
pub fn signature(dir: &Path) -> Result<DirectorySignature> {
    let mut files = Vec::new();
    for path in raster_files(dir)? {
        let meta = fs::metadata(&path)?;
        let mtime_secs = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let rel = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
        files.push(FileStamp {
            path: rel,
            len: meta.len(),
            mtime_secs,
        });
    }
    Ok(DirectorySignature { files })
}
