//! GeoTIFF tile metadata.
//!
//! A [`Tile`] is the immutable catalog record for one raster file: its
//! affine georeferencing, pixel dimensions, nodata sentinel, and CRS.
//! The pixel payload stays on disk; only the sampler touches it.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, Limits};
use tiff::tags::Tag;

use crate::error::{ElevationError, Result};

/// ModelPixelScaleTag: degrees per pixel in x and y.
pub(crate) const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// ModelTiepointTag: raster-to-model anchor points.
pub(crate) const TAG_MODEL_TIEPOINT: u16 = 33922;
/// GeoKeyDirectoryTag: packed CRS key records.
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
/// GDAL_NODATA: nodata sentinel as an ASCII number.
pub(crate) const TAG_GDAL_NODATA: u16 = 42113;

const GEO_KEY_GEOGRAPHIC_TYPE: u64 = 2048;
const GEO_KEY_PROJECTED_TYPE: u64 = 3072;

/// North-up affine mapping between pixel and geographic space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the raster's west edge.
    pub origin_x: f64,
    /// Latitude of the raster's north edge.
    pub origin_y: f64,
    /// Degrees of longitude per pixel, eastward.
    pub pixel_width: f64,
    /// Degrees of latitude per pixel; rows advance southward.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Inverse transform: the fractional (column, row) position of a
    /// coordinate. Column 0 is the west edge, row 0 the north edge.
    pub fn invert(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            (lon - self.origin_x) / self.pixel_width,
            (self.origin_y - lat) / self.pixel_height,
        )
    }
}

/// Geographic bounding box of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Minimum latitude (south edge).
    pub min_lat: f64,
    /// Maximum latitude (north edge).
    pub max_lat: f64,
    /// Minimum longitude (west edge).
    pub min_lon: f64,
    /// Maximum longitude (east edge).
    pub max_lon: f64,
}

impl TileBounds {
    /// Containment under the engine's edge convention: west and north
    /// edges inclusive, east and south edges exclusive. These are exactly
    /// the coordinates whose floor-truncated pixel lands in the raster.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat > self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon < self.max_lon
    }
}

/// Immutable catalog record for one raster tile file.
///
/// Metadata is read once when the catalog scans the tile directory and
/// never changes afterwards; the file itself is treated as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// Path of the raster file; doubles as the tile's identity.
    pub path: PathBuf,
    /// Catalog scan position; fixes priority among overlapping tiles.
    pub seq: usize,
    /// Geographic bounding box.
    pub bounds: TileBounds,
    /// Pixel-to-geographic affine transform.
    pub transform: GeoTransform,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Pixel value meaning "no measurement", when the file declares one.
    pub nodata: Option<f64>,
    /// Coordinate reference system identifier, e.g. `EPSG:4326`.
    pub crs: String,
}

impl Tile {
    /// Read georeferencing metadata from a GeoTIFF file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoded, or if it
    /// lacks the ModelPixelScale/ModelTiepoint tags.
    pub fn from_file(path: &Path, seq: usize) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(file)
            .map_err(|source| ElevationError::Raster {
                path: path.to_path_buf(),
                source,
            })?
            .with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions().map_err(|source| ElevationError::Raster {
            path: path.to_path_buf(),
            source,
        })?;

        let scale = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
            .ok();
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
            .ok();

        let transform = match (scale, tiepoint) {
            (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
                // Tiepoint maps pixel (i, j) to model (x, y); i and j are
                // almost always zero, but honor them when they are not.
                GeoTransform {
                    origin_x: tie[3] - tie[0] * scale[0],
                    origin_y: tie[4] + tie[1] * scale[1],
                    pixel_width: scale[0],
                    pixel_height: scale[1],
                }
            }
            _ => {
                return Err(ElevationError::MissingGeoreference {
                    path: path.to_path_buf(),
                })
            }
        };

        if transform.pixel_width <= 0.0 || transform.pixel_height <= 0.0 {
            return Err(ElevationError::MissingGeoreference {
                path: path.to_path_buf(),
            });
        }

        let bounds = TileBounds {
            max_lat: transform.origin_y,
            min_lat: transform.origin_y - height as f64 * transform.pixel_height,
            min_lon: transform.origin_x,
            max_lon: transform.origin_x + width as f64 * transform.pixel_width,
        };

        let nodata = decoder
            .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
            .ok()
            .and_then(|s| {
                s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
                    .parse::<f64>()
                    .ok()
            });

        let crs = read_crs(&mut decoder);

        Ok(Self {
            path: path.to_path_buf(),
            seq,
            bounds,
            transform,
            width,
            height,
            nodata,
            crs,
        })
    }
}

/// Pull the EPSG code out of the GeoKey directory; WGS84 when absent.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> String {
    if let Ok(keys) = decoder.get_tag_u64_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY)) {
        // Four-value header, then four values per key:
        // id, tag location, count, value.
        for entry in keys.get(4..).unwrap_or(&[]).chunks_exact(4) {
            let (id, location, value) = (entry[0], entry[1], entry[3]);
            if location == 0 && (id == GEO_KEY_GEOGRAPHIC_TYPE || id == GEO_KEY_PROJECTED_TYPE) {
                return format!("EPSG:{value}");
            }
        }
    }
    "EPSG:4326".to_string()
}
