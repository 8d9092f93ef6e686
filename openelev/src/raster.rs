//! Single-pixel sampling from GeoTIFF rasters.
//!
//! Raster reads are blocking file I/O; the engine routes every call
//! through its bounded worker pool. Each call opens its own decoder, so
//! no file handle is ever shared between concurrent reads.

use std::fs::File;

use tiff::decoder::{Decoder, DecodingResult, Limits};

use crate::coord::Coordinate;
use crate::error::{ElevationError, Result};
use crate::tile::Tile;

/// Tolerance when comparing a decoded value against the nodata sentinel.
/// Integer sentinels like -9999 survive the f32 round-trip well inside it.
const NODATA_EPSILON: f64 = 1e-3;

/// Outcome of sampling one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Measured elevation in meters.
    Elevation(f64),
    /// The pixel is outside the raster or holds the nodata sentinel.
    NoData,
}

/// Read the single pixel covering `coord` from `tile`.
///
/// The coordinate is inverse-transformed to a fractional pixel position
/// and truncated to its containing pixel; indices outside
/// [0, width) x [0, height) yield [`Sample::NoData`]. Only the TIFF chunk
/// (strip or tile) holding the pixel is decoded.
pub fn sample(tile: &Tile, coord: Coordinate) -> Result<Sample> {
    let (x, y) = tile.transform.invert(coord.lon(), coord.lat());
    let (col, row) = (x.floor(), y.floor());
    if col < 0.0 || row < 0.0 || col >= tile.width as f64 || row >= tile.height as f64 {
        return Ok(Sample::NoData);
    }
    let (col, row) = (col as u32, row as u32);

    let file = File::open(&tile.path)?;
    let mut decoder = Decoder::new(file)
        .map_err(|source| raster_error(tile, source))?
        .with_limits(Limits::unlimited());

    // Chunks run left to right, then top to bottom.
    let (chunk_w, chunk_h) = decoder.chunk_dimensions();
    let (chunk_w, chunk_h) = (chunk_w.max(1), chunk_h.max(1));
    let chunks_across = tile.width.div_ceil(chunk_w);
    let chunk_index = (row / chunk_h) * chunks_across + col / chunk_w;

    let (data_w, data_h) = decoder.chunk_data_dimensions(chunk_index);
    let within_x = col % chunk_w;
    let within_y = row % chunk_h;
    if within_x >= data_w || within_y >= data_h {
        return Ok(Sample::NoData);
    }

    let decoded = decoder
        .read_chunk(chunk_index)
        .map_err(|source| raster_error(tile, source))?;
    let offset = (within_y * data_w + within_x) as usize;
    let value = match chunk_value(&decoded, offset) {
        Some(v) => v,
        None => return Ok(Sample::NoData),
    };

    if value.is_nan() {
        return Ok(Sample::NoData);
    }
    if let Some(nodata) = tile.nodata {
        if (value - nodata).abs() < NODATA_EPSILON {
            return Ok(Sample::NoData);
        }
    }
    Ok(Sample::Elevation(value))
}

fn raster_error(tile: &Tile, source: tiff::TiffError) -> ElevationError {
    ElevationError::Raster {
        path: tile.path.clone(),
        source,
    }
}

fn chunk_value(decoded: &DecodingResult, offset: usize) -> Option<f64> {
    match decoded {
        DecodingResult::U8(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::U16(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::U32(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::U64(data) => data.get(offset).map(|v| *v as f64),
        DecodingResult::I8(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::I16(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::I32(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::I64(data) => data.get(offset).map(|v| *v as f64),
        DecodingResult::F32(data) => data.get(offset).map(|v| f64::from(*v)),
        DecodingResult::F64(data) => data.get(offset).copied(),
    }
}
