//! Error types for the openelev library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while looking up elevation data.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// Latitude or longitude outside the valid WGS84 ranges.
    #[error("invalid coordinate: lat={lat}, lon={lon} (valid: lat in [-90, 90], lon in [-180, 180])")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// A `"lat,lon"` location string that could not be parsed.
    #[error("malformed location '{input}' (expected 'latitude,longitude')")]
    MalformedLocation { input: String },

    /// No tile covers the coordinate, or every covering tile is nodata there.
    #[error("no elevation data for coordinates ({lat}, {lon})")]
    NoCoverage { lat: f64, lon: f64 },

    /// The spatial index could not be built or loaded.
    #[error("spatial index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    /// The engine was shut down while the request was in flight.
    #[error("elevation engine is shut down")]
    Shutdown,

    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TIFF decoder rejected a raster file.
    #[error("raster error in {path}: {source}")]
    Raster {
        path: PathBuf,
        source: tiff::TiffError,
    },

    /// A raster file without the GeoTIFF georeferencing tags.
    #[error("missing georeference tags in {path}")]
    MissingGeoreference { path: PathBuf },
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::InvalidCoordinate {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(err.to_string().contains("91"));

        let err = ElevationError::NoCoverage {
            lat: 10.0,
            lon: 20.0,
        };
        assert!(err.to_string().contains("(10, 20)"));

        let err = ElevationError::MissingGeoreference {
            path: PathBuf::from("n48w123.tif"),
        };
        assert!(err.to_string().contains("n48w123.tif"));
    }
}
