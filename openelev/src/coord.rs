//! Coordinate validation, parsing, and cache-key quantization.

use crate::error::{ElevationError, Result};

/// Quantization factor for cache keys: coordinates snap to a 1e-5 degree
/// grid (about 1.1 m at the equator), so near-duplicate queries share a
/// cache slot. Fixed engine parameter, not configurable per request.
const CACHE_KEY_SCALE: f64 = 1e5;

/// A validated WGS84 coordinate in decimal degrees.
///
/// Construction enforces lat in [-90, 90] and lon in [-180, 180], so a
/// `Coordinate` handed to the engine never needs re-validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Validate and wrap a latitude/longitude pair.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::InvalidCoordinate`] when either value is
    /// out of range (NaN included).
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ElevationError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Parse a `"lat,lon"` pair as supplied in the `locations` query
    /// parameter, e.g. `"51.5,-0.1"`.
    pub fn parse(location: &str) -> Result<Self> {
        let malformed = || ElevationError::MalformedLocation {
            input: location.to_string(),
        };

        let (lat_str, lon_str) = location.split_once(',').ok_or_else(malformed)?;
        let lat: f64 = lat_str.trim().parse().map_err(|_| malformed())?;
        let lon: f64 = lon_str.trim().parse().map_err(|_| malformed())?;
        Self::new(lat, lon)
    }

    /// Latitude in decimal degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in decimal degrees.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Quantized key for the elevation cache.
    pub fn cache_key(&self) -> (i64, i64) {
        (
            (self.lat * CACHE_KEY_SCALE).round() as i64,
            (self.lon * CACHE_KEY_SCALE).round() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges() {
        assert!(Coordinate::new(0.0, 0.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(ElevationError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.5),
            Err(ElevationError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_parse() {
        let coord = Coordinate::parse("51.5, -0.1").unwrap();
        assert_eq!(coord.lat(), 51.5);
        assert_eq!(coord.lon(), -0.1);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            Coordinate::parse("51.5"),
            Err(ElevationError::MalformedLocation { .. })
        ));
        assert!(matches!(
            Coordinate::parse("abc,def"),
            Err(ElevationError::MalformedLocation { .. })
        ));
        assert!(matches!(
            Coordinate::parse("1.0,2.0,3.0"),
            Err(ElevationError::MalformedLocation { .. })
        ));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert!(matches!(
            Coordinate::parse("200.0,0.0"),
            Err(ElevationError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_cache_key_coalesces_near_duplicates() {
        let a = Coordinate::new(10.000001, 20.000002).unwrap();
        let b = Coordinate::new(10.000004, 19.999998).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());

        let c = Coordinate::new(10.001, 20.0).unwrap();
        assert_ne!(a.cache_key(), c.cache_key());
    }
}
