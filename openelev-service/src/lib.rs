//! OpenElev Service Library
//!
//! HTTP handlers and shared state for the elevation lookup service.
//! Used by both the openelev-service binary and integration tests.

pub mod handlers;

use openelev::ElevationEngine;

/// Application state shared across handlers.
pub struct AppState {
    /// Lookup engine serving all requests.
    pub engine: ElevationEngine,
}

// Re-export commonly used types for convenience
pub use handlers::{
    ElevationResult, ErrorResponse, HealthResponse, LookupParams, LookupResponse,
    ReindexResponse, StatsResponse,
};
