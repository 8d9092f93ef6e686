//! HTTP request handlers for the elevation lookup service.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use openelev::{Coordinate, ElevationError};

use crate::AppState;

/// Query parameters for the lookup endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LookupParams {
    /// Repeated `lat,lon` pairs in decimal degrees.
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Elevation for a single queried location.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElevationResult {
    /// Latitude queried.
    pub latitude: f64,
    /// Longitude queried.
    pub longitude: f64,
    /// Elevation in meters.
    pub elevation: f64,
}

/// Successful lookup response; results follow input order.
#[derive(Debug, Serialize, ToSchema)]
pub struct LookupResponse {
    pub results: Vec<ElevationResult>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Engine statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Entries in the elevation cache.
    pub cache_entries: u64,
    /// Cache hit count.
    pub cache_hits: u64,
    /// Cache miss count.
    pub cache_misses: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
    /// Total single-pixel raster reads.
    pub raster_reads: u64,
    /// Tiles in the spatial index.
    pub indexed_tiles: usize,
}

/// Reindex response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReindexResponse {
    /// Tiles in the rebuilt index.
    pub indexed_tiles: usize,
    /// Rescan wall time in milliseconds.
    pub elapsed_ms: u64,
}

/// Look up elevations for one or more locations.
///
/// Whole-batch semantics: every location is validated before any lookup
/// work, a malformed one fails the batch with 400, and the first location
/// without coverage fails it with 404.
#[utoipa::path(
    get,
    path = "/api/v1/lookup",
    tag = "elevation",
    params(LookupParams),
    responses(
        (status = 200, description = "Elevations for every location, in input order", body = LookupResponse),
        (status = 400, description = "A location is malformed or out of range", body = ErrorResponse),
        (status = 404, description = "A location has no elevation data", body = ErrorResponse),
        (status = 422, description = "No locations parameter supplied", body = ErrorResponse),
        (status = 500, description = "Engine failure", body = ErrorResponse),
    )
)]
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> impl IntoResponse {
    if params.locations.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "missing required query parameter: locations".to_string(),
            }),
        )
            .into_response();
    }

    // Validate every location before any cache or raster work
    let mut coords = Vec::with_capacity(params.locations.len());
    for location in &params.locations {
        match Coordinate::parse(location) {
            Ok(coord) => coords.push(coord),
            Err(err) => return error_response(&err),
        }
    }

    tracing::debug!(locations = coords.len(), "elevation lookup");

    let outcomes = state.engine.lookup_many(&coords).await;

    let mut results = Vec::with_capacity(outcomes.len());
    for (coord, outcome) in coords.iter().zip(outcomes) {
        match outcome {
            Ok(elevation) => results.push(ElevationResult {
                latitude: coord.lat(),
                longitude: coord.lon(),
                elevation,
            }),
            Err(err) => return error_response(&err),
        }
    }

    (StatusCode::OK, Json(LookupResponse { results })).into_response()
}

/// Rescan the tile directory and swap in a fresh spatial index.
///
/// On failure the previous index stays in service and 500 is returned.
#[utoipa::path(
    post,
    path = "/api/v1/reindex",
    tag = "system",
    responses(
        (status = 200, description = "Index rebuilt", body = ReindexResponse),
        (status = 500, description = "Rebuild failed, previous index kept", body = ErrorResponse),
    )
)]
pub async fn reindex(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let task = tokio::task::spawn_blocking({
        let state = Arc::clone(&state);
        move || state.engine.reindex()
    });

    match task.await {
        Ok(Ok(stats)) => (
            StatusCode::OK,
            Json(ReindexResponse {
                indexed_tiles: stats.indexed_tiles,
                elapsed_ms: stats.elapsed_ms,
            }),
        )
            .into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(err) => {
            tracing::error!(error = %err, "reindex task died");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "reindex task failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Engine statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Engine statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.engine.stats();

    Json(StatsResponse {
        cache_entries: stats.cache_entries,
        cache_hits: stats.cache_hits,
        cache_misses: stats.cache_misses,
        hit_rate: stats.hit_rate(),
        raster_reads: stats.raster_reads,
        indexed_tiles: stats.indexed_tiles,
    })
}

/// Map an engine error onto the service's status-code contract.
fn error_response(err: &ElevationError) -> axum::response::Response {
    let status = match err {
        ElevationError::InvalidCoordinate { .. } | ElevationError::MalformedLocation { .. } => {
            StatusCode::BAD_REQUEST
        }
        ElevationError::NoCoverage { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::warn!(error = %err, "lookup failed");

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
