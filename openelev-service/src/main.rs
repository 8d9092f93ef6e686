//! OpenElev Service - HTTP microservice for GeoTIFF elevation lookups.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TIF_DIRECTORY` | Directory containing raster tiles | `/app/tif_files` |
//! | `INDEX_DIRECTORY` | Persisted spatial index location | `<TIF_DIRECTORY>/index` |
//! | `CACHE_MAX_SIZE` | Elevation cache capacity | 100000 |
//! | `MAX_WORKERS` | Concurrent raster read bound | 100 |
//! | `PORT` | HTTP server port | 8000 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /api/v1/lookup?locations=lat,lon` - Elevation for one or more locations
//! - `POST /api/v1/reindex` - Rescan the tile directory
//! - `GET /health` - Health check
//! - `GET /stats` - Engine statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use openelev::{ElevationEngine, Settings};
use openelev_service::{handlers, AppState};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the elevation service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "OpenElev Elevation Service",
        version = "0.1.0",
        description = "REST API for querying ground elevation from GeoTIFF tiles.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::lookup,
        handlers::reindex,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::ElevationResult,
            handlers::LookupResponse,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
            handlers::ReindexResponse,
        )
    ),
    tags(
        (name = "elevation", description = "Elevation query endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openelev=info,openelev_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8000);

    let settings = Settings::from_env();
    tracing::info!(
        tif_directory = %settings.tif_directory.display(),
        index_directory = %settings.index_directory.display(),
        cache_max_size = settings.cache_max_size,
        max_workers = settings.max_workers,
        port = port,
        "Starting OpenElev service"
    );

    // The index is required to serve anything: refuse to start without it
    let engine = match ElevationEngine::initialize(settings) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize elevation engine");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState { engine });

    // Build router
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/v1/lookup", get(handlers::lookup))
        .route("/api/v1/reindex", post(handlers::reindex))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.engine.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
