//! rastelev Service Library
//!
//! HTTP handlers, shared state and the router of the elevation service.
//! This library is used by both the rastelev-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use rastelev::ElevationService;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Elevation service over the configured dataset.
    pub service: ElevationService,
}

/// OpenAPI documentation for the elevation service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rastelev Elevation Service",
        version = "0.1.0",
        description = "Point elevations and line profiles from a single GeoTIFF elevation raster.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::get_elevation,
        handlers::post_height_profile,
        handlers::post_drape,
        handlers::ping,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::ElevationResponse,
            handlers::ProfileRequest,
            handlers::ProfileResponse,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
        )
    ),
    tags(
        (name = "elevation", description = "Elevation query endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the application router: API routes, Swagger UI, request tracing
/// and permissive CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/getelevation", get(handlers::get_elevation))
        .route("/getheightprofile", post(handlers::post_height_profile))
        .route("/drape", post(handlers::post_drape))
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{
    ElevationQuery, ElevationResponse, ErrorResponse, HealthResponse, ProfileRequest,
    ProfileResponse, StatsResponse,
};
