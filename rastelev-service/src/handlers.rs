//! HTTP request handlers for the elevation service.
//!
//! The core library is synchronous and may block on range reads, so every
//! query runs on the blocking pool via [`tokio::task::spawn_blocking`].

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geojson::Geometry;
use percent_encoding::percent_decode_str;
use rastelev::{ElevationError, LineProfileRequest, Point2D};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Plain-text answer of `/ping`.
pub const PING_RESPONSE: &str = "rastelev-service";

/// Query parameters for the point elevation endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ElevationQuery {
    /// Position as `x,y` in the units of `crs`.
    #[param(example = "2600000,1200000")]
    pub pos: Option<String>,
    /// CRS of `pos`, e.g. `EPSG:2056` or `4326`.
    #[param(example = "EPSG:2056")]
    pub crs: Option<String>,
}

/// Query parameters for the drape endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DrapeQuery {
    /// CRS of the geometry's positions.
    pub crs: Option<String>,
}

/// Successful elevation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElevationResponse {
    /// Elevation in raster units, `0` outside the raster.
    pub elevation: f64,
}

/// Line profile request body.
///
/// `distances[i]` is the length of the segment from `coordinates[i]` to
/// `coordinates[i + 1]`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileRequest {
    /// Polyline vertices as `[x, y]` pairs.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub coordinates: Vec<[f64; 2]>,
    /// Segment lengths, one per consecutive vertex pair.
    pub distances: Vec<f64>,
    /// Number of evenly spaced samples.
    pub samples: usize,
    /// CRS of `coordinates`; the dataset's CRS when absent.
    #[serde(default, alias = "crs")]
    pub projection: Option<String>,
}

impl From<ProfileRequest> for LineProfileRequest {
    fn from(request: ProfileRequest) -> Self {
        let coordinates = request.coordinates.into_iter().map(Point2D::from).collect();
        let profile = LineProfileRequest::new(coordinates, request.distances, request.samples);
        match request.projection {
            Some(crs) => profile.with_crs(crs),
            None => profile,
        }
    }
}

/// Successful profile response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    /// One elevation per sample, `0` where the line leaves the raster.
    pub elevations: Vec<f64>,
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
    /// Whether the dataset has been opened.
    pub dataset_open: bool,
}

/// Cache statistics response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of raster chunks in cache.
    pub cached_chunks: u64,
    /// Chunk cache hit count.
    pub cache_hits: u64,
    /// Chunk cache miss count.
    pub cache_misses: u64,
    /// Chunk cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
    /// Number of cached CRS transforms.
    pub cached_transforms: u64,
}

/// Parse `x,y`.
fn parse_pos(pos: &str) -> Result<(f64, f64), ElevationError> {
    let invalid = || ElevationError::MalformedRequest(format!("invalid pos '{}', expected x,y", pos));

    let mut parts = pos.split(',').map(|s| s.trim().parse::<f64>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) => Ok((x, y)),
        _ => Err(invalid()),
    }
}

/// Parse a profile body, URL-decoding it first unless it is raw JSON.
fn parse_profile_body(body: &str) -> Result<LineProfileRequest, ElevationError> {
    let body = body.trim();
    let request: ProfileRequest = if body.starts_with('{') {
        serde_json::from_str(body)
    } else {
        // Form posts encode spaces as '+' and may leave a trailing '='
        let plus_decoded = body.replace('+', " ");
        let decoded = percent_decode_str(&plus_decoded)
            .decode_utf8()
            .map_err(|e| ElevationError::MalformedRequest(format!("invalid body encoding: {}", e)))?;
        serde_json::from_str(decoded.trim().trim_end_matches('='))
    }
    .map_err(|e| ElevationError::MalformedRequest(format!("invalid profile request: {}", e)))?;

    Ok(request.into())
}

/// Run a blocking query on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> rastelev::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(e)),
        Err(e) => {
            tracing::error!(error = %e, "Query task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            )
                .into_response())
        }
    }
}

/// Get the elevation at a point.
///
/// # Returns
///
/// - `200 OK` with the elevation, `0` outside the raster
/// - `400 Bad Request` if `pos` or `crs` is missing or invalid
/// - `422 Unprocessable Entity` if the point cannot be reprojected
/// - `503 Service Unavailable` if the dataset cannot be read
#[utoipa::path(
    get,
    path = "/getelevation",
    tag = "elevation",
    params(ElevationQuery),
    responses(
        (status = 200, description = "Elevation at the point", body = ElevationResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 422, description = "Point cannot be reprojected", body = ErrorResponse),
        (status = 503, description = "Dataset unavailable", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_elevation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ElevationQuery>,
) -> Response {
    let (pos, crs) = match (query.pos, query.crs) {
        (Some(pos), Some(crs)) => (pos, crs),
        (None, _) => return error_response(ElevationError::MalformedRequest("missing pos".into())),
        (_, None) => return error_response(ElevationError::MalformedRequest("missing crs".into())),
    };
    let (x, y) = match parse_pos(&pos) {
        Ok(xy) => xy,
        Err(e) => return error_response(e),
    };

    tracing::debug!(x, y, crs = %crs, "Elevation query");

    let result = run_blocking({
        let state = Arc::clone(&state);
        let crs = crs.clone();
        move || state.service.point_elevation(x, y, &crs)
    })
    .await;

    match result {
        Ok(elevation) => {
            tracing::info!(x, y, crs = %crs, elevation, "Elevation found");
            (StatusCode::OK, Json(ElevationResponse { elevation })).into_response()
        }
        Err(response) => response,
    }
}

/// Get an elevation profile along a polyline.
///
/// The body is JSON, or URL-encoded JSON as sent by form posts.
///
/// # Returns
///
/// - `200 OK` with one elevation per sample
/// - `400 Bad Request` if the body is invalid or the CRS unknown
/// - `503 Service Unavailable` if the dataset cannot be read
#[utoipa::path(
    post,
    path = "/getheightprofile",
    tag = "elevation",
    request_body(content = ProfileRequest, description = "Polyline to sample"),
    responses(
        (status = 200, description = "Sampled elevations", body = ProfileResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Dataset unavailable", body = ErrorResponse)
    )
)]
pub async fn post_height_profile(State(state): State<Arc<AppState>>, body: String) -> Response {
    let request = match parse_profile_body(&body) {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    let vertices = request.coordinates.len();
    let samples = request.samples;

    let result = run_blocking({
        let state = Arc::clone(&state);
        move || state.service.line_profile_elevation(&request)
    })
    .await;

    match result {
        Ok(elevations) => {
            tracing::info!(vertices, samples, "Height profile computed");
            (StatusCode::OK, Json(ProfileResponse { elevations })).into_response()
        }
        Err(response) => response,
    }
}

/// Add elevations as Z to every position of a GeoJSON geometry.
///
/// # Returns
///
/// - `200 OK` with the draped geometry
/// - `400 Bad Request` if `crs` is missing or unknown, or the body is not a
///   GeoJSON geometry
/// - `503 Service Unavailable` if the dataset cannot be read
#[utoipa::path(
    post,
    path = "/drape",
    tag = "elevation",
    params(DrapeQuery),
    request_body(content = String, description = "GeoJSON geometry", content_type = "application/json"),
    responses(
        (status = 200, description = "Geometry with elevations as Z", content_type = "application/json"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Dataset unavailable", body = ErrorResponse)
    )
)]
pub async fn post_drape(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DrapeQuery>,
    body: String,
) -> Response {
    let Some(crs) = query.crs else {
        return error_response(ElevationError::MalformedRequest("missing crs".into()));
    };
    let geometry = match body.parse::<Geometry>() {
        Ok(geometry) => geometry,
        Err(e) => {
            return error_response(ElevationError::MalformedRequest(format!(
                "invalid GeoJSON geometry: {}",
                e
            )))
        }
    };

    let result = run_blocking({
        let state = Arc::clone(&state);
        move || rastelev::geojson::drape_geometry(&state.service, geometry, &crs)
    })
    .await;

    match result {
        Ok(draped) => (StatusCode::OK, Json(draped)).into_response(),
        Err(response) => response,
    }
}

/// Map a library error to a status code and `{"error": ...}` body.
fn error_response(e: ElevationError) -> Response {
    let status = match &e {
        ElevationError::MalformedRequest(_) | ElevationError::CrsResolution { .. } => {
            StatusCode::BAD_REQUEST
        }
        ElevationError::Transform { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ElevationError::DatasetUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::warn!(status = status.as_u16(), error = %e, "Elevation query failed");

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/ping",
    tag = "system",
    responses((status = 200, description = "Service is alive", body = String))
)]
pub async fn ping() -> &'static str {
    PING_RESPONSE
}

/// Health check endpoint.
///
/// Returns service status, version and whether the dataset is open.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dataset_open: state.service.is_open(),
    })
}

/// Get cache statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Cache statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.service.cache_stats();

    Json(StatsResponse {
        cached_chunks: stats.entry_count,
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        hit_rate: stats.hit_rate(),
        cached_transforms: state.service.reprojector().cached_transforms(),
    })
}
