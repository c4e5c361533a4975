//! rastelev Service - HTTP microservice for raster elevation queries.
//!
//! Point elevations and line profiles from a single GeoTIFF elevation raster.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RASTELEV_DATASET` | Path or URL of the GeoTIFF | Required unless `RASTELEV_CONFIG_PATH` is set |
//! | `RASTELEV_CONFIG_PATH` | Directory holding `<service>Config.json` | None |
//! | `RASTELEV_SERVICE_NAME` | Service name used for the config file | "elevation" |
//! | `RASTELEV_DATASET_CRS` | CRS override for rasters without geokeys | None |
//! | `RASTELEV_CHUNK_CACHE` | Maximum raster chunks in cache | 256 |
//! | `RASTELEV_TRANSFORM_CACHE` | Maximum cached CRS transforms | 64 |
//! | `RASTELEV_PORT` | HTTP server port | 8080 |
//! | `RASTELEV_LAZY_OPEN` | Open the dataset on first query instead of at startup | false |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /getelevation?pos=X,Y&crs=EPSG:2056` - Elevation at a point
//! - `POST /getheightprofile` - Elevation profile along a polyline
//! - `POST /drape?crs=EPSG:4326` - GeoJSON geometry with elevations as Z
//! - `GET /ping` - Liveness probe
//! - `GET /health` - Health check
//! - `GET /stats` - Cache statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use rastelev::ElevationServiceBuilder;
use rastelev_service::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rastelev_service=info,rastelev=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load service-specific config
    let port: u16 = std::env::var("RASTELEV_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let lazy_open = std::env::var("RASTELEV_LAZY_OPEN")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    // The library handles: RASTELEV_DATASET, RASTELEV_CONFIG_PATH,
    // RASTELEV_SERVICE_NAME, RASTELEV_DATASET_CRS and the cache sizes
    let service = ElevationServiceBuilder::from_env()?.build();

    tracing::info!(
        dataset = service.dataset(),
        lazy_open,
        port,
        "Starting rastelev service"
    );

    let state = Arc::new(AppState { service });

    if !lazy_open {
        let opening = Arc::clone(&state);
        tokio::task::spawn_blocking(move || opening.service.open()).await??;
        tracing::info!(
            native_crs = ?state.service.native_crs().map(|c| c.to_string()),
            "Dataset opened"
        );
    }

    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
