//! # rastelev - Raster Elevation Queries
//!
//! Point and line-profile elevation queries against a single GeoTIFF
//! elevation raster, local or remote.
//!
//! ## Features
//!
//! - **Range reads**: local files are memory-mapped, remote datasets are read
//!   with HTTP range requests one chunk at a time
//! - **Any CRS**: query points are reprojected into the raster's native CRS
//!   (pure-Rust `proj4rs`, EPSG definitions bundled)
//! - **Profiles**: polylines are resampled evenly by arc length
//! - **Out of bounds is not an error**: points outside the raster read `0`
//!
//! ## Quick Start
//!
//! ```ignore
//! use rastelev::{ElevationService, LineProfileRequest, Point2D};
//!
//! let service = ElevationService::new("https://example.com/dtm_2056.tif");
//!
//! let elevation = service.point_elevation(2600000.0, 1200000.0, "EPSG:2056")?;
//!
//! let request = LineProfileRequest::from_vertices(
//!     vec![Point2D::new(7.43, 46.95), Point2D::new(7.45, 46.96)],
//!     100,
//! )
//! .with_crs("EPSG:4326");
//! let elevations = service.line_profile_elevation(&request)?;
//! assert_eq!(elevations.len(), 100);
//! ```
//!
//! ## Supported Rasters
//!
//! Single-band (or first-band) GeoTIFF, tiled or stripped, uncompressed, LZW
//! or Deflate, 8 to 32-bit integers or 32/64-bit floats, BigTIFF included.
//! Cloud Optimized GeoTIFFs work best remotely.

pub mod config;
pub mod coverage;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod geotiff;
pub mod profile;
pub mod service;
pub mod source;

#[cfg(feature = "geojson")]
pub mod geojson;

#[cfg(test)]
mod testutil;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use coverage::{CacheStats, CoverageOptions, RasterCoverage, Sample};
pub use crs::{CrsCode, CrsRegistry, EpsgRegistry, Reprojector, Transform};
pub use error::{ElevationError, Result};
pub use geometry::{Extent, Point2D};
pub use profile::{arc_length_positions, sample_profile, LineProfileRequest};
pub use service::{ElevationService, ElevationServiceBuilder};
