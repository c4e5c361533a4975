//! Elevation query facade.
//!
//! [`ElevationService`] answers point and line-profile queries against one
//! raster dataset. The dataset is opened on first use (or eagerly with
//! [`ElevationService::open`]) and shared by every later query.
//!
//! ```ignore
//! use rastelev::{ElevationServiceBuilder, LineProfileRequest, Point2D};
//!
//! let service = ElevationServiceBuilder::new("/data/dtm_2056.tif")
//!     .chunk_cache_size(512)
//!     .build();
//!
//! // WGS84 query against a Swiss LV95 raster
//! let elevation = service.point_elevation(7.4386, 46.9511, "EPSG:4326")?;
//!
//! let request = LineProfileRequest::from_vertices(
//!     vec![Point2D::new(2600000.0, 1200000.0), Point2D::new(2601000.0, 1200500.0)],
//!     50,
//! );
//! let elevations = service.line_profile_elevation(&request)?;
//! ```

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use crate::config::{Config, DEFAULT_TRANSFORM_CACHE_SIZE};
use crate::coverage::{CacheStats, CoverageOptions, RasterCoverage, DEFAULT_CHUNK_CACHE_SIZE};
use crate::crs::{CrsCode, Reprojector, Transform};
use crate::error::{ElevationError, Result};
use crate::geometry::Point2D;
use crate::profile::{sample_profile, LineProfileRequest};

/// Point and profile elevation queries over a single raster dataset.
///
/// `ElevationService` is `Send + Sync`; share it behind an `Arc`.
pub struct ElevationService {
    /// Dataset path or URL.
    dataset: String,
    options: CoverageOptions,
    /// Set once, on the first successful open.
    coverage: OnceLock<Arc<RasterCoverage>>,
    /// Serialises opening so concurrent first queries open the dataset once.
    init_lock: Mutex<()>,
    reprojector: Reprojector,
}

impl std::fmt::Debug for ElevationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationService")
            .field("dataset", &self.dataset)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl ElevationService {
    /// Create a service with default cache sizes. Nothing is opened yet.
    pub fn new(dataset: impl Into<String>) -> Self {
        ElevationServiceBuilder::new(dataset).build()
    }

    /// Create a builder for more configuration options.
    pub fn builder(dataset: impl Into<String>) -> ElevationServiceBuilder {
        ElevationServiceBuilder::new(dataset)
    }

    /// The opened coverage, opening the dataset if this is the first use.
    ///
    /// If opening fails the error is returned and nothing is cached, so a
    /// later call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::DatasetUnavailable`] if the dataset cannot be
    /// opened.
    pub fn coverage(&self) -> Result<Arc<RasterCoverage>> {
        if let Some(coverage) = self.coverage.get() {
            return Ok(Arc::clone(coverage));
        }

        // A panic while opening leaves nothing half-set, so a poisoned lock is usable.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(coverage) = self.coverage.get() {
            return Ok(Arc::clone(coverage));
        }

        let start = Instant::now();
        let coverage = match RasterCoverage::open_with(&self.dataset, self.options.clone()) {
            Ok(coverage) => Arc::new(coverage),
            Err(e) => {
                tracing::warn!(dataset = %self.dataset, error = %e, "Failed to open dataset");
                return Err(e);
            }
        };
        tracing::info!(
            dataset = %self.dataset,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset ready"
        );

        let _ = self.coverage.set(Arc::clone(&coverage));
        Ok(coverage)
    }

    /// Open the dataset now instead of on the first query.
    pub fn open(&self) -> Result<()> {
        self.coverage().map(|_| ())
    }

    /// Whether the dataset has been opened.
    pub fn is_open(&self) -> bool {
        self.coverage.get().is_some()
    }

    /// Dataset path or URL.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Native CRS of the dataset, if it has been opened.
    pub fn native_crs(&self) -> Option<CrsCode> {
        self.coverage.get().map(|c| c.native_crs().clone())
    }

    pub fn reprojector(&self) -> &Reprojector {
        &self.reprojector
    }

    /// Chunk cache statistics; all zero until the dataset is opened.
    pub fn cache_stats(&self) -> CacheStats {
        self.coverage
            .get()
            .map(|c| c.cache_stats())
            .unwrap_or_default()
    }

    /// Elevation at `(x, y)` given in `crs`.
    ///
    /// The point is reprojected into the raster's native CRS (the identity
    /// when `crs` is the native CRS) and sampled. Points outside the raster,
    /// and no-data pixels, yield `0.0`.
    ///
    /// # Errors
    ///
    /// - [`ElevationError::MalformedRequest`] for non-finite coordinates
    /// - [`ElevationError::CrsResolution`] if `crs` is unknown
    /// - [`ElevationError::Transform`] if the point cannot be reprojected
    /// - [`ElevationError::DatasetUnavailable`] if the dataset cannot be read
    pub fn point_elevation(&self, x: f64, y: f64, crs: &str) -> Result<f64> {
        let point = Point2D::new(x, y);
        if !point.is_finite() {
            return Err(ElevationError::malformed(format!(
                "coordinates must be finite, got ({}, {})",
                x, y
            )));
        }
        let source_crs = CrsCode::parse(crs)?;

        let coverage = self.coverage()?;
        let transform = self
            .reprojector
            .get_transform(&source_crs, coverage.native_crs())?;

        let native = transform.apply(point)?;
        if !transform.is_identity() {
            tracing::trace!(
                from = %source_crs,
                x, y,
                native_x = native.x,
                native_y = native.y,
                "Reprojected query point"
            );
        }

        Ok(coverage.sample_point(native)?.elevation_or_default())
    }

    /// Elevations for many points sharing one CRS.
    ///
    /// The CRS is resolved once. Unlike [`Self::point_elevation`], a point
    /// that cannot be reprojected yields `0.0` instead of failing the batch.
    pub fn point_elevations(&self, points: &[Point2D], crs: &str) -> Result<Vec<f64>> {
        let source_crs = CrsCode::parse(crs)?;
        let coverage = self.coverage()?;
        let transform = self
            .reprojector
            .get_transform(&source_crs, coverage.native_crs())?;

        points
            .iter()
            .map(|&p| sample_or_zero(&coverage, &transform, p))
            .collect()
    }

    /// Elevation profile along a polyline.
    ///
    /// The line is resampled at `request.samples` points evenly spaced by arc
    /// length. If the request declares a CRS other than the native one, each
    /// sample point is reprojected after interpolation. Samples outside the
    /// raster, or whose reprojection fails, are `0.0`.
    ///
    /// # Errors
    ///
    /// - [`ElevationError::MalformedRequest`] if the request shape is invalid
    /// - [`ElevationError::CrsResolution`] if the declared CRS is unknown
    /// - [`ElevationError::Transform`] if no transform can be built
    /// - [`ElevationError::DatasetUnavailable`] if the dataset cannot be read
    pub fn line_profile_elevation(&self, request: &LineProfileRequest) -> Result<Vec<f64>> {
        request.validate()?;
        let source_crs = request.crs.as_deref().map(CrsCode::parse).transpose()?;

        let coverage = self.coverage()?;
        let native_crs = coverage.native_crs();
        let transform = self
            .reprojector
            .get_transform(source_crs.as_ref().unwrap_or(native_crs), native_crs)?;

        let elevations = sample_profile(
            &request.coordinates,
            &request.distances,
            request.samples,
            |p| sample_or_zero(&coverage, &transform, p),
        )?;

        tracing::debug!(
            vertices = request.coordinates.len(),
            samples = request.samples,
            length = request.total_length(),
            "Sampled line profile"
        );
        Ok(elevations)
    }
}

/// Sample one point, treating a per-point transform failure like an
/// out-of-bounds point.
fn sample_or_zero(coverage: &RasterCoverage, transform: &Transform, point: Point2D) -> Result<f64> {
    match transform.apply(point) {
        Ok(native) => Ok(coverage.sample_point(native)?.elevation_or_default()),
        Err(e) => {
            tracing::debug!(error = %e, "Sample point could not be reprojected");
            Ok(0.0)
        }
    }
}

/// Builder for creating [`ElevationService`] with custom configuration.
///
/// ```ignore
/// use rastelev::ElevationServiceBuilder;
///
/// let service = ElevationServiceBuilder::from_env()?
///     .chunk_cache_size(1024)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ElevationServiceBuilder {
    dataset: String,
    chunk_cache_size: u64,
    transform_cache_size: u64,
    native_crs: Option<CrsCode>,
}

impl ElevationServiceBuilder {
    /// Create a new builder for a dataset path or URL.
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            chunk_cache_size: DEFAULT_CHUNK_CACHE_SIZE,
            transform_cache_size: DEFAULT_TRANSFORM_CACHE_SIZE,
            native_crs: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// See [`crate::config`] for the variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no dataset is configured, or the configured
    /// dataset CRS cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&Config::from_env()?)
    }

    /// Create a builder from a [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            dataset: config.elevation_dataset.clone(),
            chunk_cache_size: config.chunk_cache_size,
            transform_cache_size: config.transform_cache_size,
            native_crs: config.native_crs()?,
        })
    }

    /// Set the maximum number of decoded chunks to keep in memory.
    ///
    /// Default is 256 chunks.
    pub fn chunk_cache_size(mut self, size: u64) -> Self {
        self.chunk_cache_size = size;
        self
    }

    /// Set the maximum number of CRS transforms to keep.
    ///
    /// Default is 64.
    pub fn transform_cache_size(mut self, size: u64) -> Self {
        self.transform_cache_size = size;
        self
    }

    /// Assume the dataset is in `crs`, regardless of its GeoKeys.
    pub fn native_crs(mut self, crs: CrsCode) -> Self {
        self.native_crs = Some(crs);
        self
    }

    /// Build the [`ElevationService`]. The dataset is not opened yet.
    pub fn build(self) -> ElevationService {
        ElevationService {
            dataset: self.dataset,
            options: CoverageOptions {
                chunk_cache_size: self.chunk_cache_size,
                native_crs: self.native_crs,
            },
            coverage: OnceLock::new(),
            init_lock: Mutex::new(()),
            reprojector: Reprojector::new(self.transform_cache_size),
        }
    }
}
