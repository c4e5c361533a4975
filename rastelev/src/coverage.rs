//! Raster coverage access with a decoded-chunk cache.
//!
//! [`RasterCoverage`] is the opened elevation dataset: GeoTIFF metadata, the
//! byte source it came from, and an LRU cache of decoded chunks. It is
//! immutable after opening and safe to share between threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;

use crate::crs::CrsCode;
use crate::error::{ElevationError, Result};
use crate::geometry::{Extent, Point2D};
use crate::geotiff::GeoTiffMetadata;
use crate::source::{open_source, RangeSource};

/// Default number of decoded chunks kept in memory.
pub const DEFAULT_CHUNK_CACHE_SIZE: u64 = 256;

/// Statistics about chunk cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of decoded chunks currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (samples served from a cached chunk).
    pub hit_count: u64,
    /// Number of cache misses (chunks read and decoded).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Options for opening a coverage.
#[derive(Debug, Clone)]
pub struct CoverageOptions {
    /// Maximum number of decoded chunks to cache.
    pub chunk_cache_size: u64,
    /// CRS to assume for the raster. Takes precedence over the GeoKeys and
    /// is required when the file does not declare an EPSG code.
    pub native_crs: Option<CrsCode>,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            chunk_cache_size: DEFAULT_CHUNK_CACHE_SIZE,
            native_crs: None,
        }
    }
}

/// Result of sampling the coverage at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Elevation at the point.
    Value(f64),
    /// The point lies outside the raster extent.
    OutOfBounds,
    /// The pixel holds the no-data value.
    NoData,
}

impl Sample {
    pub fn value(&self) -> Option<f64> {
        match self {
            Sample::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// The elevation, or `0.0` for out-of-bounds and no-data samples.
    pub fn elevation_or_default(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn is_in_bounds(&self) -> bool {
        !matches!(self, Sample::OutOfBounds)
    }
}

/// An opened single-band elevation raster.
///
/// Sampling is nearest-neighbour over the closed extent: every edge of the
/// raster is inside, and a point on a shared cell edge reads the cell to its
/// east (or south).
///
/// # Example
///
/// ```ignore
/// use rastelev::RasterCoverage;
///
/// let coverage = RasterCoverage::open("/data/dtm_2056.tif")?;
/// let sample = coverage.sample(2600000.0, 1200000.0)?;
/// println!("{:?} in {}", sample, coverage.native_crs());
/// ```
pub struct RasterCoverage {
    source: Box<dyn RangeSource>,
    metadata: GeoTiffMetadata,
    native_crs: CrsCode,
    extent: Extent,
    /// Decoded first-band chunks, keyed by chunk index.
    chunk_cache: Cache<usize, Arc<Vec<f32>>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl std::fmt::Debug for RasterCoverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterCoverage")
            .field("locator", &self.source.identifier())
            .field("native_crs", &self.native_crs)
            .field("extent", &self.extent)
            .finish_non_exhaustive()
    }
}

impl RasterCoverage {
    /// Open a dataset with default options.
    pub fn open(locator: &str) -> Result<Self> {
        Self::open_with(locator, CoverageOptions::default())
    }

    /// Open a dataset from a local path or an `http(s)://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::DatasetUnavailable`] if the dataset cannot be
    /// read, is not a georeferenced GeoTIFF, or has no CRS and none was given.
    pub fn open_with(locator: &str, options: CoverageOptions) -> Result<Self> {
        let source = open_source(locator)?;
        Self::from_source(source, options)
    }

    /// Open a dataset over an already constructed byte source.
    pub fn from_source(source: Box<dyn RangeSource>, options: CoverageOptions) -> Result<Self> {
        let metadata = GeoTiffMetadata::read(source.as_ref())?;

        let native_crs = options
            .native_crs
            .or_else(|| metadata.epsg.map(|code| CrsCode::epsg(u32::from(code))))
            .ok_or_else(|| {
                ElevationError::unavailable(
                    source.identifier(),
                    "dataset declares no EPSG code and no CRS was configured",
                )
            })?;

        let extent = compute_extent(&metadata);

        tracing::info!(
            dataset = source.identifier(),
            remote = source.is_remote(),
            width = metadata.width,
            height = metadata.height,
            crs = %native_crs,
            "Opened elevation dataset"
        );

        Ok(Self {
            source,
            metadata,
            native_crs,
            extent,
            chunk_cache: Cache::builder()
                .max_capacity(options.chunk_cache_size)
                .build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// CRS the raster is georeferenced in.
    pub fn native_crs(&self) -> &CrsCode {
        &self.native_crs
    }

    /// Spatial extent in the native CRS.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn metadata(&self) -> &GeoTiffMetadata {
        &self.metadata
    }

    /// Path or URL the dataset was opened from.
    pub fn locator(&self) -> &str {
        self.source.identifier()
    }

    pub fn is_remote(&self) -> bool {
        self.source.is_remote()
    }

    /// Sample the raster at a point given in the native CRS.
    ///
    /// Points outside the extent, or with non-finite coordinates, are
    /// [`Sample::OutOfBounds`]; this is never an error.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::DatasetUnavailable`] if the chunk holding the
    /// pixel cannot be read or decoded.
    pub fn sample(&self, x: f64, y: f64) -> Result<Sample> {
        let point = Point2D::new(x, y);
        if !self.extent.contains(&point) {
            return Ok(Sample::OutOfBounds);
        }

        let (col, row) = self.pixel_at(x, y);
        let (chunk_index, local) = self.metadata.locate(col, row);
        let chunk = self.load_chunk(chunk_index)?;

        let Some(&value) = chunk.get(local) else {
            return Ok(Sample::NoData);
        };

        if value.is_nan() || self.metadata.nodata.is_some_and(|nd| value == nd as f32) {
            return Ok(Sample::NoData);
        }
        Ok(Sample::Value(f64::from(value)))
    }

    /// Sample at a point; convenience for [`Self::sample`].
    pub fn sample_point(&self, point: Point2D) -> Result<Sample> {
        self.sample(point.x, point.y)
    }

    /// Pixel containing an in-extent point, clamped so the east and south
    /// edges map to the last column and row.
    fn pixel_at(&self, x: f64, y: f64) -> (usize, usize) {
        let (col, row) = self.metadata.georef.world_to_pixel(x, y);
        let clamp = |v: f64, len: usize| (v.floor().max(0.0) as usize).min(len - 1);
        (
            clamp(col, self.metadata.width),
            clamp(row, self.metadata.height),
        )
    }

    /// Load a decoded chunk from cache or from the source.
    fn load_chunk(&self, index: usize) -> Result<Arc<Vec<f32>>> {
        if let Some(chunk) = self.chunk_cache.get(&index) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(chunk);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let chunk = Arc::new(self.metadata.read_chunk(self.source.as_ref(), index)?);
        tracing::trace!(chunk = index, "Decoded raster chunk");

        self.chunk_cache.insert(index, Arc::clone(&chunk));
        Ok(chunk)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.chunk_cache.run_pending_tasks();
        CacheStats {
            entry_count: self.chunk_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Get the maximum number of cached chunks.
    pub fn cache_capacity(&self) -> u64 {
        self.chunk_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Drop all decoded chunks.
    pub fn clear_cache(&self) {
        self.chunk_cache.invalidate_all();
    }
}

fn compute_extent(metadata: &GeoTiffMetadata) -> Extent {
    let (x0, y0) = metadata.georef.pixel_to_world(0.0, 0.0);
    let (x1, y1) = metadata
        .georef
        .pixel_to_world(metadata.width as f64, metadata.height as f64);
    Extent {
        min_x: x0.min(x1),
        min_y: y0.min(y1),
        max_x: x0.max(x1),
        max_y: y0.max(y1),
    }
}
