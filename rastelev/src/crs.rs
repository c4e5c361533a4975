//! CRS identifiers and point reprojection.
//!
//! CRS definitions come from the bundled EPSG database of `crs-definitions`
//! and are applied with `proj4rs`, so no native PROJ installation is needed.
//! Axis order is always easting/longitude first.

use std::fmt;
use std::sync::Arc;

use moka::sync::Cache;
use proj4rs::proj::Proj;

use crate::error::{ElevationError, Result};
use crate::geometry::Point2D;

/// Identifier of a coordinate reference system, e.g. `EPSG:2056`.
///
/// Parsed from `"2056"`, `"EPSG:2056"`, `"epsg:2056"`,
/// `"urn:ogc:def:crs:EPSG::2056"` or an OGC `.../EPSG/0/2056` URI.
/// Authorities are normalised to upper case, so equality is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrsCode {
    authority: String,
    code: u32,
}

impl CrsCode {
    /// An EPSG code.
    pub fn epsg(code: u32) -> Self {
        Self {
            authority: "EPSG".to_string(),
            code,
        }
    }

    /// Parse a CRS identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::CrsResolution`] for empty input, a
    /// non-numeric code, or a non-EPSG authority.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let fail = |reason: &str| ElevationError::CrsResolution {
            code: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(fail("empty CRS code"));
        }

        let upper = trimmed.to_ascii_uppercase();
        let code_part = upper
            .rsplit([':', '/'])
            .next()
            .unwrap_or(upper.as_str());
        let code: u32 = code_part
            .parse()
            .map_err(|_| fail("CRS code is not numeric"))?;

        let authority = if code_part.len() == upper.len() {
            "EPSG"
        } else if upper.starts_with("EPSG:")
            || upper.contains(":EPSG:")
            || upper.contains("/EPSG/")
        {
            "EPSG"
        } else {
            return Err(fail("only EPSG codes are supported"));
        };

        Ok(Self {
            authority: authority.to_string(),
            code,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn code(&self) -> u32 {
        self.code
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

impl std::str::FromStr for CrsCode {
    type Err = ElevationError;

    fn from_str(s: &str) -> Result<Self> {
        CrsCode::parse(s)
    }
}

/// A resolved CRS definition.
#[derive(Debug, Clone)]
pub struct CrsDefinition {
    pub code: CrsCode,
    /// PROJ.4 definition string.
    pub proj4: String,
}

impl CrsDefinition {
    /// Whether coordinates are longitude/latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        self.proj4.contains("+proj=longlat") || self.proj4.contains("+proj=latlong")
    }
}

/// Resolves CRS codes to definitions.
pub trait CrsRegistry: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ElevationError::CrsResolution`] if the code is unknown.
    fn resolve(&self, code: &CrsCode) -> Result<CrsDefinition>;
}

/// Registry backed by the EPSG database bundled in `crs-definitions`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpsgRegistry;

impl CrsRegistry for EpsgRegistry {
    fn resolve(&self, code: &CrsCode) -> Result<CrsDefinition> {
        u16::try_from(code.code())
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| CrsDefinition {
                code: code.clone(),
                proj4: def.proj4.to_string(),
            })
            .ok_or_else(|| ElevationError::CrsResolution {
                code: code.to_string(),
                reason: "not in the EPSG registry".to_string(),
            })
    }
}

/// A point transform between two CRSs.
pub enum Transform {
    /// Source and target are the same CRS.
    Identity,
    Proj {
        from: CrsCode,
        to: CrsCode,
        source: Proj,
        target: Proj,
        source_geographic: bool,
        target_geographic: bool,
    },
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => write!(f, "Transform::Identity"),
            Transform::Proj { from, to, .. } => write!(f, "Transform({} -> {})", from, to),
        }
    }
}

impl Transform {
    /// Build a transform between two resolved definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Transform`] if either definition cannot be
    /// turned into a projection.
    pub fn between(source: &CrsDefinition, target: &CrsDefinition) -> Result<Self> {
        if source.code == target.code {
            return Ok(Transform::Identity);
        }

        let fail = |reason: String| ElevationError::Transform {
            from: source.code.to_string(),
            to: target.code.to_string(),
            reason,
        };
        let source_proj = Proj::from_proj_string(&source.proj4)
            .map_err(|e| fail(format!("invalid source projection: {:?}", e)))?;
        let target_proj = Proj::from_proj_string(&target.proj4)
            .map_err(|e| fail(format!("invalid target projection: {:?}", e)))?;

        Ok(Transform::Proj {
            from: source.code.clone(),
            to: target.code.clone(),
            source: source_proj,
            target: target_proj,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
        })
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transform::Identity)
    }

    /// Transform one point.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Transform`] if the projection fails or
    /// produces a non-finite coordinate.
    pub fn apply(&self, point: Point2D) -> Result<Point2D> {
        let Transform::Proj {
            from,
            to,
            source,
            target,
            source_geographic,
            target_geographic,
        } = self
        else {
            return Ok(point);
        };

        let fail = |reason: String| ElevationError::Transform {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };

        // proj4rs works in radians for geographic coordinates
        let mut xyz = if *source_geographic {
            (point.x.to_radians(), point.y.to_radians(), 0.0)
        } else {
            (point.x, point.y, 0.0)
        };

        proj4rs::transform::transform(source, target, &mut xyz)
            .map_err(|e| fail(format!("{:?} at ({}, {})", e, point.x, point.y)))?;

        let out = if *target_geographic {
            Point2D::new(xyz.0.to_degrees(), xyz.1.to_degrees())
        } else {
            Point2D::new(xyz.0, xyz.1)
        };

        if !out.is_finite() {
            return Err(fail(format!(
                "non-finite result for ({}, {})",
                point.x, point.y
            )));
        }
        Ok(out)
    }
}

/// Builds and caches transforms between CRS pairs.
pub struct Reprojector {
    registry: Box<dyn CrsRegistry>,
    identity: Arc<Transform>,
    cache: Cache<(CrsCode, CrsCode), Arc<Transform>>,
}

impl Reprojector {
    /// Reprojector over the bundled EPSG registry, caching up to
    /// `cache_size` transforms.
    pub fn new(cache_size: u64) -> Self {
        Self::with_registry(Box::new(EpsgRegistry), cache_size)
    }

    pub fn with_registry(registry: Box<dyn CrsRegistry>, cache_size: u64) -> Self {
        Self {
            registry,
            identity: Arc::new(Transform::Identity),
            cache: Cache::builder().max_capacity(cache_size).build(),
        }
    }

    /// Get the transform from `source` to `target`.
    ///
    /// Equal codes yield the identity without consulting the registry.
    ///
    /// # Errors
    ///
    /// [`ElevationError::CrsResolution`] if either code is unknown,
    /// [`ElevationError::Transform`] if no transform can be built.
    pub fn get_transform(&self, source: &CrsCode, target: &CrsCode) -> Result<Arc<Transform>> {
        if source == target {
            return Ok(Arc::clone(&self.identity));
        }

        let key = (source.clone(), target.clone());
        if let Some(transform) = self.cache.get(&key) {
            return Ok(transform);
        }

        let source_def = self.registry.resolve(source)?;
        let target_def = self.registry.resolve(target)?;
        let transform = Arc::new(Transform::between(&source_def, &target_def)?);

        tracing::debug!(from = %source, to = %target, "Built CRS transform");

        self.cache.insert(key, Arc::clone(&transform));
        Ok(transform)
    }

    /// Reproject a single point.
    pub fn reproject(&self, point: Point2D, source: &CrsCode, target: &CrsCode) -> Result<Point2D> {
        self.get_transform(source, target)?.apply(point)
    }

    /// Number of cached transforms.
    pub fn cached_transforms(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    struct FailingRegistry;

    impl CrsRegistry for FailingRegistry {
        fn resolve(&self, code: &CrsCode) -> Result<CrsDefinition> {
            Err(ElevationError::CrsResolution {
                code: code.to_string(),
                reason: "registry should not be consulted".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(CrsCode::parse("2056").unwrap(), CrsCode::epsg(2056));
        assert_eq!(CrsCode::parse("EPSG:2056").unwrap(), CrsCode::epsg(2056));
        assert_eq!(CrsCode::parse(" epsg:2056 ").unwrap(), CrsCode::epsg(2056));
        assert_eq!(
            CrsCode::parse("urn:ogc:def:crs:EPSG::4326").unwrap(),
            CrsCode::epsg(4326)
        );
        assert_eq!(
            CrsCode::parse("http://www.opengis.net/def/crs/EPSG/0/3857").unwrap(),
            CrsCode::epsg(3857)
        );
        assert_eq!(CrsCode::epsg(21781).to_string(), "EPSG:21781");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "   ", "EPSG:", "abc", "ESRI:102100", "EPSG:12a"] {
            assert!(
                matches!(
                    CrsCode::parse(input),
                    Err(ElevationError::CrsResolution { .. })
                ),
                "{input:?} should not parse"
            );
        }
    }

    #[test]
    fn test_identity_skips_registry() {
        let reprojector = Reprojector::with_registry(Box::new(FailingRegistry), 8);
        let a = CrsCode::parse("EPSG:2056").unwrap();
        let b = CrsCode::parse("epsg:2056").unwrap();

        let transform = reprojector.get_transform(&a, &b).unwrap();
        assert!(transform.is_identity());

        let p = Point2D::new(2600000.123456789, 1200000.987654321);
        assert_eq!(transform.apply(p).unwrap(), p);
    }

    #[test]
    fn test_unknown_code() {
        let reprojector = Reprojector::new(8);
        let result = reprojector.get_transform(&CrsCode::epsg(999_999), &CrsCode::epsg(4326));
        assert!(matches!(
            result,
            Err(ElevationError::CrsResolution { .. })
        ));

        let result = reprojector.get_transform(&CrsCode::epsg(4326), &CrsCode::epsg(1));
        assert!(matches!(
            result,
            Err(ElevationError::CrsResolution { .. })
        ));
    }

    #[test]
    fn test_wgs84_to_web_mercator() {
        let reprojector = Reprojector::new(8);
        let p = reprojector
            .reproject(
                Point2D::new(0.0, 0.0),
                &CrsCode::epsg(4326),
                &CrsCode::epsg(3857),
            )
            .unwrap();
        assert!(p.x.abs() < EPS && p.y.abs() < EPS);

        let p = reprojector
            .reproject(
                Point2D::new(10.0, 0.0),
                &CrsCode::epsg(4326),
                &CrsCode::epsg(3857),
            )
            .unwrap();
        assert!((p.x - 1_113_194.907_932_7).abs() < 1e-3, "x = {}", p.x);
    }

    #[test]
    fn test_utm_central_meridian() {
        let reprojector = Reprojector::new(8);
        let p = reprojector
            .reproject(
                Point2D::new(9.0, 0.0),
                &CrsCode::epsg(4326),
                &CrsCode::epsg(32632),
            )
            .unwrap();
        assert!((p.x - 500_000.0).abs() < 1e-3, "x = {}", p.x);
        assert!(p.y.abs() < 1e-3, "y = {}", p.y);
    }

    #[test]
    fn test_round_trip_is_deterministic() {
        let reprojector = Reprojector::new(8);
        let wgs84 = CrsCode::epsg(4326);
        let mercator = CrsCode::epsg(3857);

        for (lon, lat) in [(7.53, 47.2), (-122.4, 37.8), (139.7, 35.7)] {
            let there = reprojector
                .reproject(Point2D::new(lon, lat), &wgs84, &mercator)
                .unwrap();
            let again = reprojector
                .reproject(Point2D::new(lon, lat), &wgs84, &mercator)
                .unwrap();
            assert_eq!(there, again);

            let back = reprojector.reproject(there, &mercator, &wgs84).unwrap();
            assert!((back.x - lon).abs() < EPS, "lon: {} != {}", back.x, lon);
            assert!((back.y - lat).abs() < EPS, "lat: {} != {}", back.y, lat);
        }
    }

    #[test]
    fn test_transforms_are_cached() {
        let reprojector = Reprojector::new(8);
        let a = reprojector
            .get_transform(&CrsCode::epsg(4326), &CrsCode::epsg(3857))
            .unwrap();
        let b = reprojector
            .get_transform(&CrsCode::epsg(4326), &CrsCode::epsg(3857))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reprojector.cached_transforms(), 1);
    }
}
