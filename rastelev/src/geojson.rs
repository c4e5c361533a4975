//! GeoJSON integration.
//!
//! Enable the `geojson` feature to use this module.
//!
//! ```ignore
//! use rastelev::ElevationService;
//! use rastelev::geojson::drape_geometry;
//! use geojson::Geometry;
//!
//! let service = ElevationService::new("/data/dtm_2056.tif");
//! let line: Geometry = r#"{"type": "LineString", "coordinates": [[2600000, 1200000], [2600100, 1200050]]}"#
//!     .parse()
//!     .unwrap();
//!
//! // [[2600000, 1200000, 541.2], [2600100, 1200050, 546.9]]
//! let draped = drape_geometry(&service, line, "EPSG:2056")?;
//! ```

use geojson::{Geometry, Value as GeoJsonValue};

use crate::error::{ElevationError, Result};
use crate::geometry::Point2D;
use crate::profile::LineProfileRequest;
use crate::ElevationService;

fn position_to_point(position: &[f64]) -> Result<Point2D> {
    match position {
        [x, y, ..] => Ok(Point2D::new(*x, *y)),
        _ => Err(ElevationError::malformed(format!(
            "position needs at least 2 values, got {}",
            position.len()
        ))),
    }
}

fn type_name(value: &GeoJsonValue) -> &'static str {
    match value {
        GeoJsonValue::Point(_) => "Point",
        GeoJsonValue::MultiPoint(_) => "MultiPoint",
        GeoJsonValue::LineString(_) => "LineString",
        GeoJsonValue::MultiLineString(_) => "MultiLineString",
        GeoJsonValue::Polygon(_) => "Polygon",
        GeoJsonValue::MultiPolygon(_) => "MultiPolygon",
        GeoJsonValue::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Build a profile request from a LineString geometry, with planar segment
/// lengths.
///
/// # Errors
///
/// Returns [`ElevationError::MalformedRequest`] for any other geometry type
/// or positions with fewer than two values.
pub fn profile_request_from_geometry(
    geometry: &Geometry,
    samples: usize,
) -> Result<LineProfileRequest> {
    let GeoJsonValue::LineString(positions) = &geometry.value else {
        return Err(ElevationError::malformed(format!(
            "profiles need a LineString, got {}",
            type_name(&geometry.value)
        )));
    };

    let vertices = positions
        .iter()
        .map(|p| position_to_point(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(LineProfileRequest::from_vertices(vertices, samples))
}

/// A 3D LineString of a sampled profile: the sample positions with the
/// elevations as Z.
pub fn profile_to_linestring(request: &LineProfileRequest, elevations: &[f64]) -> Result<Geometry> {
    let positions = request.positions()?;
    if positions.len() != elevations.len() {
        return Err(ElevationError::malformed(format!(
            "{} sample positions but {} elevations",
            positions.len(),
            elevations.len()
        )));
    }

    let coords = positions
        .iter()
        .zip(elevations)
        .map(|(p, z)| vec![p.x, p.y, *z])
        .collect();
    Ok(Geometry::new(GeoJsonValue::LineString(coords)))
}

/// Add the elevation as Z to every position of a geometry given in `crs`.
///
/// An existing Z value is replaced. Positions outside the raster get `0`.
///
/// # Errors
///
/// Returns an error if `crs` cannot be resolved, the dataset cannot be read,
/// or a position has fewer than two values.
pub fn drape_geometry(service: &ElevationService, geometry: Geometry, crs: &str) -> Result<Geometry> {
    let value = match geometry.value {
        GeoJsonValue::Point(position) => {
            let mut draped = drape_positions(service, vec![position], crs)?;
            GeoJsonValue::Point(draped.pop().unwrap_or_default())
        }
        GeoJsonValue::MultiPoint(positions) => {
            GeoJsonValue::MultiPoint(drape_positions(service, positions, crs)?)
        }
        GeoJsonValue::LineString(positions) => {
            GeoJsonValue::LineString(drape_positions(service, positions, crs)?)
        }
        GeoJsonValue::MultiLineString(lines) => GeoJsonValue::MultiLineString(
            lines
                .into_iter()
                .map(|line| drape_positions(service, line, crs))
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::Polygon(rings) => GeoJsonValue::Polygon(
            rings
                .into_iter()
                .map(|ring| drape_positions(service, ring, crs))
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::MultiPolygon(polygons) => GeoJsonValue::MultiPolygon(
            polygons
                .into_iter()
                .map(|polygon| {
                    polygon
                        .into_iter()
                        .map(|ring| drape_positions(service, ring, crs))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::GeometryCollection(geometries) => GeoJsonValue::GeometryCollection(
            geometries
                .into_iter()
                .map(|g| drape_geometry(service, g, crs))
                .collect::<Result<_>>()?,
        ),
    };

    Ok(Geometry::new(value))
}

fn drape_positions(
    service: &ElevationService,
    positions: Vec<Vec<f64>>,
    crs: &str,
) -> Result<Vec<Vec<f64>>> {
    let points = positions
        .iter()
        .map(|p| position_to_point(p))
        .collect::<Result<Vec<_>>>()?;
    let elevations = service.point_elevations(&points, crs)?;

    Ok(points
        .iter()
        .zip(elevations)
        .map(|(p, z)| vec![p.x, p.y, z])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestRaster;

    /// `[0, 100] x [0, 100]` in EPSG:2056, constant 42.
    fn service() -> (tempfile::NamedTempFile, ElevationService) {
        let file = TestRaster::new(10, 10, vec![42.0; 100])
            .origin(0.0, 100.0)
            .pixel_size(10.0, 10.0)
            .write();
        let service = ElevationService::new(file.path().display().to_string());
        (file, service)
    }

    #[test]
    fn test_profile_request_from_linestring() {
        let line: Geometry = r#"{"type": "LineString", "coordinates": [[0, 0], [3, 4], [3, 10, 99]]}"#
            .parse()
            .unwrap();
        let request = profile_request_from_geometry(&line, 7).unwrap();
        assert_eq!(request.coordinates.len(), 3);
        assert_eq!(request.distances, vec![5.0, 6.0]);
        assert_eq!(request.samples, 7);
    }

    #[test]
    fn test_profile_request_rejects_other_types() {
        let point: Geometry = r#"{"type": "Point", "coordinates": [1, 2]}"#.parse().unwrap();
        assert!(matches!(
            profile_request_from_geometry(&point, 5),
            Err(ElevationError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_drape_point_and_linestring() {
        let (_file, service) = service();

        let point: Geometry = r#"{"type": "Point", "coordinates": [50, 50]}"#.parse().unwrap();
        let draped = drape_geometry(&service, point, "2056").unwrap();
        assert_eq!(draped.value, GeoJsonValue::Point(vec![50.0, 50.0, 42.0]));

        let line: Geometry = r#"{"type": "LineString", "coordinates": [[10, 10, 5], [-10, 10]]}"#
            .parse()
            .unwrap();
        let draped = drape_geometry(&service, line, "2056").unwrap();
        assert_eq!(
            draped.value,
            GeoJsonValue::LineString(vec![vec![10.0, 10.0, 42.0], vec![-10.0, 10.0, 0.0]])
        );
    }

    #[test]
    fn test_drape_polygon_and_collection() {
        let (_file, service) = service();

        let collection: Geometry = r#"{
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Polygon", "coordinates": [[[10, 10], [20, 10], [20, 20], [10, 10]]]},
                {"type": "MultiPoint", "coordinates": [[1, 1], [500, 500]]}
            ]
        }"#
        .parse()
        .unwrap();

        let draped = drape_geometry(&service, collection, "EPSG:2056").unwrap();
        let GeoJsonValue::GeometryCollection(geometries) = draped.value else {
            panic!("expected a GeometryCollection");
        };
        match &geometries[0].value {
            GeoJsonValue::Polygon(rings) => {
                assert!(rings[0].iter().all(|p| p.len() == 3 && p[2] == 42.0));
            }
            other => panic!("expected a Polygon, got {:?}", other),
        }
        assert_eq!(
            geometries[1].value,
            GeoJsonValue::MultiPoint(vec![vec![1.0, 1.0, 42.0], vec![500.0, 500.0, 0.0]])
        );
    }

    #[test]
    fn test_drape_rejects_short_positions() {
        let (_file, service) = service();
        let point = Geometry::new(GeoJsonValue::Point(vec![1.0]));
        assert!(drape_geometry(&service, point, "2056").is_err());
    }

    #[test]
    fn test_profile_to_linestring() {
        let request = LineProfileRequest::from_vertices(
            vec![Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0)],
            3,
        );
        let geometry = profile_to_linestring(&request, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            geometry.value,
            GeoJsonValue::LineString(vec![
                vec![0.0, 0.0, 1.0],
                vec![5.0, 0.0, 2.0],
                vec![10.0, 0.0, 3.0],
            ])
        );
        assert!(profile_to_linestring(&request, &[1.0]).is_err());
    }
}
