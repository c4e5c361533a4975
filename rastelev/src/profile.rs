//! Arc-length resampling of polylines.
//!
//! A profile is sampled at `samples` points spaced evenly by cumulative
//! distance along the line, independent of where the vertices are.

use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};
use crate::geometry::Point2D;

/// A line profile query.
///
/// `distances[i]` is the length of the segment from `coordinates[i]` to
/// `coordinates[i + 1]`. Callers may supply their own lengths (e.g. geodesic
/// ones); [`LineProfileRequest::from_vertices`] derives planar lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineProfileRequest {
    pub coordinates: Vec<Point2D>,
    pub distances: Vec<f64>,
    pub samples: usize,
    /// CRS of `coordinates`; the raster's native CRS when absent.
    #[serde(default, alias = "projection", skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl LineProfileRequest {
    pub fn new(coordinates: Vec<Point2D>, distances: Vec<f64>, samples: usize) -> Self {
        Self {
            coordinates,
            distances,
            samples,
            crs: None,
        }
    }

    /// Build a request whose segment lengths are the planar distances
    /// between consecutive vertices.
    pub fn from_vertices(coordinates: Vec<Point2D>, samples: usize) -> Self {
        let distances = coordinates
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .collect();
        Self::new(coordinates, distances, samples)
    }

    /// Declare the CRS of the coordinates.
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Total length of the line.
    pub fn total_length(&self) -> f64 {
        self.distances.iter().sum()
    }

    /// Check the request shape.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::MalformedRequest`] for fewer than two
    /// vertices, a distance count other than `vertices - 1`, negative or
    /// non-finite values, or `samples == 0`.
    pub fn validate(&self) -> Result<()> {
        validate_shape(&self.coordinates, &self.distances, self.samples)
    }

    /// Positions of the samples along the line.
    pub fn positions(&self) -> Result<Vec<Point2D>> {
        arc_length_positions(&self.coordinates, &self.distances, self.samples)
    }
}

fn validate_shape(vertices: &[Point2D], distances: &[f64], samples: usize) -> Result<()> {
    if vertices.len() < 2 {
        return Err(ElevationError::malformed(format!(
            "a profile needs at least 2 coordinates, got {}",
            vertices.len()
        )));
    }
    if distances.len() != vertices.len() - 1 {
        return Err(ElevationError::malformed(format!(
            "{} coordinates need {} distances, got {}",
            vertices.len(),
            vertices.len() - 1,
            distances.len()
        )));
    }
    if samples == 0 {
        return Err(ElevationError::malformed("samples must be at least 1"));
    }
    if let Some(i) = vertices.iter().position(|p| !p.is_finite()) {
        return Err(ElevationError::malformed(format!(
            "coordinate {} is not finite",
            i
        )));
    }
    if let Some(i) = distances.iter().position(|d| !d.is_finite() || *d < 0.0) {
        return Err(ElevationError::malformed(format!(
            "distance {} must be finite and non-negative, got {}",
            i, distances[i]
        )));
    }
    Ok(())
}

/// Compute `samples` points evenly spaced by arc length along a polyline.
///
/// Sample `k` lies at arc length `k * T / (samples - 1)` where `T` is the sum
/// of `distances`; a single sample sits on the first vertex. Zero-length
/// segments resolve to their start vertex.
///
/// # Errors
///
/// Returns [`ElevationError::MalformedRequest`] if the shape is invalid (see
/// [`LineProfileRequest::validate`]).
pub fn arc_length_positions(
    vertices: &[Point2D],
    distances: &[f64],
    samples: usize,
) -> Result<Vec<Point2D>> {
    validate_shape(vertices, distances, samples)?;

    let n = vertices.len();
    let mut cumulative = Vec::with_capacity(n);
    cumulative.push(0.0);
    for d in distances {
        let last = cumulative[cumulative.len() - 1];
        cumulative.push(last + d);
    }
    let total = cumulative[n - 1];

    let step = if samples > 1 {
        total / (samples - 1) as f64
    } else {
        0.0
    };

    // Targets grow monotonically, so the segment cursor only moves forward.
    let mut i = 0;
    let positions = (0..samples)
        .map(|s| {
            let target = s as f64 * step;
            while i + 2 < n && cumulative[i + 1] < target {
                i += 1;
            }

            let length = cumulative[i + 1] - cumulative[i];
            let mu = if length > 0.0 {
                ((target - cumulative[i]) / length).clamp(0.0, 1.0)
            } else {
                0.0
            };
            vertices[i].lerp(&vertices[i + 1], mu)
        })
        .collect();

    Ok(positions)
}

/// Sample a profile: resample the line, then evaluate `sampler` at every
/// position in arc-length order.
///
/// The first sampler error aborts the profile.
pub fn sample_profile<F>(
    vertices: &[Point2D],
    distances: &[f64],
    samples: usize,
    sampler: F,
) -> Result<Vec<f64>>
where
    F: FnMut(Point2D) -> Result<f64>,
{
    arc_length_positions(vertices, distances, samples)?
        .into_iter()
        .map(sampler)
        .collect()
}
