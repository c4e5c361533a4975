//! Planar geometry primitives.

use serde::{Deserialize, Serialize};

/// A point in some CRS. Which CRS is contextual, not stored on the value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`; `mu = 0` is `self`, `mu = 1` is `other`.
    pub fn lerp(&self, other: &Point2D, mu: f64) -> Point2D {
        Point2D {
            x: self.x + mu * (other.x - self.x),
            y: self.y + mu * (other.y - self.y),
        }
    }

    /// Planar distance to `other`.
    pub fn distance(&self, other: &Point2D) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for [f64; 2] {
    fn from(p: Point2D) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in the raster's native CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Whether `point` lies inside the extent, edges included.
    pub fn contains(&self, point: &Point2D) -> bool {
        (self.min_x..=self.max_x).contains(&point.x) && (self.min_y..=self.max_y).contains(&point.y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(10.0, -4.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.25), Point2D::new(2.5, -1.0));
    }

    #[test]
    fn test_distance() {
        assert_eq!(Point2D::new(0.0, 0.0).distance(&Point2D::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_point_serde_as_pair() {
        let p: Point2D = serde_json::from_str("[2600000.5, 1200000.25]").unwrap();
        assert_eq!(p, Point2D::new(2600000.5, 1200000.25));
        assert_eq!(serde_json::to_string(&p).unwrap(), "[2600000.5,1200000.25]");
    }

    #[test]
    fn test_extent_contains_edges() {
        let extent = Extent {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
        };
        assert!(extent.contains(&Point2D::new(0.0, 0.0)));
        assert!(extent.contains(&Point2D::new(100.0, 100.0)));
        assert!(!extent.contains(&Point2D::new(-0.001, 50.0)));
        assert!(!extent.contains(&Point2D::new(f64::NAN, 50.0)));
        assert_eq!(extent.width(), 100.0);
    }
}
