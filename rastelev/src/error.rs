//! Error types for the rastelev library.

use thiserror::Error;

/// Errors that can occur when querying the elevation raster.
///
/// A point outside the raster extent is not an error: it is reported as
/// [`Sample::OutOfBounds`](crate::Sample::OutOfBounds) and answered with `0`.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// The raster cannot be opened or read (missing file, unreachable URL,
    /// corrupt or unsupported format).
    #[error("Dataset unavailable: {locator}: {reason}")]
    DatasetUnavailable { locator: String, reason: String },

    /// A CRS code cannot be resolved to a known coordinate system.
    #[error("Unknown CRS '{code}': {reason}")]
    CrsResolution { code: String, reason: String },

    /// No transform exists between two CRSs, or the transform failed numerically.
    #[error("Transform from {from} to {to} failed: {reason}")]
    Transform {
        from: String,
        to: String,
        reason: String,
    },

    /// Structurally invalid input.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ElevationError {
    pub(crate) fn unavailable(locator: impl Into<String>, reason: impl ToString) -> Self {
        ElevationError::DatasetUnavailable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ElevationError::MalformedRequest(reason.into())
    }
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::unavailable("/data/dtm.tif", "No such file");
        assert!(err.to_string().contains("/data/dtm.tif"));
        assert!(err.to_string().contains("No such file"));

        let err = ElevationError::CrsResolution {
            code: "EPSG:99999".to_string(),
            reason: "not in registry".to_string(),
        };
        assert!(err.to_string().contains("99999"));

        let err = ElevationError::Transform {
            from: "EPSG:4326".to_string(),
            to: "EPSG:2056".to_string(),
            reason: "non-finite result".to_string(),
        };
        assert!(err.to_string().contains("EPSG:4326"));
        assert!(err.to_string().contains("EPSG:2056"));

        let err = ElevationError::malformed("2 coordinates but 3 distances");
        assert!(err.to_string().contains("3 distances"));
    }
}
