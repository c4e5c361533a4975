use anyhow::{bail, Context, Result};
use rastelev::{CrsCode, ElevationService, ElevationServiceBuilder, Point2D};

pub mod batch;
pub mod info;
pub mod point;
pub mod profile;

/// Global dataset flags shared by all commands.
pub struct DatasetOptions {
    pub dataset: Option<String>,
    pub cache_size: u64,
    pub dataset_crs: Option<String>,
}

impl DatasetOptions {
    /// Build the service and open the dataset.
    pub fn open_service(&self) -> Result<ElevationService> {
        let mut builder = match &self.dataset {
            Some(dataset) => ElevationServiceBuilder::new(dataset.as_str()),
            None => ElevationServiceBuilder::from_env().context(
                "No dataset configured. Use --dataset or set RASTELEV_DATASET",
            )?,
        };

        builder = builder.chunk_cache_size(self.cache_size);

        if let Some(crs) = &self.dataset_crs {
            let code = CrsCode::parse(crs).context("Invalid --dataset-crs")?;
            builder = builder.native_crs(code);
        }

        let service = builder.build();
        service.open().context("Failed to open dataset")?;
        Ok(service)
    }
}

/// The CRS to query in: the one given, or the dataset's own.
pub fn query_crs(service: &ElevationService, crs: Option<String>) -> Result<String> {
    match crs {
        Some(crs) => Ok(crs),
        None => Ok(service.coverage()?.native_crs().to_string()),
    }
}

/// Parse an `x,y` pair.
pub fn parse_point(value: &str) -> Result<Point2D> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        bail!("Invalid point '{}', expected x,y", value);
    }
    let x: f64 = parts[0]
        .parse()
        .with_context(|| format!("Invalid x in '{}'", value))?;
    let y: f64 = parts[1]
        .parse()
        .with_context(|| format!("Invalid y in '{}'", value))?;
    Ok(Point2D::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(
            parse_point("2600000,1200000").unwrap(),
            Point2D::new(2600000.0, 1200000.0)
        );
        assert_eq!(parse_point("-7.5, 46.25").unwrap(), Point2D::new(-7.5, 46.25));
        assert!(parse_point("1").is_err());
        assert!(parse_point("1,2,3").is_err());
        assert!(parse_point("a,2").is_err());
    }
}
