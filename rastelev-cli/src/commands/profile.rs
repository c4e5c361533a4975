use anyhow::{Context, Result};
use clap::ValueEnum;
use rastelev::{geojson::profile_to_linestring, LineProfileRequest};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use super::{parse_point, query_crs, DatasetOptions};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One `distance elevation` line per sample
    Text,
    /// `{"elevations": [...]}`
    Json,
    /// 3D GeoJSON LineString of the samples
    Geojson,
}

pub fn run(
    options: &DatasetOptions,
    coordinates: Vec<String>,
    request: Option<PathBuf>,
    distances: Option<Vec<f64>>,
    samples: usize,
    crs: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let service = options.open_service()?;

    let request = match request {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            serde_json::from_reader::<_, LineProfileRequest>(BufReader::new(file))
                .context("Failed to parse profile request")?
        }
        None => {
            let vertices = coordinates
                .iter()
                .map(|c| parse_point(c))
                .collect::<Result<Vec<_>>>()?;
            let request = match distances {
                Some(distances) => LineProfileRequest::new(vertices, distances, samples),
                None => LineProfileRequest::from_vertices(vertices, samples),
            };
            request.with_crs(query_crs(&service, crs)?)
        }
    };

    let elevations = service
        .line_profile_elevation(&request)
        .context("Failed to sample profile")?;

    match format {
        OutputFormat::Text => {
            let total = request.total_length();
            let step = if elevations.len() > 1 {
                total / (elevations.len() - 1) as f64
            } else {
                0.0
            };
            for (i, elevation) in elevations.iter().enumerate() {
                println!("{:.2}\t{:.2}", i as f64 * step, elevation);
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "elevations": elevations })
            );
        }
        OutputFormat::Geojson => {
            let line = profile_to_linestring(&request, &elevations)?;
            println!("{}", serde_json::to_string_pretty(&line)?);
        }
    }

    Ok(())
}
