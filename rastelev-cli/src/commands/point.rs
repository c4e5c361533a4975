use anyhow::{Context, Result};
use serde::Serialize;

use super::{query_crs, DatasetOptions};

#[derive(Serialize)]
struct ElevationResponse {
    x: f64,
    y: f64,
    crs: String,
    elevation: f64,
}

pub fn run(options: &DatasetOptions, x: f64, y: f64, crs: Option<String>, json: bool) -> Result<()> {
    let service = options.open_service()?;
    let crs = query_crs(&service, crs)?;

    let elevation = service
        .point_elevation(x, y, &crs)
        .context("Failed to get elevation")?;

    if json {
        let response = ElevationResponse {
            x,
            y,
            crs,
            elevation,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{:.2}", elevation);
    }

    Ok(())
}
