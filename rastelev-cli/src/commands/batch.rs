use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rastelev::{geojson::drape_geometry, ElevationService, Point2D};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{query_crs, DatasetOptions};

/// Records per `point_elevations` call, so the progress bar moves.
const CHUNK_SIZE: usize = 1024;

pub fn run(
    options: &DatasetOptions,
    input: PathBuf,
    output: Option<PathBuf>,
    x_col: String,
    y_col: String,
    crs: Option<String>,
) -> Result<()> {
    let service = options.open_service()?;
    let crs = query_crs(&service, crs)?;

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => process_csv(&service, &input, output, &x_col, &y_col, &crs),
        "geojson" | "json" => process_geojson(&service, &input, output, &crs),
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    }
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_elevation.{}", stem, suffix))
}

fn process_csv(
    service: &ElevationService,
    input: &Path,
    output: Option<PathBuf>,
    x_col: &str,
    y_col: &str,
    crs: &str,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    // Find column indices
    let headers = reader.headers()?.clone();
    let x_idx = headers
        .iter()
        .position(|h| h == x_col)
        .with_context(|| format!("Column '{}' not found in CSV", x_col))?;
    let y_idx = headers
        .iter()
        .position(|h| h == y_col)
        .with_context(|| format!("Column '{}' not found in CSV", y_col))?;

    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    let points = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let x: f64 = record
                .get(x_idx)
                .with_context(|| format!("Missing x in row {}", i + 1))?
                .trim()
                .parse()
                .with_context(|| format!("Invalid x in row {}", i + 1))?;
            let y: f64 = record
                .get(y_idx)
                .with_context(|| format!("Missing y in row {}", i + 1))?
                .trim()
                .parse()
                .with_context(|| format!("Invalid y in row {}", i + 1))?;
            Ok(Point2D::new(x, y))
        })
        .collect::<Result<Vec<_>>>()?;

    let pb = progress_bar(points.len() as u64)?;
    let mut elevations = Vec::with_capacity(points.len());
    for chunk in points.chunks(CHUNK_SIZE) {
        elevations.extend(service.point_elevations(chunk, crs)?);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("done");

    let output_path = output.unwrap_or_else(|| default_output(input, "csv"));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(output_file));

    // Write header
    let mut new_headers: Vec<&str> = headers.iter().collect();
    new_headers.push("elevation");
    writer.write_record(&new_headers)?;

    for (record, elevation) in records.iter().zip(elevations) {
        let elevation = format!("{:.2}", elevation);
        let mut new_record: Vec<&str> = record.iter().collect();
        new_record.push(&elevation);
        writer.write_record(&new_record)?;
    }
    writer.flush()?;

    println!("Output written to: {}", output_path.display());
    Ok(())
}

fn process_geojson(
    service: &ElevationService,
    input: &Path,
    output: Option<PathBuf>,
    crs: &str,
) -> Result<()> {
    let file = File::open(input).context("Failed to open input file")?;
    let reader = BufReader::new(file);

    let geojson: geojson::GeoJson =
        serde_json::from_reader(reader).context("Failed to parse GeoJSON")?;

    let result = match geojson {
        geojson::GeoJson::Geometry(geometry) => {
            geojson::GeoJson::Geometry(drape_geometry(service, geometry, crs)?)
        }
        geojson::GeoJson::Feature(mut feature) => {
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(drape_geometry(service, geometry, crs)?);
            }
            geojson::GeoJson::Feature(feature)
        }
        geojson::GeoJson::FeatureCollection(mut fc) => {
            let pb = progress_bar(fc.features.len() as u64)?;
            for feature in &mut fc.features {
                if let Some(geometry) = feature.geometry.take() {
                    feature.geometry = Some(drape_geometry(service, geometry, crs)?);
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");
            geojson::GeoJson::FeatureCollection(fc)
        }
    };

    let output_path = output.unwrap_or_else(|| default_output(input, "geojson"));
    let output_file = File::create(&output_path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(output_file);
    serde_json::to_writer_pretty(&mut writer, &result)?;
    writer.flush()?;

    println!("Output written to: {}", output_path.display());
    Ok(())
}
