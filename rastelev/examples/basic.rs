//! Basic example demonstrating rastelev library usage.
//!
//! Run with: cargo run --example basic -- /path/to/dtm.tif

use rastelev::{ElevationError, ElevationService, LineProfileRequest, Point2D};
use std::env;

fn main() -> Result<(), ElevationError> {
    let dataset = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/dtm.tif");
        std::process::exit(1);
    });

    let service = ElevationService::new(dataset);
    let coverage = service.coverage()?;
    let extent = coverage.extent();
    println!("Dataset CRS: {}", coverage.native_crs());
    println!(
        "Extent: [{}, {}] x [{}, {}]",
        extent.min_x, extent.max_x, extent.min_y, extent.max_y
    );

    // Query the centre of the raster in its own CRS
    let centre = Point2D::new(
        extent.min_x + extent.width() / 2.0,
        extent.min_y + extent.height() / 2.0,
    );
    let crs = coverage.native_crs().to_string();
    let elevation = service.point_elevation(centre.x, centre.y, &crs)?;
    println!("\nElevation at centre: {:.2}m", elevation);

    // Diagonal profile across the raster
    let request = LineProfileRequest::from_vertices(
        vec![
            Point2D::new(extent.min_x, extent.min_y),
            Point2D::new(extent.max_x, extent.max_y),
        ],
        11,
    );
    let elevations = service.line_profile_elevation(&request)?;

    println!("\nDiagonal profile ({:.0} units):", request.total_length());
    println!("{:-<40}", "");
    for (i, elevation) in elevations.iter().enumerate() {
        println!("  {:>3}%  {:>8.2}m", i * 10, elevation);
    }

    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached chunks: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
