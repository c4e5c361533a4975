use anyhow::Result;

use super::DatasetOptions;

pub fn run(options: &DatasetOptions) -> Result<()> {
    let service = options.open_service()?;
    let coverage = service.coverage()?;
    let metadata = coverage.metadata();
    let extent = coverage.extent();
    let georef = &metadata.georef;

    println!("Dataset: {}", coverage.locator());
    println!(
        "Source: {}",
        if coverage.is_remote() {
            "remote (HTTP range reads)"
        } else {
            "local file"
        }
    );
    println!();
    println!("CRS: {}", coverage.native_crs());
    if metadata.epsg.is_none() {
        println!("  (no geokeys in file, CRS set by configuration)");
    }
    println!(
        "Size: {}x{} pixels, {:?}, {} band(s)",
        metadata.width, metadata.height, metadata.sample_type, metadata.samples_per_pixel
    );
    println!(
        "Pixel size: {} x {}",
        georef.pixel_width, georef.pixel_height
    );
    println!(
        "Extent: [{}, {}] x [{}, {}]",
        extent.min_x, extent.max_x, extent.min_y, extent.max_y
    );
    println!();
    println!(
        "Layout: {} {}x{}, {} chunk(s)",
        if metadata.tiled { "tiles" } else { "strips" },
        metadata.chunk_width,
        metadata.chunk_height,
        metadata.chunk_count()
    );
    println!(
        "Compression: {:?}{}",
        metadata.compression,
        if metadata.predictor > 1 {
            format!(" (predictor {})", metadata.predictor)
        } else {
            String::new()
        }
    );
    println!(
        "Format: {}{}",
        if metadata.bigtiff { "BigTIFF" } else { "TIFF" },
        if metadata.little_endian {
            ", little-endian"
        } else {
            ", big-endian"
        }
    );
    match metadata.nodata {
        Some(nodata) => println!("No-data value: {}", nodata),
        None => println!("No-data value: none"),
    }
    println!("Chunk cache capacity: {}", coverage.cache_capacity());

    Ok(())
}
