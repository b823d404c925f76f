/// Raster join tool: attach the maximum raster value found inside each
/// feature (e.g. a settlement-footprint raster onto tiling cells).
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ssc_core::io;
use ssc_core::raster_join::{join_raster_max, RasterJoinConfig};
use ssc_core::GridEngine;

#[derive(Parser, Debug)]
#[command(name = "raster_join", about = "Join the per-feature maximum of a raster onto polygons")]
struct Args {
    /// Input polygons (GeoJSON FeatureCollection)
    #[arg(long)]
    features: PathBuf,

    /// Raster JSON or single-band GeoTIFF
    #[arg(long)]
    raster: PathBuf,

    /// GeoTIFF extent as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_delimiter = ',', num_args = 4)]
    bounds: Option<Vec<f64>>,

    /// Raster value treated as no-data
    #[arg(long)]
    nodata: Option<f32>,

    /// Reduction scale in metres
    #[arg(long, default_value = "10")]
    scale: f64,

    /// Attribute receiving the value
    #[arg(long, default_value = "wsf_in")]
    attribute: String,

    /// Output GeoJSON
    #[arg(short, long, default_value = "out/raster_join.geojson")]
    output: PathBuf,
}

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();
    anyhow::ensure!(args.scale.is_finite() && args.scale > 0.0, "--scale must be positive");

    let text = fs::read_to_string(&args.features)
        .with_context(|| format!("Cannot read {}", args.features.display()))?;
    let features = io::parse_feature_collection(&text)
        .with_context(|| format!("Failed to parse {}", args.features.display()))?;
    let bounds = args.bounds.as_deref().map(|b| [b[0], b[1], b[2], b[3]]);
    let raster = io::read_raster(&args.raster, bounds, args.nodata)
        .with_context(|| format!("Cannot load raster {}", args.raster.display()))?;

    let cfg = RasterJoinConfig { scale: args.scale, attribute: args.attribute, ..RasterJoinConfig::default() };
    let (joined, failures) = join_raster_max(&GridEngine, &features, &raster, &cfg);

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&args.output, io::write_feature_collection(&joined))
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    log::info!(
        "wrote {} features to {} ({} failed)",
        joined.len(),
        args.output.display(),
        failures.len()
    );
    Ok(())
}
