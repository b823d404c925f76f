/// Tiling tool: cover every input polygon with a regular lon/lat grid and
/// carry a fixed set of attributes (renamed) onto the cells.
///
/// Output: one GeoJSON FeatureCollection of cells with ids `<feature>_<i>`.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ssc_core::io;
use ssc_core::tiling::{tile_features, TilingConfig};

#[derive(Parser, Debug)]
#[command(name = "tiling", about = "Split polygons into a regular lon/lat cell grid")]
struct Args {
    /// Input polygons (GeoJSON FeatureCollection)
    #[arg(long)]
    features: PathBuf,

    /// Tiling config JSON (dx, dy, renames)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override cell width in degrees
    #[arg(long)]
    dx: Option<f64>,

    /// Override cell height in degrees
    #[arg(long)]
    dy: Option<f64>,

    /// Output GeoJSON
    #[arg(short, long, default_value = "out/tiles.geojson")]
    output: PathBuf,
}

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
            serde_json::from_str::<TilingConfig>(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => TilingConfig::default(),
    };
    if let Some(dx) = args.dx {
        cfg.dx = dx;
    }
    if let Some(dy) = args.dy {
        cfg.dy = dy;
    }
    cfg.validate()?;

    let text = fs::read_to_string(&args.features)
        .with_context(|| format!("Cannot read {}", args.features.display()))?;
    let features = io::parse_feature_collection(&text)
        .with_context(|| format!("Failed to parse {}", args.features.display()))?;

    let (cells, failures) = tile_features(&features, &cfg);

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&args.output, io::write_feature_collection(&cells))
        .with_context(|| format!("Cannot write {}", args.output.display()))?;
    log::info!(
        "wrote {} cells to {} ({} features skipped)",
        cells.len(),
        args.output.display(),
        failures.len()
    );
    Ok(())
}
