/// SSC index tool: per-feature urban-mask metrics, SSC index and the
/// collection-wide [0, 10] normalization.
///
/// Inputs:  feature GeoJSON + urban mask (Raster JSON, or GeoTIFF with --bounds)
/// Outputs: <output>/ssc_normalized.geojson    features with metrics, index and norm
///          <output>/ssc_undefined.geojson     features whose index is undefined
///          <output>/segments/<id>.geojson     vectorized urban segments (--segments)
///          <output>/failures.json             per-kind failure counts and ids
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use ssc_core::error::FailureReport;
use ssc_core::{io, Connectivity, FeatureCollection, GridEngine, PipelineConfig, SscPipeline};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ssc_index", about = "Compute and normalize the SSC index of every feature")]
struct Args {
    /// Input features (GeoJSON FeatureCollection)
    #[arg(long)]
    features: PathBuf,

    /// Urban mask: Raster JSON or single-band GeoTIFF
    #[arg(long)]
    mask: PathBuf,

    /// GeoTIFF extent as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_delimiter = ',', num_args = 4)]
    bounds: Option<Vec<f64>>,

    /// Mask value treated as no-data
    #[arg(long)]
    nodata: Option<f32>,

    /// Override the urban threshold: mask values >= threshold are urban
    #[arg(long)]
    threshold: Option<f32>,

    /// Pipeline config JSON (missing fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the metric scale (metres)
    #[arg(long)]
    nominal_scale: Option<f64>,

    /// Override the vectorization scale (metres)
    #[arg(long)]
    vectorize_scale: Option<f64>,

    /// Use 8-connectivity for segments
    #[arg(long)]
    eight: bool,

    /// Also write the segments of every feature
    #[arg(long)]
    segments: bool,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "out/ssc_index")]
    output: PathBuf,
}

#[derive(Serialize)]
struct Summary {
    input: usize,
    defined: usize,
    undefined: usize,
    failures: FailureReport,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(s) = args.nominal_scale {
        cfg.nominal_scale = s;
    }
    if let Some(s) = args.vectorize_scale {
        cfg.vectorize_scale = s;
    }
    if args.eight {
        cfg.connectivity = Connectivity::Eight;
    }
    if let Some(t) = args.threshold {
        cfg.urban_threshold = t;
    }
    cfg.validate().context("Invalid config after CLI overrides")?;
    Ok(cfg)
}

fn write_collection(path: &Path, fc: &FeatureCollection) -> Result<()> {
    fs::write(path, io::write_feature_collection(fc)).with_context(|| format!("Cannot write {}", path.display()))
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();
    let cfg = load_config(&args)?;

    let text = fs::read_to_string(&args.features)
        .with_context(|| format!("Cannot read {}", args.features.display()))?;
    let features = io::parse_feature_collection(&text)
        .with_context(|| format!("Failed to parse {}", args.features.display()))?;

    let bounds = args.bounds.as_deref().map(|b| [b[0], b[1], b[2], b[3]]);
    let mask = io::read_raster(&args.mask, bounds, args.nodata)
        .with_context(|| format!("Cannot load mask {}", args.mask.display()))?;
    log::info!(
        "{} features, mask {}×{}, urban at >= {}",
        features.len(),
        mask.width,
        mask.height,
        cfg.urban_threshold
    );

    let pipeline = SscPipeline::new(&GridEngine, cfg);
    let index = pipeline.compute_index(&features, &mask);
    let normalized = pipeline.normalize(&index.features).context("Normalization failed")?;

    fs::create_dir_all(&args.output)?;
    write_collection(&args.output.join("ssc_normalized.geojson"), &normalized)?;
    write_collection(&args.output.join("ssc_undefined.geojson"), &index.undefined)?;
    if args.segments {
        let dir = args.output.join("segments");
        fs::create_dir_all(&dir)?;
        for (id, segments) in &index.segments {
            write_collection(&dir.join(format!("{id}.geojson")), segments)?;
        }
    }

    let summary = Summary {
        input: features.len(),
        defined: index.features.len(),
        undefined: index.undefined.len(),
        failures: index.failures.report(),
    };
    let path = args.output.join("failures.json");
    fs::write(&path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    log::info!(
        "wrote {} normalized features to {} ({} failures)",
        normalized.len(),
        args.output.display(),
        summary.failures.total
    );
    Ok(())
}
