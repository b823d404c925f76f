/// Stratify tool: classify a normalized SSC collection into low / medium /
/// high, reclassify climate codes into coarse zones and draw stratified
/// random sample points per (class, zone).
///
/// Inputs:  normalized GeoJSON (gee_ssc_norm) + optional climate-zone
///          polygons (GeoJSON with a `DN` code per polygon)
/// Outputs: <output>/<class>_zones.geojson     class features with klima_2
///          <output>/<class>_samples.geojson   sample points
///          <output>/warnings.json             unfilled strata, dropped features, failed classes
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use ssc_core::{io, FeatureCollection, GridEngine, PipelineConfig, SscPipeline, ZoneIndex};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stratify", about = "Classify normalized SSC features and sample them per climate zone")]
struct Args {
    /// Normalized features (output of ssc_index)
    #[arg(long)]
    features: PathBuf,

    /// Climate-zone polygons; without them `klima` must already be present
    #[arg(long)]
    zones: Option<PathBuf>,

    /// Pipeline config JSON (missing fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override points per stratum
    #[arg(long)]
    count: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Build Cw from its own code range instead of the legacy Cs filter
    #[arg(long)]
    fix_cw: bool,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "out/stratify")]
    output: PathBuf,
}

#[derive(Serialize)]
struct ClassReport {
    features: usize,
    zoned: usize,
    dropped: Vec<String>,
    samples: usize,
    warnings: Vec<String>,
    failure: Option<String>,
}

#[derive(Serialize)]
struct Report {
    excluded: usize,
    classes: BTreeMap<&'static str, ClassReport>,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    io::parse_feature_collection(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_collection(path: &Path, fc: &FeatureCollection) -> Result<()> {
    fs::write(path, io::write_feature_collection(fc)).with_context(|| format!("Cannot write {}", path.display()))
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
            PipelineConfig::from_json(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    if let Some(n) = args.count {
        cfg.sample_count_per_stratum = n;
    }
    if let Some(seed) = args.seed {
        cfg.random_seed = seed;
    }
    if args.fix_cw {
        cfg.legacy_cw_from_cs = false;
    }
    cfg.validate().context("Invalid config after CLI overrides")?;

    let normalized = read_collection(&args.features)?;
    let zones = args.zones.as_deref().map(read_collection).transpose()?;
    let zone_index = zones.as_ref().map(ZoneIndex::new);
    if let Some(index) = &zone_index {
        log::info!("{} climate-zone polygons indexed", index.len());
    }

    let run = SscPipeline::new(&GridEngine, cfg).stratify(&normalized, zone_index.as_ref());

    fs::create_dir_all(&args.output)?;
    let mut report = Report { excluded: run.excluded, classes: BTreeMap::new() };
    for (class, class_run) in &run.classes {
        let name = class.name();
        write_collection(&args.output.join(format!("{name}_zones.geojson")), &class_run.zones.collection)?;
        write_collection(&args.output.join(format!("{name}_samples.geojson")), &class_run.sampling.points)?;
        report.classes.insert(
            name,
            ClassReport {
                features: class_run.features.len(),
                zoned: class_run.zones.collection.len(),
                dropped: class_run.zones.dropped.iter().map(|id| id.to_string()).collect(),
                samples: class_run.sampling.points.len(),
                warnings: class_run.sampling.warnings.iter().map(|w| w.to_string()).collect(),
                failure: class_run.sampling.failure.as_ref().map(|e| e.to_string()),
            },
        );
    }

    let path = args.output.join("warnings.json");
    fs::write(&path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    let total: usize = report.classes.values().map(|c| c.samples).sum();
    log::info!("wrote {total} sample points to {} ({} features excluded)", args.output.display(), run.excluded);
    Ok(())
}
