//! Stratified random sampling of one SSC class over coarse climate zones.

use std::collections::BTreeMap;

use geo::Rect;

use crate::classify::SscClass;
use crate::config::{PipelineConfig, RegionBounds};
use crate::engine::GeoEngine;
use crate::error::SscError;
use crate::feature::{keys, FeatureCollection};

/// Sample points of one class plus the strata that could not be filled.
#[derive(Debug, Clone, Default)]
pub struct StratumSampling {
    pub points: FeatureCollection,
    /// One `InsufficientStrata` per zone with fewer pixels than requested.
    pub warnings: Vec<SscError>,
    /// Set when the class could not be painted at all (pixel budget).
    pub failure: Option<SscError>,
}

fn region_rect([x0, y0, x1, y1]: RegionBounds) -> Rect<f64> {
    Rect::new(geo::coord! { x: x0, y: y0 }, geo::coord! { x: x1, y: y1 })
}

/// Paint `zoned` by `klima_2` at the sample scale and draw
/// `sample_count_per_stratum` points per zone present.
pub fn sample_strata<E: GeoEngine + ?Sized>(
    engine: &E,
    class: SscClass,
    zoned: &FeatureCollection,
    config: &PipelineConfig,
) -> StratumSampling {
    let region = config.sample_region.map(region_rect).or_else(|| zoned.bounding_rect());
    let Some(region) = region else {
        log::info!("[{}] nothing to sample", class.name());
        return StratumSampling::default();
    };

    let painted = match engine.rasterize_by_attribute(
        zoned,
        keys::COARSE_ZONE,
        region,
        config.sample_scale,
        config.sample_pixel_budget,
    ) {
        Ok(raster) => raster,
        Err(e) => {
            log::warn!("[{}] sampling skipped: {e}", class.name());
            return StratumSampling { failure: Some(e), ..StratumSampling::default() };
        }
    };
    let mut available: BTreeMap<i64, usize> = BTreeMap::new();
    for v in painted.data.iter().filter(|v| v.is_finite()) {
        *available.entry(v.round() as i64).or_default() += 1;
    }
    for zone in zoned.column(keys::COARSE_ZONE) {
        available.entry(zone.round() as i64).or_default();
    }

    let requested = config.sample_count_per_stratum;
    let warnings: Vec<SscError> = available
        .iter()
        .filter(|(_, &n)| n < requested)
        .map(|(&zone, &n)| SscError::InsufficientStrata { class: class.code(), zone, requested, available: n })
        .collect();
    for w in &warnings {
        log::warn!("[{}] {w}", class.name());
    }

    let points = engine
        .stratified_sample(&painted, keys::COARSE_ZONE, requested, config.random_seed)
        .map(|p| p.with_attributes([(keys::SSC_CLASS, class.code())]));
    log::info!(
        "[{}] sampled {} points over {} zone(s)",
        class.name(),
        points.len(),
        available.len()
    );
    StratumSampling { points, warnings, failure: None }
}
