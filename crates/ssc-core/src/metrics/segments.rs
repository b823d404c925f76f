//! Segments: connected groups of urban pixels of one feature, with areas.

use geo::MultiPolygon;

use super::region::integrated_area_m2;
use crate::config::PipelineConfig;
use crate::engine::GeoEngine;
use crate::error::Result;
use crate::feature::{keys, FeatureCollection};
use crate::raster::Raster;

/// Vectorize a clipped mask at the vectorization scale and attach each
/// segment's `area_km2` (clipped mask × true pixel area, nominal scale).
pub fn segments<E: GeoEngine + ?Sized>(
    engine: &E,
    clipped: &Raster,
    geometry: &MultiPolygon<f64>,
    config: &PipelineConfig,
) -> Result<FeatureCollection> {
    let raw = engine.vectorize(
        clipped,
        geometry,
        config.connectivity,
        config.vectorize_scale,
        config.vectorize_pixel_budget,
    )?;

    let mut out = Vec::with_capacity(raw.len());
    for segment in &raw {
        let area_km2 = match segment.polygons() {
            Some(polygons) => {
                integrated_area_m2(engine, clipped, &polygons, config.nominal_scale, config.pixel_budget)? / 1e6
            }
            None => f64::NAN,
        };
        out.push(segment.with_attributes([(keys::SEGMENT_AREA, area_km2)]));
    }
    Ok(FeatureCollection::new(out))
}
