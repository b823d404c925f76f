use geo::{BoundingRect, GeodesicArea, MultiPolygon};

use crate::config::PipelineConfig;
use crate::engine::{GeoEngine, Reducer};
use crate::error::Result;
use crate::raster::Raster;

/// Urban-mask statistics of one feature geometry.
#[derive(Debug, Clone)]
pub struct RegionMetrics {
    /// Unmasked pixels at the nominal scale (pixel-centre inclusion).
    pub pixel_count: f64,
    /// Σ(mask × true pixel area) over the geometry, km².
    pub area_km2: f64,
    /// Mask restricted to the geometry; input of vectorization.
    pub clipped: Raster,
}

/// Metrics of `geometry` over `mask`. Only values `>= config.urban_threshold`
/// count as urban; zeros and NaN are masked out before any reduction.
pub fn region_metrics<E: GeoEngine + ?Sized>(
    engine: &E,
    mask: &Raster,
    geometry: &MultiPolygon<f64>,
    config: &PipelineConfig,
) -> Result<RegionMetrics> {
    let Some(window) = geometry.bounding_rect().and_then(|rect| mask.crop(rect)) else {
        let clipped = engine.clip(mask, geometry);
        return Ok(RegionMetrics { pixel_count: 0.0, area_km2: 0.0, clipped });
    };
    let urban = window.urban_mask(config.urban_threshold);

    let pixel_count = engine
        .reduce_region(&urban, Reducer::Count, geometry, config.nominal_scale, config.pixel_budget)?
        .unwrap_or(0.0);
    let area_km2 = integrated_area_m2(engine, &urban, geometry, config.nominal_scale, config.pixel_budget)? / 1e6;
    let clipped = engine.clip(&urban, geometry);
    Ok(RegionMetrics { pixel_count, area_km2, clipped })
}

/// Σ(raster × true pixel area) over `geometry` in m², boundary pixels
/// weighted by coverage. Zero where the raster does not reach.
pub fn integrated_area_m2<E: GeoEngine + ?Sized>(
    engine: &E,
    raster: &Raster,
    geometry: &MultiPolygon<f64>,
    scale: f64,
    pixel_budget: u64,
) -> Result<f64> {
    let window = geometry.bounding_rect().and_then(|rect| raster.crop(rect));
    let Some(window) = window else {
        return Ok(0.0);
    };
    let areas = engine.pixel_area(&window, scale, pixel_budget)?;
    Ok(engine.reduce_region(&areas, Reducer::Sum, geometry, scale, pixel_budget)?.unwrap_or(0.0))
}

/// Geodesic (WGS84) area of a geometry, km².
pub fn feature_area_km2(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.geodesic_area_unsigned() / 1e6
}
