//! Per-feature SSC metrics: region statistics of the urban mask, segments,
//! segment statistics and the SSC index.

pub mod aggregate;
pub mod index;
pub mod region;
pub mod segments;

use crate::config::PipelineConfig;
use crate::engine::GeoEngine;
use crate::error::{Result, SscError};
use crate::feature::{Feature, FeatureCollection};
use crate::raster::Raster;

pub use aggregate::{aggregate_segments, SegmentStats};
pub use index::{compute_ssc_index, MetricsRecord};
pub use region::{feature_area_km2, region_metrics, RegionMetrics};
pub use segments::segments;

/// Metrics of one feature plus the segments they were derived from.
#[derive(Debug, Clone)]
pub struct FeatureMetrics {
    pub record: MetricsRecord,
    pub segments: FeatureCollection,
}

/// Run region metrics, vectorization and segment aggregation for one feature.
pub fn compute_feature_metrics<E: GeoEngine + ?Sized>(
    engine: &E,
    feature: &Feature,
    mask: &Raster,
    config: &PipelineConfig,
) -> Result<FeatureMetrics> {
    let geometry = feature
        .polygons()
        .ok_or_else(|| SscError::UnsupportedGeometry { feature: feature.id().clone() })?;

    let region = region_metrics(engine, mask, &geometry, config)?;
    let segments = segments(engine, &region.clipped, &geometry, config)?;
    let stats = aggregate_segments(&segments);

    let record = MetricsRecord {
        urban_pixels: region.pixel_count,
        sum_area_km2: region.area_km2,
        feature_area_km2: feature_area_km2(&geometry),
        segment_count: stats.count,
        mean_segment_area_km2: stats.mean_area_km2,
        max_segment_area_km2: stats.max_area_km2,
    };
    log::debug!(
        "feature {}: {} urban px, {} segments, {:.4} km² urban of {:.4} km²",
        feature.id(),
        record.urban_pixels,
        record.segment_count,
        record.sum_area_km2,
        record.feature_area_km2
    );
    Ok(FeatureMetrics { record, segments })
}
