//! Attach the maximum raster value inside each feature.

use serde::{Deserialize, Serialize};

use crate::engine::{GeoEngine, Reducer};
use crate::error::{FailureSummary, SscError};
use crate::feature::{keys, Feature, FeatureCollection};
use crate::par;
use crate::raster::Raster;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterJoinConfig {
    pub scale: f64,
    pub pixel_budget: u64,
    /// Attribute receiving the value.
    pub attribute: String,
}

impl Default for RasterJoinConfig {
    fn default() -> Self {
        Self { scale: 10.0, pixel_budget: 1_000_000_000, attribute: keys::RASTER_VALUE.to_string() }
    }
}

/// Write the maximum of `raster` over each feature into `config.attribute`.
/// Features covering no valid pixel get NaN; failing features are dropped and
/// listed in the summary.
pub fn join_raster_max<E: GeoEngine + ?Sized>(
    engine: &E,
    collection: &FeatureCollection,
    raster: &Raster,
    config: &RasterJoinConfig,
) -> (FeatureCollection, FailureSummary) {
    let results: Vec<Result<Feature, SscError>> = par::map(collection.features(), |f| {
        let polygons = f.polygons().ok_or_else(|| SscError::UnsupportedGeometry { feature: f.id().clone() })?;
        let max = engine.reduce_region(raster, Reducer::Max, &polygons, config.scale, config.pixel_budget)?;
        Ok(f.with_attributes([(config.attribute.as_str(), max.unwrap_or(f64::NAN))]))
    });

    let mut failures = FailureSummary::default();
    let mut joined = Vec::with_capacity(results.len());
    for (feature, result) in collection.iter().zip(results) {
        match result {
            Ok(f) => joined.push(f),
            Err(e) => failures.push(feature.id().clone(), e),
        }
    }
    log::info!("joined raster values onto {} of {} features", joined.len(), collection.len());
    failures.log("raster_join");
    (FeatureCollection::new(joined), failures)
}
