//! Pipeline orchestrator: runs all SSC stages in order and keeps every
//! intermediate collection.
//!
//! Stage order:
//!   1. Per-feature metrics and SSC index (parallel, failures isolated)
//!   2. Collection-wide normalization
//!   3. Optional climate join
//!   4. Classification into low / medium / high
//!   5. Per class: zone reclassification and stratified sampling

use std::collections::BTreeMap;

use crate::classify::{partition, SscClass};
use crate::config::PipelineConfig;
use crate::engine::GeoEngine;
use crate::error::{FailureSummary, Result, SscError};
use crate::feature::{keys, Feature, FeatureCollection, FeatureId};
use crate::metrics::{compute_feature_metrics, compute_ssc_index, FeatureMetrics};
use crate::normalize::normalize;
use crate::par;
use crate::raster::Raster;
use crate::sampler::{sample_strata, StratumSampling};
use crate::zones::{join_climate_zones, reclassify_zones, ZoneIndex, ZoneReclassification};

// ── Stage outputs ─────────────────────────────────────────────────────────────

/// Output of the per-feature stage.
#[derive(Debug, Clone, Default)]
pub struct IndexRun {
    /// Features with metric attributes and a defined `gee_ssc_index`.
    pub features: FeatureCollection,
    /// Features whose metrics completed but whose index is undefined.
    pub undefined: FeatureCollection,
    /// Segments of every feature that got through vectorization.
    pub segments: BTreeMap<FeatureId, FeatureCollection>,
    pub failures: FailureSummary,
}

/// Intermediate and final collections of one SSC class.
#[derive(Debug, Clone)]
pub struct ClassRun {
    pub class: SscClass,
    /// Class subset, tagged with `gee_ssc_class`.
    pub features: FeatureCollection,
    pub zones: ZoneReclassification,
    pub sampling: StratumSampling,
}

#[derive(Debug, Clone, Default)]
pub struct StratifyRun {
    /// Normalized collection after the optional climate join.
    pub joined: FeatureCollection,
    pub classes: BTreeMap<SscClass, ClassRun>,
    /// Features without a positive normalized index.
    pub excluded: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub index: IndexRun,
    pub normalized: FeatureCollection,
    pub strata: StratifyRun,
}

enum Outcome {
    Indexed(Feature, FeatureCollection),
    Undefined(Feature, FeatureCollection, SscError),
    Failed(FeatureId, SscError),
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct SscPipeline<'e, E: GeoEngine + ?Sized> {
    engine: &'e E,
    config: PipelineConfig,
}

impl<'e, E: GeoEngine + ?Sized> SscPipeline<'e, E> {
    pub fn new(engine: &'e E, config: PipelineConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn index_one(&self, feature: &Feature, mask: &Raster) -> Outcome {
        let FeatureMetrics { record, segments } = match compute_feature_metrics(self.engine, feature, mask, &self.config) {
            Ok(m) => m,
            Err(e) => return Outcome::Failed(feature.id().clone(), e),
        };
        let with_metrics = feature.with_attributes(record.attributes());
        match compute_ssc_index(&record) {
            Ok(ssc) => Outcome::Indexed(with_metrics.with_attributes([(keys::SSC_INDEX, ssc)]), segments),
            Err(e) => Outcome::Undefined(with_metrics, segments, e),
        }
    }

    /// Metrics and SSC index of every feature against one urban mask.
    /// A failing feature never aborts the batch; it is listed in `failures`.
    pub fn compute_index(&self, features: &FeatureCollection, mask: &Raster) -> IndexRun {
        let outcomes = par::map(features.features(), |f| self.index_one(f, mask));

        let mut run = IndexRun::default();
        let mut indexed = Vec::new();
        let mut undefined = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Indexed(f, segments) => {
                    run.segments.insert(f.id().clone(), segments);
                    indexed.push(f);
                }
                Outcome::Undefined(f, segments, e) => {
                    run.segments.insert(f.id().clone(), segments);
                    run.failures.push(f.id().clone(), e);
                    undefined.push(f);
                }
                Outcome::Failed(id, e) => run.failures.push(id, e),
            }
        }
        run.features = FeatureCollection::new(indexed);
        run.undefined = FeatureCollection::new(undefined);

        log::info!(
            "SSC index: {} of {} features defined, {} failed",
            run.features.len(),
            features.len(),
            run.failures.len()
        );
        run.failures.log("ssc_index");
        run
    }

    /// Rescale the defined indices to [0, 10] into `norm_attribute`.
    pub fn normalize(&self, indexed: &FeatureCollection) -> Result<FeatureCollection> {
        normalize(indexed, &self.config.norm_attribute)
    }

    /// Classify a normalized collection, reclassify climate zones per class
    /// and draw the stratified samples. With `zones`, `klima` is joined first.
    pub fn stratify(&self, normalized: &FeatureCollection, zones: Option<&ZoneIndex>) -> StratifyRun {
        let joined = match zones {
            Some(index) => join_climate_zones(normalized, index),
            None => normalized.clone(),
        };
        let parts = partition(&joined, &self.config.norm_attribute, &self.config.class_thresholds);

        let classes = SscClass::ALL
            .into_iter()
            .map(|class| {
                let features = parts.get(class).clone();
                let zones = reclassify_zones(
                    &features,
                    &self.config.climate_range_table,
                    self.config.legacy_cw_from_cs,
                );
                let sampling = sample_strata(self.engine, class, &zones.collection, &self.config);
                (class, ClassRun { class, features, zones, sampling })
            })
            .collect();

        StratifyRun { joined, classes, excluded: parts.excluded }
    }

    /// All stages. Fails only on collection-wide errors (normalization).
    pub fn run(&self, features: &FeatureCollection, mask: &Raster, zones: Option<&ZoneIndex>) -> Result<PipelineRun> {
        let index = self.compute_index(features, mask);
        let normalized = self.normalize(&index.features)?;
        let strata = self.stratify(&normalized, zones);
        Ok(PipelineRun { index, normalized, strata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::step_for_scale;
    use crate::engine::{GridEngine, SamplingGrid};
    use crate::feature::Attributes;
    use geo::polygon;

    fn cell(id: &str, x0: f64, cells: f64, scale: f64) -> Feature {
        let st = step_for_scale(scale);
        let (a, b) = (x0 * st, (x0 + cells) * st);
        Feature::new(id, polygon![(x: a, y: 0.0), (x: b, y: 0.0), (x: b, y: cells * st), (x: a, y: cells * st)], Attributes::new())
    }

    #[test]
    fn undefined_feature_does_not_abort_the_batch() {
        let scale = 100.0;
        let urban = cell("urban", 0.0, 4.0, scale);
        let empty = cell("empty", 10.0, 4.0, scale);
        let fc = FeatureCollection::new(vec![urban, empty]);

        let grid = SamplingGrid::covering(fc.bounding_rect().unwrap(), scale);
        let mut mask = grid.to_raster(vec![f32::NAN; grid.cols * grid.rows]);
        for row in 0..4 {
            for col in 0..4 {
                mask.set(row, col, 1.0);
            }
        }
        let cfg = PipelineConfig { nominal_scale: scale, vectorize_scale: scale, ..PipelineConfig::default() };
        let run = SscPipeline::new(&GridEngine, cfg).compute_index(&fc, &mask);

        assert_eq!(run.features.len(), 1);
        assert_eq!(run.undefined.len(), 1);
        assert_eq!(run.failures.ids(), vec![&FeatureId::from("empty")]);
        assert_eq!(run.failures.count_kind("ssc_index_undefined"), 1);
        assert_eq!(run.undefined.features()[0].number(keys::SEGMENT_COUNT), Some(0.0));
        assert!(run.segments.contains_key(&FeatureId::from("urban")));
    }

    #[test]
    fn budget_failure_is_isolated() {
        let scale = 100.0;
        let small = cell("small", 0.0, 2.0, scale);
        let large = cell("large", 4.0, 40.0, scale);
        let fc = FeatureCollection::new(vec![small, large]);
        let grid = SamplingGrid::covering(fc.bounding_rect().unwrap(), scale);
        let mask = grid.to_raster(vec![1.0; grid.cols * grid.rows]);
        let cfg = PipelineConfig {
            nominal_scale: scale,
            vectorize_scale: scale,
            pixel_budget: 100,
            ..PipelineConfig::default()
        };
        let run = SscPipeline::new(&GridEngine, cfg).compute_index(&fc, &mask);
        assert_eq!(run.failures.count_kind("computation_limit_exceeded"), 1);
        assert_eq!(run.failures.ids(), vec![&FeatureId::from("large")]);
        assert_eq!(run.features.len(), 1);
    }

    #[test]
    fn stratify_tags_class_and_zone() {
        let scale = 100.0;
        let mk = |id: &str, x0: f64, norm: f64, klima: f64| {
            cell(id, x0, 3.0, scale).with_attributes([(keys::SSC_NORM, norm), (keys::CLIMATE_ZONE, klima)])
        };
        let fc = FeatureCollection::new(vec![mk("a", 0.0, 0.5, 7.0), mk("b", 3.0, 5.0, 20.0), mk("c", 6.0, 0.0, 7.0)]);
        let cfg = PipelineConfig { legacy_cw_from_cs: false, ..PipelineConfig::default() };
        let run = SscPipeline::new(&GridEngine, cfg).stratify(&fc, None);

        assert_eq!(run.excluded, 1);
        let low = &run.classes[&SscClass::Low];
        assert_eq!(low.features.len(), 1);
        assert_eq!(low.zones.collection.column(keys::COARSE_ZONE), vec![1.0]);
        assert_eq!(low.sampling.points.len(), 2);
        let high = &run.classes[&SscClass::High];
        assert!(high.sampling.points.iter().all(|p| p.number(keys::COARSE_ZONE) == Some(5.0)));
        assert!(run.classes[&SscClass::Medium].sampling.points.is_empty());
    }
}
