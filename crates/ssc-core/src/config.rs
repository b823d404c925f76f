//! Flat pipeline configuration.
//!
//! Defaults are the constants of the batch SSC run. Every
//! field is optional in a JSON config file; missing fields take the default.

use serde::{Deserialize, Serialize};

use crate::engine::Connectivity;
use crate::error::{Result, SscError};
use crate::zones::ClimateRangeTable;

/// Upper bounds of the `low` and `medium` SSC classes on the normalized scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub low_hi: f64,
    pub med_hi: f64,
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self { low_hi: 1.0, med_hi: 1.8 }
    }
}

/// Sampling region as `[min_lon, min_lat, max_lon, max_lat]`.
pub type RegionBounds = [f64; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Metric reduction scale in metres (pixel count, areas).
    pub nominal_scale: f64,
    /// Vectorization scale in metres; coarser than `nominal_scale`.
    pub vectorize_scale: f64,
    pub connectivity: Connectivity,
    /// Mask values `>=` this are urban; lower values and NaN are masked out.
    pub urban_threshold: f32,
    /// Pixel budget of each metric reduction.
    pub pixel_budget: u64,
    /// Pixel budget of each vectorization.
    pub vectorize_pixel_budget: u64,
    /// Points drawn per (class, coarse zone) stratum.
    pub sample_count_per_stratum: usize,
    /// Painting / sampling scale in metres.
    pub sample_scale: f64,
    /// Pixel budget of each per-class painting.
    pub sample_pixel_budget: u64,
    /// Sampling region; defaults to the bounding box of each class collection.
    pub sample_region: Option<RegionBounds>,
    pub class_thresholds: ClassThresholds,
    pub climate_range_table: ClimateRangeTable,
    /// Build the Cw stratum from the Cs range filter (legacy export behaviour).
    pub legacy_cw_from_cs: bool,
    pub random_seed: u64,
    /// Name of the normalized-index attribute read by the classifier.
    pub norm_attribute: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nominal_scale: 10.0,
            vectorize_scale: 35.0,
            connectivity: Connectivity::Four,
            urban_threshold: 0.5,
            pixel_budget: 10_000_000_000_000,
            vectorize_pixel_budget: 15_000_000,
            sample_count_per_stratum: 2,
            sample_scale: 100.0,
            sample_pixel_budget: 100_000_000,
            sample_region: None,
            class_thresholds: ClassThresholds::default(),
            climate_range_table: ClimateRangeTable::default(),
            legacy_cw_from_cs: true,
            random_seed: 0,
            norm_attribute: crate::feature::keys::SSC_NORM.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| SscError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("nominal_scale", self.nominal_scale),
            ("vectorize_scale", self.vectorize_scale),
            ("sample_scale", self.sample_scale),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(SscError::InvalidConfig(format!("{name} must be positive, got {v}")));
            }
        }
        if !self.urban_threshold.is_finite() {
            return Err(SscError::InvalidConfig(format!(
                "urban_threshold must be finite, got {}",
                self.urban_threshold
            )));
        }
        let t = self.class_thresholds;
        if !(t.low_hi > 0.0 && t.med_hi > t.low_hi) {
            return Err(SscError::InvalidConfig(format!(
                "class thresholds must satisfy 0 < low_hi < med_hi, got [{}, {}]",
                t.low_hi, t.med_hi
            )));
        }
        if let Some([x0, y0, x1, y1]) = self.sample_region {
            if !(x1 > x0 && y1 > y0) {
                return Err(SscError::InvalidConfig("sample_region must be [min_lon, min_lat, max_lon, max_lat]".into()));
            }
        }
        self.climate_range_table.validate()
    }
}
