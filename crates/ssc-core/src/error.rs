//! Error taxonomy shared by every pipeline stage.
//!
//! Per-feature errors (`ComputationLimitExceeded`, `SscIndexUndefined`) are
//! collected into a [`FailureSummary`] and never abort a batch.
//! `DegenerateRange` and `EmptyCollection` abort normalization.
//! `InsufficientStrata` is a warning carried next to the sampled output.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::feature::FeatureId;

pub type Result<T, E = SscError> = std::result::Result<T, E>;

/// One of the three ratios in the SSC formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFactor {
    /// urban pixels / segment count
    PixelsPerSegment,
    /// summed urban area / feature area
    UrbanShare,
    /// max segment area / mean segment area
    SizeDispersion,
}

impl fmt::Display for IndexFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PixelsPerSegment => "urban pixels / segment count",
            Self::UrbanShare => "summed area / feature area",
            Self::SizeDispersion => "max segment area / mean segment area",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SscError {
    #[error("pixel budget exceeded: {pixels} pixels requested, budget is {budget}")]
    ComputationLimitExceeded { pixels: u64, budget: u64 },

    #[error("SSC index undefined: zero or undefined denominator in {factor}")]
    SscIndexUndefined { factor: IndexFactor },

    #[error("cannot normalize: all {count} SSC index values equal {value}")]
    DegenerateRange { value: f64, count: usize },

    #[error("cannot normalize: collection has no defined SSC index values")]
    EmptyCollection,

    #[error(
        "stratum (class {class}, zone {zone}) has {available} pixels, {requested} samples requested"
    )]
    InsufficientStrata {
        class: i64,
        zone: i64,
        requested: usize,
        available: usize,
    },

    #[error("feature {feature} has no polygonal geometry")]
    UnsupportedGeometry { feature: FeatureId },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(String),

    #[error("unreadable raster: {0}")]
    RasterFormat(String),
}

impl SscError {
    /// Short stable name used to group failures in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ComputationLimitExceeded { .. } => "computation_limit_exceeded",
            Self::SscIndexUndefined { .. } => "ssc_index_undefined",
            Self::DegenerateRange { .. } => "degenerate_range",
            Self::EmptyCollection => "empty_collection",
            Self::InsufficientStrata { .. } => "insufficient_strata",
            Self::UnsupportedGeometry { .. } => "unsupported_geometry",
            Self::InvalidConfig(_) => "invalid_config",
            Self::GeoJson(_) => "geojson",
            Self::RasterFormat(_) => "raster_format",
        }
    }
}

impl From<geojson::Error> for SscError {
    fn from(e: geojson::Error) -> Self {
        Self::GeoJson(e.to_string())
    }
}

// ── Failure summary ───────────────────────────────────────────────────────────

/// A per-feature failure: which feature, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFailure {
    pub feature: FeatureId,
    pub error: SscError,
}

/// Per-feature failures gathered over one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureSummary {
    pub failures: Vec<FeatureFailure>,
}

/// Serializable view of a [`FailureSummary`]: count plus offending ids per kind.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub total: usize,
    pub by_kind: BTreeMap<&'static str, Vec<String>>,
}

impl FailureSummary {
    pub fn push(&mut self, feature: FeatureId, error: SscError) {
        self.failures.push(FeatureFailure { feature, error });
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn ids(&self) -> Vec<&FeatureId> {
        self.failures.iter().map(|f| &f.feature).collect()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.failures.iter().filter(|f| f.error.kind() == kind).count()
    }

    pub fn extend(&mut self, other: FailureSummary) {
        self.failures.extend(other.failures);
    }

    pub fn report(&self) -> FailureReport {
        let mut by_kind: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for f in &self.failures {
            by_kind.entry(f.error.kind()).or_default().push(f.feature.to_string());
        }
        FailureReport { total: self.failures.len(), by_kind }
    }

    /// Emit one warning line per failure kind.
    pub fn log(&self, stage: &str) {
        if self.failures.is_empty() {
            return;
        }
        for (kind, ids) in &self.report().by_kind {
            log::warn!("[{stage}] {} feature(s) failed with {kind}: {}", ids.len(), ids.join(", "));
        }
    }
}
