//! Collection-wide min/max rescaling of the SSC index to [0, 10].

use crate::error::{Result, SscError};
use crate::feature::{keys, FeatureCollection};

/// Upper end of the normalized scale.
pub const NORMALIZED_MAX: f64 = 10.0;

/// Observed index range of a collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexRange {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl IndexRange {
    /// Range of the defined values. Fails on empty input or `max == min`.
    pub fn of(values: &[f64]) -> Result<Self> {
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let (min, max, count) = finite.fold((f64::INFINITY, f64::NEG_INFINITY, 0), |(lo, hi, n), v| {
            (lo.min(v), hi.max(v), n + 1)
        });
        if count == 0 {
            return Err(SscError::EmptyCollection);
        }
        if max == min {
            return Err(SscError::DegenerateRange { value: min, count });
        }
        Ok(Self { min, max, count })
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min) * NORMALIZED_MAX
    }
}

/// Write `norm_attribute` on every feature with a defined `gee_ssc_index`.
/// Features without an index are kept unchanged.
pub fn normalize(collection: &FeatureCollection, norm_attribute: &str) -> Result<FeatureCollection> {
    let range = IndexRange::of(&collection.column(keys::SSC_INDEX))?;
    log::info!(
        "normalizing {} SSC index values over [{:.6}, {:.6}]",
        range.count,
        range.min,
        range.max
    );
    Ok(collection.map(|f| match f.number(keys::SSC_INDEX).filter(|v| v.is_finite()) {
        Some(ssc) => f.with_attributes([(norm_attribute, range.normalize(ssc))]),
        None => f.clone(),
    }))
}
