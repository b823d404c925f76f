//! Threshold classification of the normalized SSC index.

use serde::Serialize;

use crate::config::ClassThresholds;
use crate::feature::{keys, FeatureCollection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SscClass {
    Low,
    Medium,
    High,
}

impl SscClass {
    pub const ALL: [SscClass; 3] = [Self::Low, Self::Medium, Self::High];

    /// Value written to `gee_ssc_class`.
    pub fn code(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Class of a normalized value; `None` for `n <= 0` and non-finite values.
    pub fn of(n: f64, thresholds: &ClassThresholds) -> Option<Self> {
        if !n.is_finite() || n <= 0.0 {
            None
        } else if n <= thresholds.low_hi {
            Some(Self::Low)
        } else if n <= thresholds.med_hi {
            Some(Self::Medium)
        } else {
            Some(Self::High)
        }
    }
}

/// The three class subsets of one collection, each feature tagged with
/// `gee_ssc_class`.
#[derive(Debug, Clone, Default)]
pub struct ClassPartition {
    pub low: FeatureCollection,
    pub medium: FeatureCollection,
    pub high: FeatureCollection,
    /// Features with a missing, non-finite or non-positive normalized index.
    pub excluded: usize,
}

impl ClassPartition {
    pub fn get(&self, class: SscClass) -> &FeatureCollection {
        match class {
            SscClass::Low => &self.low,
            SscClass::Medium => &self.medium,
            SscClass::High => &self.high,
        }
    }
}

/// Split a normalized collection into SSC classes read from `norm_attribute`.
pub fn partition(collection: &FeatureCollection, norm_attribute: &str, thresholds: &ClassThresholds) -> ClassPartition {
    let mut parts = ClassPartition::default();
    let mut buckets: [Vec<_>; 3] = Default::default();
    for f in collection {
        match f.number(norm_attribute).and_then(|n| SscClass::of(n, thresholds)) {
            Some(class) => {
                let idx = class.code() as usize - 1;
                buckets[idx].push(f.with_attributes([(keys::SSC_CLASS, class.code())]));
            }
            None => parts.excluded += 1,
        }
    }
    let [low, medium, high] = buckets;
    parts.low = FeatureCollection::new(low);
    parts.medium = FeatureCollection::new(medium);
    parts.high = FeatureCollection::new(high);
    log::info!(
        "classified {} features: {} low, {} medium, {} high, {} excluded",
        collection.len(),
        parts.low.len(),
        parts.medium.len(),
        parts.high.len(),
        parts.excluded
    );
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Attributes, Feature};

    #[test]
    fn thresholds_are_upper_inclusive() {
        let t = ClassThresholds::default();
        assert_eq!(SscClass::of(0.0, &t), None);
        assert_eq!(SscClass::of(-1.0, &t), None);
        assert_eq!(SscClass::of(0.5, &t), Some(SscClass::Low));
        assert_eq!(SscClass::of(1.0, &t), Some(SscClass::Low));
        assert_eq!(SscClass::of(1.5, &t), Some(SscClass::Medium));
        assert_eq!(SscClass::of(1.8, &t), Some(SscClass::Medium));
        assert_eq!(SscClass::of(1.81, &t), Some(SscClass::High));
        assert_eq!(SscClass::of(f64::NAN, &t), None);
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let values = [0.0, 0.2, 1.0, 1.2, 1.8, 2.0, 9.9, 10.0, -3.0];
        let fc: FeatureCollection = values
            .iter()
            .enumerate()
            .map(|(i, &n)| Feature::new(i, geo::Point::new(0.0, 0.0), Attributes::new()).with_attributes([(keys::SSC_NORM, n)]))
            .collect();
        let p = partition(&fc, keys::SSC_NORM, &ClassThresholds::default());
        let positive = values.iter().filter(|&&n| n > 0.0).count();
        assert_eq!(p.low.len() + p.medium.len() + p.high.len(), positive);
        assert_eq!(p.excluded, values.len() - positive);
        assert_eq!((p.low.len(), p.medium.len(), p.high.len()), (2, 2, 3));
        assert!(p.high.iter().all(|f| f.number(keys::SSC_CLASS) == Some(3.0)));
    }
}
