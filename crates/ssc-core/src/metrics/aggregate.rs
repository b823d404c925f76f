use serde::Serialize;

use crate::feature::{keys, FeatureCollection};

/// Segment count and size statistics of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentStats {
    /// Number of segments; 0 is a valid value.
    pub count: usize,
    /// Mean segment area in km²; `None` when no segment has a defined area.
    pub mean_area_km2: Option<f64>,
    pub max_area_km2: Option<f64>,
}

/// Reduce per-segment `area_km2` values. Undefined areas are skipped, never
/// counted as zero.
pub fn aggregate_segments(segments: &FeatureCollection) -> SegmentStats {
    let areas: Vec<f64> = segments
        .column(keys::SEGMENT_AREA)
        .into_iter()
        .filter(|a| a.is_finite())
        .collect();
    let mean_area_km2 = (!areas.is_empty()).then(|| areas.iter().sum::<f64>() / areas.len() as f64);
    let max_area_km2 = areas.iter().copied().reduce(f64::max);
    SegmentStats { count: segments.len(), mean_area_km2, max_area_km2 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Attributes, Feature};

    fn seg(id: usize, area: f64) -> Feature {
        Feature::new(id, geo::Point::new(0.0, 0.0), Attributes::new()).with_attributes([(keys::SEGMENT_AREA, area)])
    }

    #[test]
    fn mean_and_max_skip_undefined_areas() {
        let fc = FeatureCollection::new(vec![seg(0, 1.0), seg(1, f64::NAN), seg(2, 3.0)]);
        let s = aggregate_segments(&fc);
        assert_eq!(s.count, 3);
        assert_eq!(s.mean_area_km2, Some(2.0));
        assert_eq!(s.max_area_km2, Some(3.0));
    }

    #[test]
    fn no_segments_is_a_valid_zero_count() {
        let s = aggregate_segments(&FeatureCollection::default());
        assert_eq!(s, SegmentStats { count: 0, mean_area_km2: None, max_area_km2: None });
    }
}
