use serde::Serialize;

use crate::error::{IndexFactor, Result, SscError};
use crate::feature::{keys, AttrValue};

/// All inputs of the SSC formula for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub urban_pixels: f64,
    /// Σ(mask × pixel area) over the feature, km².
    pub sum_area_km2: f64,
    pub feature_area_km2: f64,
    pub segment_count: usize,
    pub mean_segment_area_km2: Option<f64>,
    pub max_segment_area_km2: Option<f64>,
}

impl MetricsRecord {
    /// Export attributes; undefined statistics are written as NaN (`null`).
    pub fn attributes(&self) -> [(&'static str, AttrValue); 6] {
        [
            (keys::FEATURE_AREA, self.feature_area_km2.into()),
            (keys::URBAN_PIXELS, self.urban_pixels.into()),
            (keys::SUM_AREA, self.sum_area_km2.into()),
            (keys::SEGMENT_COUNT, self.segment_count.into()),
            (keys::MEAN_AREA, self.mean_segment_area_km2.unwrap_or(f64::NAN).into()),
            (keys::MAX_AREA, self.max_segment_area_km2.unwrap_or(f64::NAN).into()),
        ]
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>, factor: IndexFactor) -> Result<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 && n.is_finite() && d.is_finite() => Ok(n / d),
        _ => Err(SscError::SscIndexUndefined { factor }),
    }
}

/// ```text
/// ssc = (urban pixels / segment count)
///     × (summed area / feature area)
///     × (max segment area / mean segment area)
/// ```
pub fn compute_ssc_index(record: &MetricsRecord) -> Result<f64> {
    let factors = [
        (
            IndexFactor::PixelsPerSegment,
            ratio(Some(record.urban_pixels), Some(record.segment_count as f64), IndexFactor::PixelsPerSegment)?,
        ),
        (
            IndexFactor::UrbanShare,
            ratio(Some(record.sum_area_km2), Some(record.feature_area_km2), IndexFactor::UrbanShare)?,
        ),
        (
            IndexFactor::SizeDispersion,
            ratio(record.max_segment_area_km2, record.mean_segment_area_km2, IndexFactor::SizeDispersion)?,
        ),
    ];
    let ssc: f64 = factors.iter().map(|(_, v)| v).product();
    if !ssc.is_finite() {
        let (factor, _) = factors
            .iter()
            .copied()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .unwrap_or((IndexFactor::SizeDispersion, f64::NAN));
        return Err(SscError::SscIndexUndefined { factor });
    }
    Ok(ssc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetricsRecord {
        MetricsRecord {
            urban_pixels: 100.0,
            sum_area_km2: 1.0,
            feature_area_km2: 1.0,
            segment_count: 1,
            mean_segment_area_km2: Some(1.0),
            max_segment_area_km2: Some(1.0),
        }
    }

    #[test]
    fn single_segment_covering_feature() {
        assert_eq!(compute_ssc_index(&record()).unwrap(), 100.0);
    }

    #[test]
    fn fragmentation_and_dispersion_scale_the_index() {
        let r = MetricsRecord {
            urban_pixels: 120.0,
            sum_area_km2: 0.5,
            feature_area_km2: 2.0,
            segment_count: 4,
            mean_segment_area_km2: Some(0.125),
            max_segment_area_km2: Some(0.25),
        };
        // 30 × 0.25 × 2
        assert!((compute_ssc_index(&r).unwrap() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn zero_segments_is_undefined_not_a_crash() {
        let r = MetricsRecord { segment_count: 0, mean_segment_area_km2: None, max_segment_area_km2: None, ..record() };
        assert_eq!(
            compute_ssc_index(&r),
            Err(SscError::SscIndexUndefined { factor: IndexFactor::PixelsPerSegment })
        );
    }

    #[test]
    fn zero_feature_area_names_urban_share() {
        let r = MetricsRecord { feature_area_km2: 0.0, ..record() };
        assert_eq!(compute_ssc_index(&r), Err(SscError::SscIndexUndefined { factor: IndexFactor::UrbanShare }));
    }

    #[test]
    fn missing_mean_area_names_size_dispersion() {
        let r = MetricsRecord { mean_segment_area_km2: None, ..record() };
        assert_eq!(
            compute_ssc_index(&r),
            Err(SscError::SscIndexUndefined { factor: IndexFactor::SizeDispersion })
        );
    }

    #[test]
    fn undefined_stats_export_as_nan() {
        let r = MetricsRecord { mean_segment_area_km2: None, ..record() };
        let attrs = r.attributes();
        let mean = attrs.iter().find(|(k, _)| *k == keys::MEAN_AREA).and_then(|(_, v)| v.as_f64()).unwrap();
        assert!(mean.is_nan());
    }
}
