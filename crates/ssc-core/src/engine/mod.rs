//! Geospatial engine seam.
//!
//! The metric and sampling stages only talk to rasters and geometries through
//! [`GeoEngine`]. [`GridEngine`] is the in-memory implementation used by the
//! tools and tests: globally aligned lon/lat sampling grids, nearest-neighbour
//! resampling and spherical pixel areas.

mod components;
mod footprint;
mod grid;
mod memory;
mod trace;

use geo::{MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::feature::FeatureCollection;
use crate::raster::Raster;

pub use grid::SamplingGrid;
pub use memory::GridEngine;

/// Pixel neighbourhood used when grouping pixels into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    /// `(d_col, d_row)` neighbour offsets.
    pub(crate) fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        const EIGHT: [(i64, i64); 8] = [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// Region reducers.
///
/// `Count`, `Min` and `Max` take pixels whose centre lies inside the geometry.
/// `Sum` and `Mean` weight every pixel by the fraction of it the geometry covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl Reducer {
    pub fn is_weighted(self) -> bool {
        matches!(self, Self::Sum | Self::Mean)
    }
}

/// Running state of one reduction.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    reducer: Reducer,
    weight: f64,
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl Accumulator {
    pub(crate) fn new(reducer: Reducer) -> Self {
        Self { reducer, weight: 0.0, sum: 0.0, count: 0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    pub(crate) fn add(&mut self, value: f64, weight: f64) {
        self.weight += weight;
        self.sum += value * weight;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `Count` and `Sum` are defined over an empty region (0);
    /// `Mean`, `Min` and `Max` are not.
    pub(crate) fn finish(&self) -> Option<f64> {
        match self.reducer {
            Reducer::Count => Some(self.count as f64),
            Reducer::Sum => Some(self.sum),
            Reducer::Mean => (self.weight > 0.0).then(|| self.sum / self.weight),
            Reducer::Min => (self.count > 0).then_some(self.min),
            Reducer::Max => (self.count > 0).then_some(self.max),
        }
    }
}

/// Operations the pipeline needs from a geospatial engine.
pub trait GeoEngine: Sync {
    /// Raster restricted to `geometry`: cropped to its bounds, pixels whose
    /// centre lies outside masked.
    fn clip(&self, raster: &Raster, geometry: &MultiPolygon<f64>) -> Raster;

    /// Reduce `raster` over `geometry` at `scale` metres.
    ///
    /// Fails with `ComputationLimitExceeded` when the region needs more than
    /// `pixel_budget` pixels. `Ok(None)` means the reduction is undefined
    /// (e.g. the mean of no pixels).
    fn reduce_region(
        &self,
        raster: &Raster,
        reducer: Reducer,
        geometry: &MultiPolygon<f64>,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<Option<f64>>;

    /// One polygon feature per connected group of equal-valued, unmasked pixels
    /// at `scale`, keeping those that intersect `geometry`.
    fn vectorize(
        &self,
        raster: &Raster,
        geometry: &MultiPolygon<f64>,
        connectivity: Connectivity,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<FeatureCollection>;

    /// Paint each feature's polygons with its numeric `attribute` over `region`
    /// at `scale`. Later features overwrite earlier ones.
    fn rasterize_by_attribute(
        &self,
        collection: &FeatureCollection,
        attribute: &str,
        region: Rect<f64>,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<Raster>;

    /// Up to `n` random pixel-centre points per distinct class value of `raster`.
    /// Points carry `class_attribute`, `longitude` and `latitude`.
    fn stratified_sample(&self, raster: &Raster, class_attribute: &str, n: usize, seed: u64) -> FeatureCollection;

    /// `raster × true pixel area (m²)` resampled at `scale`.
    fn pixel_area(&self, raster: &Raster, scale: f64, pixel_budget: u64) -> Result<Raster>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reductions() {
        assert_eq!(Accumulator::new(Reducer::Count).finish(), Some(0.0));
        assert_eq!(Accumulator::new(Reducer::Sum).finish(), Some(0.0));
        assert_eq!(Accumulator::new(Reducer::Mean).finish(), None);
        assert_eq!(Accumulator::new(Reducer::Max).finish(), None);
    }

    #[test]
    fn weighted_mean_uses_weights() {
        let mut acc = Accumulator::new(Reducer::Mean);
        acc.add(1.0, 1.0);
        acc.add(4.0, 0.5);
        assert!((acc.finish().unwrap() - 2.0).abs() < 1e-12);
    }
}
