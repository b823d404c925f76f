use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, Geometry, Intersects, MultiPolygon, Point, Rect};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::components::label_components;
use super::footprint::Footprint;
use super::trace::trace_component;
use super::{Accumulator, Connectivity, GeoEngine, Reducer, SamplingGrid};
use crate::error::{Result, SscError};
use crate::feature::{keys, AttrValue, Attributes, Feature, FeatureCollection};
use crate::raster::Raster;

/// In-memory [`GeoEngine`] over [`Raster`]s. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridEngine;

impl GridEngine {
    fn checked_grid(rect: Rect<f64>, scale: f64, pixel_budget: u64) -> Result<SamplingGrid> {
        let grid = SamplingGrid::covering(rect, scale);
        let pixels = grid.pixel_count();
        if pixels > pixel_budget {
            return Err(SscError::ComputationLimitExceeded { pixels, budget: pixel_budget });
        }
        Ok(grid)
    }
}

/// Finite source value at a sampling-cell centre.
fn sample(raster: &Raster, grid: &SamplingGrid, row: usize, col: usize) -> Option<f32> {
    let c = grid.cell_center(row, col);
    raster.sample_nearest(c.x, c.y).filter(|v| v.is_finite())
}

impl GeoEngine for GridEngine {
    fn clip(&self, raster: &Raster, geometry: &MultiPolygon<f64>) -> Raster {
        let window = geometry.bounding_rect().and_then(|rect| raster.crop(rect));
        let Some(mut out) = window else {
            return Raster::masked(0, 0, raster.min_lon, raster.min_lon, raster.min_lat, raster.min_lat);
        };
        for row in 0..out.height {
            for col in 0..out.width {
                let c = out.pixel_center(row, col);
                if !geometry.contains(&Point::new(c.lon, c.lat)) {
                    out.set(row, col, f32::NAN);
                }
            }
        }
        out
    }

    fn reduce_region(
        &self,
        raster: &Raster,
        reducer: Reducer,
        geometry: &MultiPolygon<f64>,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<Option<f64>> {
        let mut acc = Accumulator::new(reducer);
        let Some(rect) = geometry.bounding_rect() else {
            return Ok(acc.finish());
        };
        let grid = Self::checked_grid(rect, scale, pixel_budget)?;
        let footprint = Footprint::new(geometry);

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let Some(v) = sample(raster, &grid, row, col) else { continue };
                if reducer.is_weighted() {
                    let w = footprint.coverage(grid.cell_rect(row, col));
                    if w > 0.0 {
                        acc.add(v as f64, w);
                    }
                } else if footprint.contains_center(grid.cell_center(row, col)) {
                    acc.add(v as f64, 1.0);
                }
            }
        }
        Ok(acc.finish())
    }

    fn vectorize(
        &self,
        raster: &Raster,
        geometry: &MultiPolygon<f64>,
        connectivity: Connectivity,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<FeatureCollection> {
        let Some(rect) = geometry.bounding_rect() else {
            return Ok(FeatureCollection::default());
        };
        let grid = Self::checked_grid(rect, scale, pixel_budget)?;

        let mut values = Vec::with_capacity(grid.cols * grid.rows);
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                values.push(sample(raster, &grid, row, col));
            }
        }
        let labelling = label_components(&values, grid.cols, grid.rows, connectivity);
        let bounds = Geometry::MultiPolygon(geometry.clone());

        let segments = labelling
            .components
            .iter()
            .enumerate()
            .filter_map(|(id, component)| {
                let shape = Geometry::MultiPolygon(trace_component(&labelling, id, |x, y| grid.vertex(x, y)));
                if !shape.intersects(&bounds) {
                    return None;
                }
                let attributes = Attributes::from([
                    (keys::SEGMENT_LABEL.to_string(), AttrValue::from(component.value as f64)),
                    (keys::SEGMENT_PIXELS.to_string(), AttrValue::from(component.cells.len())),
                ]);
                Some(Feature::new(id, shape, attributes))
            })
            .collect::<FeatureCollection>();

        log::debug!(
            "vectorized {} components into {} segments on a {}x{} grid",
            labelling.components.len(),
            segments.len(),
            grid.cols,
            grid.rows
        );
        Ok(segments)
    }

    fn rasterize_by_attribute(
        &self,
        collection: &FeatureCollection,
        attribute: &str,
        region: Rect<f64>,
        scale: f64,
        pixel_budget: u64,
    ) -> Result<Raster> {
        let grid = Self::checked_grid(region, scale, pixel_budget)?;
        let mut data = vec![f32::NAN; grid.cols * grid.rows];

        for feature in collection {
            let (Some(value), Some(polygons)) = (feature.number(attribute), feature.polygons()) else {
                continue;
            };
            let Some((rows, cols)) = polygons.bounding_rect().and_then(|bb| grid.index_range(bb)) else {
                continue;
            };
            for row in rows {
                for col in cols.clone() {
                    if polygons.contains(&Point::from(grid.cell_center(row, col))) {
                        data[row * grid.cols + col] = value as f32;
                    }
                }
            }
        }
        Ok(grid.to_raster(data))
    }

    fn stratified_sample(&self, raster: &Raster, class_attribute: &str, n: usize, seed: u64) -> FeatureCollection {
        let mut strata: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, v) in raster.data.iter().enumerate() {
            if v.is_finite() {
                strata.entry(v.round() as i64).or_default().push(idx);
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::new();
        for (class, pixels) in &strata {
            let amount = n.min(pixels.len());
            for (i, pick) in rand::seq::index::sample(&mut rng, pixels.len(), amount).into_iter().enumerate() {
                let idx = pixels[pick];
                let at = raster.pixel_center(idx / raster.width, idx % raster.width);
                let attributes = Attributes::from([
                    (class_attribute.to_string(), AttrValue::from(*class)),
                    (keys::LONGITUDE.to_string(), AttrValue::from(at.lon)),
                    (keys::LATITUDE.to_string(), AttrValue::from(at.lat)),
                ]);
                points.push(Feature::new(format!("{class}_{i}"), Point::new(at.lon, at.lat), attributes));
            }
        }
        FeatureCollection::new(points)
    }

    fn pixel_area(&self, raster: &Raster, scale: f64, pixel_budget: u64) -> Result<Raster> {
        let grid = Self::checked_grid(raster.bounds(), scale, pixel_budget)?;
        let mut data = Vec::with_capacity(grid.cols * grid.rows);
        for row in 0..grid.rows {
            let area = grid.cell_area_m2(row);
            for col in 0..grid.cols {
                data.push(sample(raster, &grid, row, col).map_or(f32::NAN, |v| (v as f64 * area) as f32));
            }
        }
        Ok(grid.to_raster(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::step_for_scale;
    use approx::assert_relative_eq;
    use geo::polygon;

    /// Square of `cells × cells` sampling cells at `scale`, SW corner at the origin.
    fn square(cells: f64, scale: f64) -> MultiPolygon<f64> {
        let s = cells * step_for_scale(scale);
        MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: s, y: 0.0), (x: s, y: s), (x: 0.0, y: s)]])
    }

    fn filled(rect: Rect<f64>, scale: f64, value: f32) -> Raster {
        let grid = SamplingGrid::covering(rect, scale);
        grid.to_raster(vec![value; grid.cols * grid.rows])
    }

    fn bbox(mp: &MultiPolygon<f64>) -> Rect<f64> {
        mp.bounding_rect().unwrap()
    }

    #[test]
    fn count_and_sum_over_aligned_square() {
        let region = square(10.0, 100.0);
        let mask = filled(bbox(&square(12.0, 100.0)), 100.0, 1.0);
        let engine = GridEngine;
        let count = engine.reduce_region(&mask, Reducer::Count, &region, 100.0, u64::MAX).unwrap();
        assert_eq!(count, Some(100.0));
        let sum = engine.reduce_region(&mask, Reducer::Sum, &region, 100.0, u64::MAX).unwrap().unwrap();
        assert_relative_eq!(sum, 100.0, max_relative = 1e-9);
    }

    #[test]
    fn partial_pixels_are_area_weighted() {
        // 2.5 × 1 cells: count sees 2 centres, sum sees 2.5 pixels.
        let st = step_for_scale(100.0);
        let region = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 2.5 * st, y: 0.0), (x: 2.5 * st, y: st), (x: 0.0, y: st)
        ]]);
        let mask = filled(bbox(&square(4.0, 100.0)), 100.0, 1.0);
        let engine = GridEngine;
        assert_eq!(engine.reduce_region(&mask, Reducer::Count, &region, 100.0, u64::MAX).unwrap(), Some(2.0));
        let sum = engine.reduce_region(&mask, Reducer::Sum, &region, 100.0, u64::MAX).unwrap().unwrap();
        assert_relative_eq!(sum, 2.5, max_relative = 1e-6);
    }

    #[test]
    fn budget_is_enforced_before_reduction() {
        let region = square(10.0, 100.0);
        let mask = filled(bbox(&region), 100.0, 1.0);
        let err = GridEngine.reduce_region(&mask, Reducer::Count, &region, 100.0, 50).unwrap_err();
        assert!(matches!(err, SscError::ComputationLimitExceeded { budget: 50, .. }), "{err:?}");
    }

    #[test]
    fn mean_of_masked_region_is_undefined() {
        let region = square(3.0, 100.0);
        let mask = filled(bbox(&region), 100.0, f32::NAN);
        let engine = GridEngine;
        assert_eq!(engine.reduce_region(&mask, Reducer::Mean, &region, 100.0, u64::MAX).unwrap(), None);
        assert_eq!(engine.reduce_region(&mask, Reducer::Sum, &region, 100.0, u64::MAX).unwrap(), Some(0.0));
    }

    #[test]
    fn pixel_area_near_equator_is_nominal() {
        let mask = filled(bbox(&square(2.0, 100.0)), 100.0, 1.0);
        let area = GridEngine.pixel_area(&mask, 100.0, u64::MAX).unwrap();
        // authalic sphere vs. equatorial degree length: ~0.2 % below 100 m × 100 m
        assert_relative_eq!(area.get(0, 0) as f64, 10_000.0, max_relative = 5e-3);
    }

    #[test]
    fn clip_masks_pixels_outside_geometry() {
        let mask = filled(bbox(&square(4.0, 100.0)), 100.0, 1.0);
        let tri_side = 4.0 * step_for_scale(100.0);
        let tri = MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: tri_side, y: 0.0), (x: 0.0, y: tri_side)]]);
        let clipped = GridEngine.clip(&mask, &tri);
        assert!(clipped.valid_count() < mask.valid_count());
        assert!(clipped.valid_count() > 0);
    }

    #[test]
    fn vectorize_counts_segments_by_connectivity() {
        let region = square(4.0, 100.0);
        let mut mask = filled(bbox(&region), 100.0, f32::NAN);
        mask.set(0, 0, 1.0);
        mask.set(1, 1, 1.0);
        mask.set(3, 3, 1.0);
        let engine = GridEngine;
        let four = engine.vectorize(&mask, &region, Connectivity::Four, 100.0, u64::MAX).unwrap();
        let eight = engine.vectorize(&mask, &region, Connectivity::Eight, 100.0, u64::MAX).unwrap();
        assert_eq!(four.len(), 3);
        assert_eq!(eight.len(), 2);
        assert!(four.iter().all(|s| s.number(keys::SEGMENT_PIXELS) == Some(1.0)));
    }

    #[test]
    fn vectorize_respects_its_own_budget() {
        let region = square(10.0, 100.0);
        let mask = filled(bbox(&region), 100.0, 1.0);
        let err = GridEngine.vectorize(&mask, &region, Connectivity::Four, 100.0, 10).unwrap_err();
        assert_eq!(err.kind(), "computation_limit_exceeded");
    }

    #[test]
    fn later_features_overwrite_earlier_when_painting() {
        let big = Feature::new("a", square(4.0, 100.0), Attributes::new()).with_attributes([("z", 1.0)]);
        let small = Feature::new("b", square(2.0, 100.0), Attributes::new()).with_attributes([("z", 2.0)]);
        let fc = FeatureCollection::new(vec![big, small]);
        let painted = GridEngine.rasterize_by_attribute(&fc, "z", bbox(&square(4.0, 100.0)), 100.0, u64::MAX).unwrap();
        assert_eq!(painted.get(0, 0), 2.0);
        assert_eq!(painted.get(3, 3), 1.0);
    }

    #[test]
    fn painting_and_pixel_area_check_the_budget_first() {
        let fc = FeatureCollection::new(vec![
            Feature::new("a", square(4.0, 100.0), Attributes::new()).with_attributes([("z", 1.0)]),
        ]);
        // 40° × 35° at 100 m would be ~1.7e9 cells.
        let continent = Rect::new(geo::coord! { x: -10.0, y: 35.0 }, geo::coord! { x: 30.0, y: 70.0 });
        let err = GridEngine.rasterize_by_attribute(&fc, "z", continent, 100.0, 100_000_000).unwrap_err();
        assert!(matches!(err, SscError::ComputationLimitExceeded { budget: 100_000_000, .. }), "{err:?}");

        let mask = filled(bbox(&square(10.0, 100.0)), 100.0, 1.0);
        let err = GridEngine.pixel_area(&mask, 100.0, 50).unwrap_err();
        assert_eq!(err.kind(), "computation_limit_exceeded");
    }

    #[test]
    fn stratified_sample_draws_at_most_n_per_class() {
        let mut r = filled(bbox(&square(4.0, 100.0)), 100.0, 1.0);
        for col in 0..r.width {
            r.set(0, col, 2.0);
        }
        r.set(3, 3, 3.0);
        let pts = GridEngine.stratified_sample(&r, "klima_2", 2, 7);
        let per_class = |c: f64| pts.iter().filter(|p| p.number("klima_2") == Some(c)).count();
        assert_eq!(per_class(1.0), 2);
        assert_eq!(per_class(2.0), 2);
        assert_eq!(per_class(3.0), 1);
        for p in &pts {
            let (lon, lat) = (p.number(keys::LONGITUDE).unwrap(), p.number(keys::LATITUDE).unwrap());
            assert_eq!(r.sample_nearest(lon, lat).map(|v| v as f64), p.number("klima_2"));
        }
    }

    #[test]
    fn sampling_is_reproducible_for_a_seed() {
        let r = filled(bbox(&square(6.0, 100.0)), 100.0, 1.0);
        let a = GridEngine.stratified_sample(&r, "c", 3, 42);
        let b = GridEngine.stratified_sample(&r, "c", 3, 42);
        assert_eq!(a, b);
    }
}
