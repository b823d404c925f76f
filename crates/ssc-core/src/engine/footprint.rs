//! Pixel coverage of a polygonal region.

use geo::{
    Area, BooleanOps, Contains, Coord, Geometry, Intersects, LineString, MultiLineString,
    MultiPolygon, Point, Rect,
};

/// A region prepared for repeated per-pixel queries.
pub(crate) struct Footprint<'a> {
    polygons: &'a MultiPolygon<f64>,
    boundary: Geometry<f64>,
}

impl<'a> Footprint<'a> {
    pub(crate) fn new(polygons: &'a MultiPolygon<f64>) -> Self {
        let rings: Vec<LineString<f64>> = polygons
            .iter()
            .flat_map(|p| std::iter::once(p.exterior().clone()).chain(p.interiors().iter().cloned()))
            .collect();
        Self { polygons, boundary: Geometry::MultiLineString(MultiLineString::new(rings)) }
    }

    pub(crate) fn contains_center(&self, c: Coord<f64>) -> bool {
        self.polygons.contains(&Point::from(c))
    }

    /// Fraction of `cell` covered by the region, in [0, 1].
    ///
    /// Cells the boundary does not touch are all-in or all-out, decided by the
    /// centre; only boundary cells pay for a polygon intersection.
    pub(crate) fn coverage(&self, cell: Rect<f64>) -> f64 {
        let cell_poly = cell.to_polygon();
        if !Geometry::Polygon(cell_poly.clone()).intersects(&self.boundary) {
            return if self.contains_center(cell.center()) { 1.0 } else { 0.0 };
        }
        let cell_area = cell.unsigned_area();
        if cell_area <= 0.0 {
            return 0.0;
        }
        let inside = self.polygons.intersection(&MultiPolygon::new(vec![cell_poly]));
        (inside.unsigned_area() / cell_area).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn cell(x0: f64, y0: f64) -> Rect<f64> {
        Rect::new(geo::coord! { x: x0, y: y0 }, geo::coord! { x: x0 + 1.0, y: y0 + 1.0 })
    }

    #[test]
    fn coverage_of_inside_outside_and_boundary_cells() {
        let region = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)
        ]]);
        let fp = Footprint::new(&region);
        assert_eq!(fp.coverage(cell(1.0, 1.0)), 1.0);
        assert_eq!(fp.coverage(cell(6.0, 6.0)), 0.0);
        let half = fp.coverage(cell(3.5, 1.0));
        assert!((half - 0.5).abs() < 1e-9, "expected half coverage, got {half}");
    }

    #[test]
    fn holes_are_excluded() {
        let region = MultiPolygon::new(vec![polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 5.0), (x: 0.0, y: 5.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 3.0), (x: 2.0, y: 3.0)]],
        )]);
        let fp = Footprint::new(&region);
        assert!(fp.coverage(cell(2.0, 2.0)) < 1e-9);
        assert!(!fp.contains_center(geo::coord! { x: 2.5, y: 2.5 }));
    }
}
