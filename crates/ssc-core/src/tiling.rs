//! Regular lon/lat cell grids over input polygons.

use geo::{BoundingRect, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{FailureSummary, Result, SscError};
use crate::feature::{Attributes, Feature, FeatureCollection};

/// Cell tolerance when deciding whether a bbox edge needs another cell.
const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Cell width in degrees of longitude.
    pub dx: f64,
    /// Cell height in degrees of latitude.
    pub dy: f64,
    /// `(source attribute, cell attribute)` pairs copied onto every cell.
    pub renames: Vec<(String, String)>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        let renames = [
            ("date", "date"),
            ("Koeppen-Ge", "klima"),
            ("OBJECTID", "objectID"),
            ("TARGET_FID", "featureID"),
            ("noSegments", "noSegments"),
            ("urban_area", "urban_area"),
            ("seg_pr_km2", "seg_pr_km2"),
            ("ratio_UaS", "ratio_UrbSeg"),
            ("UNSD_M49_1", "world_region"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        Self { dx: 0.03, dy: 0.03, renames }
    }
}

impl TilingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.dx.is_finite() && self.dx > 0.0 && self.dy.is_finite() && self.dy > 0.0) {
            return Err(SscError::InvalidConfig(format!(
                "tile size must be positive, got {} × {}",
                self.dx, self.dy
            )));
        }
        Ok(())
    }
}

/// Cells of `dx × dy` from the bbox minimum corner, covering `bbox`.
pub fn grid_cells(bbox: Rect<f64>, dx: f64, dy: f64) -> Vec<Rect<f64>> {
    let count = |extent: f64, step: f64| ((extent / step - EDGE_TOLERANCE).ceil() as usize).max(1);
    let nx = count(bbox.width(), dx);
    let ny = count(bbox.height(), dy);
    let (x0, y0) = (bbox.min().x, bbox.min().y);

    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let (x, y) = (x0 + i as f64 * dx, y0 + j as f64 * dy);
            cells.push(Rect::new(geo::coord! { x: x, y: y }, geo::coord! { x: x + dx, y: y + dy }));
        }
    }
    cells
}

/// Grid every polygonal feature and copy the configured attributes.
/// Features without polygons are reported and skipped.
pub fn tile_features(collection: &FeatureCollection, config: &TilingConfig) -> (FeatureCollection, FailureSummary) {
    let mut failures = FailureSummary::default();
    let mut cells = Vec::new();

    for feature in collection {
        let Some(bbox) = feature.polygons().and_then(|p| p.bounding_rect()) else {
            failures.push(feature.id().clone(), SscError::UnsupportedGeometry { feature: feature.id().clone() });
            continue;
        };
        let attributes: Attributes = config
            .renames
            .iter()
            .filter_map(|(from, to)| feature.get(from).map(|v| (to.clone(), v.clone())))
            .collect();
        for (i, rect) in grid_cells(bbox, config.dx, config.dy).into_iter().enumerate() {
            cells.push(Feature::new(format!("{}_{i}", feature.id()), rect.to_polygon(), attributes.clone()));
        }
    }

    log::info!("tiled {} features into {} cells", collection.len() - failures.len(), cells.len());
    failures.log("tiling");
    (FeatureCollection::new(cells), failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::AttrValue;
    use geo::polygon;

    #[test]
    fn wide_feature_yields_two_cells_with_renamed_attributes() {
        let poly = polygon![(x: 10.0, y: 50.0), (x: 10.06, y: 50.0), (x: 10.06, y: 50.03), (x: 10.0, y: 50.03)];
        let f = Feature::new("7", poly, Attributes::new()).with_attributes([
            ("Koeppen-Ge", AttrValue::from(14.0)),
            ("ratio_UaS", AttrValue::from(0.4)),
            ("unrelated", AttrValue::from("x")),
        ]);
        let (cells, failures) = tile_features(&FeatureCollection::new(vec![f]), &TilingConfig::default());

        assert!(failures.is_empty());
        assert_eq!(cells.len(), 2);
        for c in &cells {
            assert_eq!(c.number("klima"), Some(14.0));
            assert_eq!(c.number("ratio_UrbSeg"), Some(0.4));
            assert!(c.get("unrelated").is_none());
            assert!(c.get("date").is_none(), "missing source attributes are skipped");
        }
        assert_eq!(cells.features()[1].id().as_str(), "7_1");
    }

    #[test]
    fn partial_cells_cover_the_bbox() {
        let bbox = Rect::new(geo::coord! { x: 0.0, y: 0.0 }, geo::coord! { x: 0.07, y: 0.01 });
        let cells = grid_cells(bbox, 0.03, 0.03);
        assert_eq!(cells.len(), 3);
        assert!(cells[2].max().x >= 0.07);
    }

    #[test]
    fn points_are_reported_not_tiled() {
        let p = Feature::new("p", geo::Point::new(0.0, 0.0), Attributes::new());
        let (cells, failures) = tile_features(&FeatureCollection::new(vec![p]), &TilingConfig::default());
        assert!(cells.is_empty());
        assert_eq!(failures.count_kind("unsupported_geometry"), 1);
    }
}
