//! Immutable feature / feature-collection value model.
//!
//! A [`Feature`] never changes after construction: attribute updates return a
//! new feature. Collections are transformed by `map` / `filter` / `merge` into
//! new collections.

use std::collections::BTreeMap;
use std::fmt;

use geo::{BoundingRect, Geometry, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// Attribute names of the export schema.
pub mod keys {
    pub const FEATURE_AREA: &str = "gee_ftr_area_km2";
    pub const URBAN_PIXELS: &str = "gee_urbPxl";
    pub const SUM_AREA: &str = "gee_sumArea";
    pub const SEGMENT_COUNT: &str = "gee_noSeg";
    pub const MEAN_AREA: &str = "gee_meanArea";
    pub const MAX_AREA: &str = "gee_maxArea";
    pub const SSC_INDEX: &str = "gee_ssc_index";
    pub const SSC_NORM: &str = "gee_ssc_norm";
    pub const SSC_CLASS: &str = "gee_ssc_class";
    pub const CLIMATE_ZONE: &str = "klima";
    pub const COARSE_ZONE: &str = "klima_2";
    pub const LONGITUDE: &str = "longitude";
    pub const LATITUDE: &str = "latitude";
    /// Per-segment area (km²).
    pub const SEGMENT_AREA: &str = "area_km2";
    /// Pixel value a segment was traced from.
    pub const SEGMENT_LABEL: &str = "label";
    /// Pixel count of a segment at the vectorization scale.
    pub const SEGMENT_PIXELS: &str = "count";
    /// Climate code on the climate-zone polygon layer.
    pub const ZONE_SOURCE: &str = "DN";
    /// Raster value joined by `raster_join`.
    pub const RASTER_VALUE: &str = "wsf_in";
}

// ── Identity ──────────────────────────────────────────────────────────────────

/// Opaque feature identity. Positional on ingestion, re-keyed on merge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity of this feature inside the `source`-th input of a merge.
    fn merged(&self, source: usize) -> Self {
        Self(format!("{source}_{}", self.0))
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<usize> for FeatureId {
    fn from(i: usize) -> Self {
        Self(i.to_string())
    }
}

// ── Attributes ────────────────────────────────────────────────────────────────

/// Attribute value: numeric or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

// ── Feature ───────────────────────────────────────────────────────────────────

/// A geometry plus named attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: FeatureId,
    geometry: Geometry<f64>,
    attributes: Attributes,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        Self { id: id.into(), geometry: geometry.into(), attributes }
    }

    pub fn id(&self) -> &FeatureId {
        &self.id
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Numeric attribute; `None` when absent, textual, or NaN.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttrValue::as_f64).filter(|v| !v.is_nan())
    }

    /// New feature with the union of the current attributes and `updates`;
    /// keys in `updates` win.
    pub fn with_attributes<I, K, V>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let mut attributes = self.attributes.clone();
        for (k, v) in updates {
            attributes.insert(k.into(), v.into());
        }
        Self { id: self.id.clone(), geometry: self.geometry.clone(), attributes }
    }

    /// Polygonal view of the geometry, if it has one.
    pub fn polygons(&self) -> Option<MultiPolygon<f64>> {
        match &self.geometry {
            Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => Some(mp.clone()),
            Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
            Geometry::GeometryCollection(gc) => {
                let polys: Vec<_> = gc
                    .iter()
                    .filter_map(|g| match g {
                        Geometry::Polygon(p) => Some(vec![p.clone()]),
                        Geometry::MultiPolygon(mp) => Some(mp.0.clone()),
                        Geometry::Rect(r) => Some(vec![r.to_polygon()]),
                        _ => None,
                    })
                    .flatten()
                    .collect();
                (!polys.is_empty()).then(|| MultiPolygon::new(polys))
            }
            _ => None,
        }
    }
}

// ── FeatureCollection ─────────────────────────────────────────────────────────

/// An ordered-irrelevant set of features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn map<F: FnMut(&Feature) -> Feature>(&self, f: F) -> Self {
        Self { features: self.features.iter().map(f).collect() }
    }

    pub fn filter<P: FnMut(&Feature) -> bool>(&self, mut pred: P) -> Self {
        Self { features: self.features.iter().filter(|f| pred(f)).cloned().collect() }
    }

    /// Concatenate collections. Identities are prefixed with the input position
    /// so that a feature present in two inputs stays distinct.
    pub fn merge<'a, I>(collections: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureCollection>,
    {
        let features = collections
            .into_iter()
            .enumerate()
            .flat_map(|(source, fc)| {
                fc.features.iter().map(move |f| Feature {
                    id: f.id.merged(source + 1),
                    geometry: f.geometry.clone(),
                    attributes: f.attributes.clone(),
                })
            })
            .collect();
        Self { features }
    }

    /// Defined numeric values of `key` across the collection.
    pub fn column(&self, key: &str) -> Vec<f64> {
        self.features.iter().filter_map(|f| f.number(key)).collect()
    }

    /// Bounding rectangle of all geometries.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self { features: iter.into_iter().collect() }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};
    use std::collections::HashSet;

    fn square(id: &str) -> Feature {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        Feature::new(id, poly, Attributes::new())
    }

    #[test]
    fn with_attributes_returns_new_feature_and_keeps_original() {
        let f = square("a").with_attributes([("x", 1.0)]);
        let g = f.with_attributes([("x", AttrValue::from(2.0)), ("name", AttrValue::from("cell"))]);

        assert_eq!(f.number("x"), Some(1.0));
        assert!(f.get("name").is_none());
        assert_eq!(g.number("x"), Some(2.0));
        assert_eq!(g.get("name"), Some(&AttrValue::Text("cell".into())));
        assert_eq!(g.id(), f.id());
    }

    #[test]
    fn merge_keeps_identities_unique() {
        let a = FeatureCollection::new(vec![square("0"), square("1")]);
        let merged = FeatureCollection::merge([&a, &a]);
        let ids: HashSet<_> = merged.iter().map(|f| f.id().clone()).collect();
        assert_eq!(merged.len(), 4);
        assert_eq!(ids.len(), 4, "merge produced duplicate identities");
    }

    #[test]
    fn number_ignores_text_and_nan() {
        let f = square("a").with_attributes([
            ("t", AttrValue::from("7")),
            ("n", AttrValue::from(f64::NAN)),
        ]);
        assert!(f.number("t").is_none());
        assert!(f.number("n").is_none());
        assert!(f.number("missing").is_none());
    }

    #[test]
    fn points_have_no_polygonal_view() {
        let f = Feature::new("p", Point::new(1.0, 2.0), Attributes::new());
        assert!(f.polygons().is_none());
        assert_eq!(square("s").polygons().map(|mp| mp.0.len()), Some(1));
    }

    #[test]
    fn bounding_rect_spans_all_features() {
        let far = Feature::new(
            "far",
            polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 7.0)],
            Attributes::new(),
        );
        let fc = FeatureCollection::new(vec![square("a"), far]);
        let r = fc.bounding_rect().unwrap();
        assert_eq!((r.min().x, r.min().y, r.max().x, r.max().y), (0.0, 0.0, 6.0, 7.0));
    }
}
