//! Climate zones: the fine-code → coarse-zone range table, per-class
//! reclassification, and the spatial join of a climate polygon layer.

use std::fmt;

use geo::{BoundingRect, Contains, InteriorPoint, MultiPolygon};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SscError};
use crate::feature::{keys, Feature, FeatureCollection, FeatureId};
use crate::par;

// ── Coarse zones ──────────────────────────────────────────────────────────────

/// Six-way simplification of the fine climate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoarseZone {
    BW,
    Cf,
    Cs,
    Cw,
    D,
    A,
}

impl CoarseZone {
    /// Order in which per-zone subsets are merged before painting.
    /// Painting overwrites, so later zones win where features overlap.
    pub const MERGE_ORDER: [CoarseZone; 6] = [Self::Cf, Self::BW, Self::Cs, Self::Cw, Self::D, Self::A];

    /// Numeric code written to `klima_2`.
    pub fn code(self) -> i64 {
        match self {
            Self::BW => 1,
            Self::Cf => 2,
            Self::Cs => 3,
            Self::Cw => 4,
            Self::D => 5,
            Self::A => 6,
        }
    }
}

impl fmt::Display for CoarseZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Range table ───────────────────────────────────────────────────────────────

/// Inclusive range of fine climate codes mapped to one coarse zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRange {
    pub zone: CoarseZone,
    pub min: f64,
    pub max: f64,
}

impl ZoneRange {
    pub fn contains(&self, code: f64) -> bool {
        code >= self.min && code <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClimateRangeTable {
    pub ranges: Vec<ZoneRange>,
}

impl Default for ClimateRangeTable {
    fn default() -> Self {
        let r = |zone, min, max| ZoneRange { zone, min, max };
        Self {
            ranges: vec![
                r(CoarseZone::A, 2.0, 4.0),
                r(CoarseZone::BW, 5.0, 8.0),
                r(CoarseZone::Cf, 9.0, 11.0),
                r(CoarseZone::Cs, 12.0, 14.0),
                r(CoarseZone::Cw, 15.0, 17.0),
                r(CoarseZone::D, 18.0, 29.0),
            ],
        }
    }
}

impl ClimateRangeTable {
    pub fn range(&self, zone: CoarseZone) -> Option<&ZoneRange> {
        self.ranges.iter().find(|r| r.zone == zone)
    }

    /// Ranges must be ordered, non-overlapping, one per zone.
    pub fn validate(&self) -> Result<()> {
        for (i, a) in self.ranges.iter().enumerate() {
            if !(a.min <= a.max) {
                return Err(SscError::InvalidConfig(format!(
                    "climate range for {} is empty: [{}, {}]",
                    a.zone, a.min, a.max
                )));
            }
            for b in &self.ranges[i + 1..] {
                if a.zone == b.zone {
                    return Err(SscError::InvalidConfig(format!("climate zone {} listed twice", a.zone)));
                }
                if a.min <= b.max && b.min <= a.max {
                    return Err(SscError::InvalidConfig(format!(
                        "climate ranges of {} and {} overlap",
                        a.zone, b.zone
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Coarse zone of a fine climate code, per the table alone.
pub fn coarse_zone_for(code: f64, table: &ClimateRangeTable) -> Option<CoarseZone> {
    table.ranges.iter().find(|r| r.contains(code)).map(|r| r.zone)
}

// ── Reclassification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ZoneReclassification {
    /// Features with `klima_2`, merged in [`CoarseZone::MERGE_ORDER`].
    pub collection: FeatureCollection,
    /// Features whose code (or lack of one) matched no branch.
    pub dropped: Vec<FeatureId>,
}

/// Assign `klima_2` to every feature of one SSC class subset.
///
/// Each coarse zone is a branch filtering the subset by its code range; the
/// branches are merged in [`CoarseZone::MERGE_ORDER`]. With
/// `legacy_cw_from_cs` the Cw branch filters by the Cs range, so Cs codes
/// appear twice (as Cs and Cw) and Cw codes are dropped.
pub fn reclassify_zones(
    collection: &FeatureCollection,
    table: &ClimateRangeTable,
    legacy_cw_from_cs: bool,
) -> ZoneReclassification {
    if legacy_cw_from_cs {
        log::warn!("Cw stratum is built from the Cs code range (legacy_cw_from_cs); Cw codes will be dropped");
    }

    let branch_range = |zone: CoarseZone| {
        let source = if legacy_cw_from_cs && zone == CoarseZone::Cw { CoarseZone::Cs } else { zone };
        table.range(source)
    };

    let branches: Vec<FeatureCollection> = CoarseZone::MERGE_ORDER
        .iter()
        .map(|&zone| match branch_range(zone) {
            Some(range) => collection
                .filter(|f| f.number(keys::CLIMATE_ZONE).is_some_and(|code| range.contains(code)))
                .map(|f| f.with_attributes([(keys::COARSE_ZONE, zone.code())])),
            None => FeatureCollection::default(),
        })
        .collect();

    let dropped: Vec<FeatureId> = collection
        .iter()
        .filter(|f| {
            !f.number(keys::CLIMATE_ZONE).is_some_and(|code| {
                CoarseZone::MERGE_ORDER
                    .iter()
                    .filter_map(|&z| branch_range(z))
                    .any(|r| r.contains(code))
            })
        })
        .map(|f| {
            log::debug!("feature {} dropped: climate code {:?} outside every range", f.id(), f.get(keys::CLIMATE_ZONE));
            f.id().clone()
        })
        .collect();

    let merged = FeatureCollection::merge(&branches);
    log::info!(
        "reclassified {} features into {} zone entries ({} dropped)",
        collection.len(),
        merged.len(),
        dropped.len()
    );
    ZoneReclassification { collection: merged, dropped }
}

// ── Climate join ──────────────────────────────────────────────────────────────

struct ZoneEntry {
    code: f64,
    envelope: AABB<[f64; 2]>,
    polygons: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over a climate polygon layer carrying `DN` codes.
pub struct ZoneIndex {
    tree: RTree<ZoneEntry>,
}

impl ZoneIndex {
    /// Index every zone with a polygonal geometry and a numeric `DN`.
    pub fn new(zones: &FeatureCollection) -> Self {
        let entries: Vec<ZoneEntry> = zones
            .iter()
            .filter_map(|z| {
                let code = z.number(keys::ZONE_SOURCE)?;
                let polygons = z.polygons()?;
                let bb = polygons.bounding_rect()?;
                Some(ZoneEntry {
                    code,
                    envelope: AABB::from_corners([bb.min().x, bb.min().y], [bb.max().x, bb.max().y]),
                    polygons,
                })
            })
            .collect();
        if entries.len() < zones.len() {
            log::warn!("{} climate zone(s) without polygon or `DN` code skipped", zones.len() - entries.len());
        }
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Code of the first zone containing `(lon, lat)`.
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<f64> {
        let point = geo::Point::new(lon, lat);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .find(|z| z.polygons.contains(&point))
            .map(|z| z.code)
    }

    /// Zone code of a feature, located by its interior point.
    pub fn zone_of(&self, feature: &Feature) -> Option<f64> {
        let point = feature.polygons()?.interior_point()?;
        self.lookup(point.x(), point.y())
    }
}

/// Copy `DN` of the containing climate zone onto each feature as `klima`.
/// Features outside every zone are returned unchanged.
pub fn join_climate_zones(collection: &FeatureCollection, index: &ZoneIndex) -> FeatureCollection {
    let joined: Vec<Feature> = par::map(collection.features(), |f| match index.zone_of(f) {
        Some(code) => f.with_attributes([(keys::CLIMATE_ZONE, code)]),
        None => f.clone(),
    });
    let unmatched = joined.iter().filter(|f| f.number(keys::CLIMATE_ZONE).is_none()).count();
    if unmatched > 0 {
        log::warn!("{unmatched} of {} features lie outside every climate zone", joined.len());
    }
    FeatureCollection::new(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{AttrValue, Attributes};
    use geo::polygon;

    fn with_code(id: &str, code: f64) -> Feature {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        Feature::new(id, poly, Attributes::from([(keys::CLIMATE_ZONE.to_string(), AttrValue::from(code))]))
    }

    fn zones_of(r: &ZoneReclassification) -> Vec<i64> {
        let mut z: Vec<i64> = r.collection.column(keys::COARSE_ZONE).into_iter().map(|v| v as i64).collect();
        z.sort_unstable();
        z
    }

    #[test]
    fn table_lookup() {
        let t = ClimateRangeTable::default();
        assert_eq!(coarse_zone_for(7.0, &t), Some(CoarseZone::BW));
        assert_eq!(coarse_zone_for(10.0, &t), Some(CoarseZone::Cf));
        assert_eq!(coarse_zone_for(16.0, &t), Some(CoarseZone::Cw));
        assert_eq!(coarse_zone_for(30.0, &t), None);
        assert_eq!(coarse_zone_for(1.0, &t), None);
    }

    #[test]
    fn legacy_cw_branch_duplicates_cs_and_drops_cw() {
        let fc = FeatureCollection::new(vec![with_code("cs", 13.0), with_code("cw", 16.0), with_code("bw", 7.0)]);
        let r = reclassify_zones(&fc, &ClimateRangeTable::default(), true);
        assert_eq!(zones_of(&r), vec![1, 3, 4]);
        assert_eq!(r.dropped, vec![FeatureId::from("cw")]);
    }

    #[test]
    fn corrected_cw_branch_uses_its_own_range() {
        let fc = FeatureCollection::new(vec![with_code("cs", 13.0), with_code("cw", 16.0), with_code("x", 30.0)]);
        let r = reclassify_zones(&fc, &ClimateRangeTable::default(), false);
        assert_eq!(zones_of(&r), vec![3, 4]);
        assert_eq!(r.dropped, vec![FeatureId::from("x")]);
    }

    #[test]
    fn merge_follows_branch_order() {
        let fc = FeatureCollection::new(vec![with_code("a", 3.0), with_code("cf", 10.0)]);
        let r = reclassify_zones(&fc, &ClimateRangeTable::default(), false);
        let order: Vec<f64> = r.collection.column(keys::COARSE_ZONE);
        assert_eq!(order, vec![2.0, 6.0], "Cf must come before A");
    }

    #[test]
    fn features_without_code_are_dropped() {
        let bare = Feature::new("n", geo::Point::new(0.0, 0.0), Attributes::new());
        let r = reclassify_zones(&FeatureCollection::new(vec![bare]), &ClimateRangeTable::default(), false);
        assert!(r.collection.is_empty());
        assert_eq!(r.dropped.len(), 1);
    }

    #[test]
    fn overlapping_ranges_are_invalid() {
        let mut t = ClimateRangeTable::default();
        t.ranges[0].max = 6.0;
        assert!(matches!(t.validate(), Err(SscError::InvalidConfig(_))));
        assert!(ClimateRangeTable::default().validate().is_ok());
    }

    #[test]
    fn join_assigns_containing_zone() {
        let zone = |code: f64, x0: f64| {
            let p = polygon![(x: x0, y: 0.0), (x: x0 + 2.0, y: 0.0), (x: x0 + 2.0, y: 2.0), (x: x0, y: 2.0)];
            Feature::new(format!("z{code}"), p, Attributes::from([(keys::ZONE_SOURCE.to_string(), AttrValue::from(code))]))
        };
        let index = ZoneIndex::new(&FeatureCollection::new(vec![zone(7.0, 0.0), zone(19.0, 2.0)]));
        assert_eq!(index.len(), 2);

        let cell = |id: &str, x0: f64| {
            let p = polygon![(x: x0, y: 0.5), (x: x0 + 0.5, y: 0.5), (x: x0 + 0.5, y: 1.0), (x: x0, y: 1.0)];
            Feature::new(id, p, Attributes::new())
        };
        let fc = FeatureCollection::new(vec![cell("w", 0.5), cell("e", 3.0), cell("out", 9.0)]);
        let joined = join_climate_zones(&fc, &index);
        let code = |i: usize| joined.features()[i].number(keys::CLIMATE_ZONE);
        assert_eq!(code(0), Some(7.0));
        assert_eq!(code(1), Some(19.0));
        assert_eq!(code(2), None);
    }
}
