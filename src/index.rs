use crate::types::Viewport;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point};
use geojson::Feature;
use rstar::{RTree, RTreeObject, AABB};
use std::convert::TryInto;

/// Polygonal geometry of a feature, or None for points, lines and broken geometry.
pub fn to_multipolygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref()?;
    let geo_geom: geo::Geometry<f64> = geometry.value.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        _ => None,
    }
}

pub fn feature_bounds(feature: &Feature) -> Option<Viewport> {
    to_multipolygon(feature)?
        .bounding_rect()
        .map(Viewport::from_rect)
}

/// Combined bounds of every feature that has polygonal geometry.
pub fn collection_bounds<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Option<Viewport> {
    features.into_iter()
        .filter_map(feature_bounds)
        .reduce(|acc, b| acc.union(&b))
}

// Wrapper for RTree indexing
struct Entry {
    index: usize,
    geometry: MultiPolygon<f64>,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for Entry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Point lookup over a layer's polygons; answers "which feature is under this click".
pub struct FeatureIndex {
    tree: RTree<Entry>,
}

impl FeatureIndex {
    pub fn build(features: &[Feature]) -> Self {
        let entries: Vec<Entry> = features.iter().enumerate().filter_map(|(index, feature)| {
            let geometry = to_multipolygon(feature)?;
            let rect = geometry.bounding_rect()?;
            Some(Entry {
                index,
                geometry,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        }).collect();

        Self { tree: RTree::bulk_load(entries) }
    }

    /// Index of the feature containing the point. Overlaps resolve to the last feature,
    /// matching draw order where later polygons sit on top.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);
        self.tree.locate_in_envelope_intersecting(&envelope)
            .filter(|entry| entry.geometry.contains(&point))
            .map(|entry| entry.index)
            .max()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn square(props: serde_json::Value, x0: f64, y0: f64, size: f64) -> Feature {
        let value = json!({
            "type": "Feature",
            "properties": props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]]]
            }
        });
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn bounds_of_single_and_many() {
        let a = square(json!({}), 0.0, 0.0, 2.0);
        let b = square(json!({}), 5.0, -3.0, 1.0);
        let bounds = feature_bounds(&a).unwrap();
        assert_eq!((bounds.west, bounds.south, bounds.east, bounds.north), (0.0, 0.0, 2.0, 2.0));

        let all = collection_bounds([&a, &b]).unwrap();
        assert_eq!((all.west, all.south, all.east, all.north), (0.0, -3.0, 6.0, 2.0));
    }

    #[test]
    fn point_features_are_skipped() {
        let point: Feature = serde_json::from_value(json!({
            "type": "Feature", "properties": {},
            "geometry": { "type": "Point", "coordinates": [1.0, 1.0] }
        })).unwrap();
        assert!(feature_bounds(&point).is_none());
        assert_eq!(FeatureIndex::build(&[point]).len(), 0);
    }

    #[test]
    fn locate_finds_containing_polygon() {
        let features = vec![
            square(json!({ "name": "west" }), 0.0, 0.0, 1.0),
            square(json!({ "name": "east" }), 2.0, 0.0, 1.0),
        ];
        let index = FeatureIndex::build(&features);
        assert_eq!(index.locate(2.5, 0.5), Some(1));
        assert_eq!(index.locate(0.5, 0.5), Some(0));
        assert_eq!(index.locate(1.5, 0.5), None);
    }
}
