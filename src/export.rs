//! GeoJSON view of the current draw cycle.

use crate::projection::to_lon_lat;
use crate::session::MapSession;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

/// One point feature per drawn group, in WGS84.
pub fn draw_cycle_geojson(session: &mut MapSession) -> FeatureCollection {
    let groups = session.groups();
    let listings = session.features();

    let features = groups
        .iter()
        .map(|group| {
            let p = to_lon_lat(group.coord);
            let ids: Vec<i64> = group.members.iter().map(|&m| listings[m].id()).collect();
            let mut props = JsonObject::new();
            props.insert("count".to_string(), json!(group.len()));
            props.insert("ids".to_string(), json!(ids));
            if let [only] = group.members.as_slice() {
                let f = &listings[*only];
                props.insert("primary".to_string(), json!(f.primary));
                props.insert("title".to_string(), json!(f.listing.title));
                props.insert("category".to_string(), json!(f.listing.category));
                props.insert("price".to_string(), json!(f.listing.price_text()));
            }
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![p.x(), p.y()]))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::types::GeoRecord;

    #[test]
    fn exports_one_point_per_group() {
        let mut session = MapSession::new(MapConfig::default());
        session.resize(800, 600);
        let records: Vec<GeoRecord> = serde_json::from_value(json!([
            { "id": 1, "title": "A", "latitude": 40.0, "longitude": -3.0 },
            { "id": 2, "title": "B", "latitude": 41.0, "longitude": -3.0 }
        ]))
        .unwrap();
        session.set_records(records);

        let fc = draw_cycle_geojson(&mut session);
        assert_eq!(fc.features.len(), 2);
        let first = &fc.features[0];
        assert_eq!(first.property("ids"), Some(&json!([1])));
        assert_eq!(first.property("title"), Some(&json!("A")));
        match &first.geometry.as_ref().unwrap().value {
            Value::Point(coords) => {
                assert!((coords[0] + 3.0).abs() < 1e-9);
                assert!((coords[1] - 40.0).abs() < 1e-9);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }
}
