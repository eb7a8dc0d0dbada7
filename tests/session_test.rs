use geo::Point;
use housing_map::popup::{PopupContent, PopupTarget, Positioning};
use housing_map::projection::{to_lon_lat, Pixel};
use housing_map::session::VisualKind;
use housing_map::{GeoRecord, LayerMode, MapConfig, MapEvent, MapSession, PointOfInterest};
use serde_json::json;

const BASE_LAT: f64 = 40.4168;
const BASE_LON: f64 = -3.7038;

fn search_result(id: i64, lat: f64, lon: f64) -> GeoRecord {
    serde_json::from_value(json!({
        "id": id,
        "title": format!("Listing {id}"),
        "price": 350 + id,
        "propertyType": "apartment",
        "latitude": lat,
        "longitude": lon,
        "images": ["one.jpg", "two.jpg", "three.jpg"]
    }))
    .unwrap()
}

fn session() -> MapSession {
    let mut s = MapSession::new(MapConfig::default());
    s.resize(800, 600);
    s
}

/// `group` listings packed within a few dozen metres of the map center, followed by 20
/// listings scattered kilometres away so the density tier turns clustering on.
fn clustered_records(group: i64) -> Vec<GeoRecord> {
    let mut records: Vec<GeoRecord> = (0..group)
        .map(|i| search_result(i + 1, BASE_LAT + i as f64 * 0.0001, BASE_LON))
        .collect();
    for i in 0..20 {
        let lat = BASE_LAT + 0.05 * (i / 5 + 1) as f64;
        let lon = BASE_LON + 0.05 * (i % 5) as f64;
        records.push(search_result(100 + i, lat, lon));
    }
    records
}

fn record_at_pixel(s: &MapSession, id: i64, px: Pixel) -> GeoRecord {
    let p = to_lon_lat(s.viewport().coordinate_from_pixel(px));
    search_result(id, p.y(), p.x())
}

fn cluster_pixel(s: &mut MapSession, count: usize) -> Pixel {
    let group = s
        .groups()
        .into_iter()
        .find(|g| g.len() == count)
        .expect("cluster of the expected size");
    s.viewport().pixel_from_coordinate(group.coord)
}

#[test]
fn small_cluster_click_opens_member_list() {
    let mut s = session();
    s.set_records(clustered_records(5));
    assert!(s
        .visuals()
        .iter()
        .any(|v| v.kind == VisualKind::Cluster { count: 5 }));

    let px = cluster_pixel(&mut s, 5);
    s.click(px);
    assert!(s.drain_events().is_empty());
    assert_eq!(
        s.popup_state().unwrap().target,
        PopupTarget::Cluster(vec![1, 2, 3, 4, 5])
    );
    match s.popup_content().unwrap() {
        PopupContent::Cluster { primary, entries, more } => {
            assert_eq!(primary.id, 1);
            assert_eq!(entries.len(), 5);
            assert!(more.is_none());
        }
        other => panic!("unexpected content {other:?}"),
    }

    s.select_cluster_member(3);
    assert_eq!(s.drain_events(), vec![MapEvent::RecordSelected(3)]);
    assert_eq!(s.popup_state().unwrap().target, PopupTarget::Single(3));
}

#[test]
fn large_cluster_click_zooms_to_extent() {
    let mut s = session();
    s.set_records(clustered_records(6));
    let before = s.viewport().zoom;

    let px = cluster_pixel(&mut s, 6);
    s.click(px);
    assert!(s.popup_state().is_none());
    assert!(s.is_animating());

    s.tick(1000.0);
    assert!(!s.is_animating());
    assert!(s.viewport().zoom > before);
}

#[test]
fn focused_view_draws_every_listing() {
    let mut s = session();
    let records: Vec<GeoRecord> = (0..150)
        .map(|i| search_result(i, BASE_LAT + (i % 15) as f64 * 0.0002, BASE_LON + (i / 15) as f64 * 0.0002))
        .collect();
    s.set_records(records);
    assert!(s.groups().len() < 150);

    s.set_point_of_interest(Some(PointOfInterest {
        name: "Faculty of Law".into(),
        latitude: BASE_LAT,
        longitude: BASE_LON,
    }));
    assert_eq!(s.mode(), LayerMode::Unclustered);
    assert_eq!(s.groups().len(), 150);
}

#[test]
fn popup_anchors_above_markers_in_lower_half() {
    let mut s = session();
    let low = record_at_pixel(&s, 1, Pixel::new(400.0, 500.0));
    let high = record_at_pixel(&s, 2, Pixel::new(200.0, 100.0));
    s.set_records(vec![low, high]);

    s.click(Pixel::new(400.0, 500.0));
    let state = s.popup_state().unwrap();
    assert_eq!(state.positioning, Positioning::BottomCenter);
    assert!(state.offset.1 < 0.0);

    s.click(Pixel::new(200.0, 100.0));
    let state = s.popup_state().unwrap();
    assert_eq!(state.positioning, Positioning::TopCenter);
    assert!(state.offset.1 > 0.0);
    assert_eq!(
        s.drain_events(),
        vec![MapEvent::RecordSelected(1), MapEvent::RecordSelected(2)]
    );
}

#[test]
fn popup_near_edge_pans_after_layout_pass() {
    let mut s = session();
    let edge = record_at_pixel(&s, 1, Pixel::new(10.0, 100.0));
    s.set_records(vec![edge]);
    let center_before = s.viewport().center;

    s.click(Pixel::new(10.0, 100.0));
    assert!(s.popup_state().is_some());
    assert!(!s.is_animating());

    s.layout_pass(Some((240.0, 180.0)));
    assert!(s.is_animating());
    s.tick(1000.0);
    assert!(s.viewport().center.x < center_before.x);

    // Nothing left to do on the next pass.
    s.layout_pass(Some((240.0, 180.0)));
    assert!(!s.is_animating());
}

#[test]
fn highlight_zooms_pans_then_opens_and_pulses() {
    let mut config = MapConfig::default();
    config.zoom = 11.0;
    let mut s = MapSession::new(config);
    s.set_records(vec![search_result(42, BASE_LAT + 0.01, BASE_LON + 0.01)]);
    s.set_selected_id(Some(42));
    assert!(!s.is_animating());

    s.resize(800, 600);
    assert!(s.is_animating());
    assert!(s.popup_state().is_none());

    s.tick(250.0);
    assert!(s.popup_state().is_none());
    s.tick(250.0);
    assert_eq!(s.viewport().zoom, 14.0);
    assert_eq!(s.viewport().center, s.features()[0].coord);
    assert_eq!(s.popup_state().unwrap().target, PopupTarget::Single(42));
    assert_eq!(s.pulsing(), Some(42));

    let pulsing_radius = s.visuals()[0].style.radius;
    s.tick(2000.0);
    assert_eq!(s.pulsing(), None);
    let restored = s.visuals()[0].style.radius;
    assert!(restored < pulsing_radius);
    assert_eq!(restored, housing_map::style::PRIMARY_RADIUS);
}

#[test]
fn secondary_markers_are_dimmed_and_unlabelled() {
    let mut s = session();
    s.set_records(vec![
        search_result(1, BASE_LAT, BASE_LON),
        search_result(2, BASE_LAT + 0.01, BASE_LON),
    ]);
    s.set_visible_ids([1]);
    let visuals = s.visuals();
    let label = |id: i64| {
        visuals.iter().find_map(|v| match &v.kind {
            VisualKind::Feature { id: vid, label } if *vid == id => Some(label.clone()),
            _ => None,
        })
    };
    assert_eq!(label(1), Some(Some("€351".to_string())));
    assert_eq!(label(2), Some(None));
}

#[test]
fn replacing_records_is_stable_for_identical_input() {
    let mut s = session();
    let dupes: Vec<GeoRecord> = (0..6).map(|i| search_result(i, BASE_LAT, BASE_LON)).collect();
    s.set_records(dupes.clone());
    let first: Vec<_> = s.features().iter().map(|f| (f.coord.x.to_bits(), f.coord.y.to_bits())).collect();
    s.set_records(dupes);
    let second: Vec<_> = s.features().iter().map(|f| (f.coord.x.to_bits(), f.coord.y.to_bits())).collect();
    assert_eq!(first, second);
    assert!(s.features().iter().all(|f| f.origin == Point::new(BASE_LON, BASE_LAT)));
}

#[test]
fn operations_before_init_and_after_dispose_are_no_ops() {
    let mut s = MapSession::new(MapConfig::default());
    s.set_records(vec![search_result(1, BASE_LAT, BASE_LON)]);
    s.click(Pixel::new(400.0, 300.0));
    s.highlight(1);
    s.layout_pass(Some((100.0, 100.0)));
    assert!(s.popup_state().is_none());
    assert!(s.drain_events().is_empty());

    s.resize(800, 600);
    s.click(Pixel::new(400.0, 300.0));
    assert!(s.popup_state().is_some());
    s.dispose();
    assert!(s.popup_state().is_none());
    s.click(Pixel::new(400.0, 300.0));
    s.tick(100.0);
    assert!(s.popup_state().is_none());
    assert!(s.drain_events().is_empty());
}
