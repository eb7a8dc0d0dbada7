//! Map session: owns the viewport, the derived feature layers and the popup, and wires
//! host input (records, clicks, resizes, frame ticks) through the other components.

use crate::cluster::{cluster_distance, hit_test, ClusterIndex};
use crate::config::MapConfig;
use crate::popup::{
    autopan_delta, cluster_content, panned_center, ListingDetail, PopupContent, PopupController,
    PopupState, PopupTarget,
};
use crate::processing::{colocated_count, place_listings};
use crate::projection::{from_lon_lat, Pixel, Viewport};
use crate::resolve::resolve_all;
use crate::schedule::{Countdown, LayoutQueue, Pulse, PulseFrame, ViewAnimation};
use crate::style::{cluster_radius, Style, StyleCache, PRIMARY_RADIUS, SECONDARY_RADIUS};
use crate::types::{ClusterGroup, GeoRecord, MapEvent, PlacedFeature, PointOfInterest};
use geo::{Coord, Point, Rect};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Below this zoom, highlighting a listing zooms in to it.
pub const HIGHLIGHT_ZOOM: f64 = 14.0;
/// Clusters up to this size open a popup; larger ones zoom to their extent.
pub const CLUSTER_POPUP_MAX: usize = 5;

/// Feature layer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMode {
    Clustered,
    /// Every listing drawn on its own, used while a point of interest is focused.
    Unclustered,
}

#[derive(Debug, Clone, PartialEq)]
enum Lifecycle {
    /// Waiting for the container to get a size.
    Pending(Countdown),
    Ready,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutTask {
    AutoPan,
}

/// Follow-up once a view animation lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterPan {
    OpenAndPulse(i64),
}

#[derive(Debug)]
struct DrawCycle {
    generation: u64,
    zoom_bits: u64,
    mode: LayerMode,
    groups: Vec<ClusterGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualKind {
    Feature { id: i64, label: Option<String> },
    Cluster { count: usize },
    PointOfInterest { name: String },
}

/// One thing to draw in the current frame.
#[derive(Debug, Clone)]
pub struct Visual {
    pub coord: Coord<f64>,
    pub pixel: Pixel,
    pub style: Rc<Style>,
    pub kind: VisualKind,
}

pub struct MapSession {
    config: MapConfig,
    lifecycle: Lifecycle,
    viewport: Viewport,
    records: Vec<GeoRecord>,
    visible_ids: HashSet<i64>,
    selected_id: Option<i64>,
    poi: Option<(PointOfInterest, Coord<f64>)>,
    features: Vec<PlacedFeature>,
    index: ClusterIndex,
    invalid: usize,
    generation: u64,
    draw: Option<DrawCycle>,
    styles: StyleCache,
    popup: PopupController,
    layout: LayoutQueue<LayoutTask>,
    animation: Option<ViewAnimation<AfterPan>>,
    pulse: Option<Pulse>,
    events: Vec<MapEvent>,
}

impl MapSession {
    pub fn new(config: MapConfig) -> Self {
        let center = from_lon_lat(Point::new(config.center_lon, config.center_lat))
            .unwrap_or_else(|err| {
                warn!(%err, "configured center is not projectable, using origin");
                Coord { x: 0.0, y: 0.0 }
            });
        let viewport = Viewport::new(center, config.zoom, 0, 0)
            .with_zoom_limits(config.min_zoom, config.max_zoom);
        Self {
            lifecycle: Lifecycle::Pending(Countdown::new(config.init_fallback_ms)),
            viewport,
            records: Vec::new(),
            visible_ids: HashSet::new(),
            selected_id: None,
            poi: None,
            features: Vec::new(),
            index: ClusterIndex::build(&[]),
            invalid: 0,
            generation: 0,
            draw: None,
            styles: StyleCache::new(),
            popup: PopupController::new(),
            layout: LayoutQueue::new(),
            animation: None,
            pulse: None,
            events: Vec::new(),
            config,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn features(&self) -> &[PlacedFeature] {
        &self.features
    }

    /// Records dropped because they had no usable id or coordinate.
    pub fn invalid_count(&self) -> usize {
        self.invalid
    }

    pub fn mode(&self) -> LayerMode {
        if self.poi.is_some() {
            LayerMode::Unclustered
        } else {
            LayerMode::Clustered
        }
    }

    pub fn popup_state(&self) -> Option<&PopupState> {
        self.popup.state()
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn pulsing(&self) -> Option<i64> {
        self.pulse.as_ref().map(|p| p.feature_id)
    }

    pub fn style_cache(&self) -> &StyleCache {
        &self.styles
    }

    /// Take the events emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    // Inputs

    pub fn set_records(&mut self, records: Vec<GeoRecord>) {
        if self.is_disposed() {
            return;
        }
        self.records = records;
        self.rebuild();
    }

    pub fn set_visible_ids<I: IntoIterator<Item = i64>>(&mut self, ids: I) {
        if self.is_disposed() {
            return;
        }
        self.visible_ids = ids.into_iter().collect();
        self.rebuild();
    }

    /// Select a listing from outside the map. When the map is not ready yet the
    /// selection is applied on initialization.
    pub fn set_selected_id(&mut self, id: Option<i64>) {
        if self.is_disposed() {
            return;
        }
        self.selected_id = id;
        self.rebuild();
        if let (Some(id), true) = (id, self.is_ready()) {
            self.highlight(id);
        }
    }

    /// Focus the view on a point of interest, or clear the focus. Focusing switches the
    /// feature layer to unclustered.
    pub fn set_point_of_interest(&mut self, poi: Option<PointOfInterest>) {
        if self.is_disposed() {
            return;
        }
        let before = self.mode();
        self.poi = match poi {
            Some(p) => match from_lon_lat(Point::new(p.longitude, p.latitude)) {
                Ok(coord) => Some((p, coord)),
                Err(err) => {
                    warn!(name = %p.name, %err, "point of interest ignored");
                    None
                }
            },
            None => None,
        };
        if let Some((_, coord)) = &self.poi {
            // A running pan would overwrite the new center on the next tick.
            self.animation = None;
            self.viewport.center = *coord;
        }
        if before != self.mode() {
            debug!(mode = ?self.mode(), "feature layer mode changed");
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let resolved = resolve_all(&self.records);
        let placement = place_listings(&resolved.listings, &self.visible_ids);
        self.invalid = resolved.invalid + placement.invalid;
        self.features = placement.features;
        self.index = ClusterIndex::build(&self.features);
        self.generation += 1;
        self.draw = None;

        if self.invalid > 0 {
            debug!(invalid = self.invalid, "records left off the map");
        }
        if let Some(id) = self.pulse.as_ref().map(|p| p.feature_id) {
            if self.feature_index(id).is_none() {
                self.pulse = None;
            }
        }
        let stale = self
            .popup
            .state()
            .and_then(|s| s.target.primary_id())
            .is_some_and(|id| self.feature_index(id).is_none());
        if stale {
            self.popup.close();
        }
    }

    // Container and frame clock

    /// Report the container size. The first non-zero size initializes the map.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.is_disposed() {
            return;
        }
        self.viewport.width = width;
        self.viewport.height = height;
        if matches!(self.lifecycle, Lifecycle::Pending(_)) && self.viewport.is_sized() {
            self.initialize();
        }
    }

    /// Advance timers and animations by `dt_ms`.
    pub fn tick(&mut self, dt_ms: f64) {
        if self.is_disposed() {
            return;
        }
        if let Lifecycle::Pending(countdown) = &mut self.lifecycle {
            let fired = countdown.advance(dt_ms);
            if fired {
                if !self.viewport.is_sized() {
                    self.viewport.width = self.config.width;
                    self.viewport.height = self.config.height;
                }
                self.initialize();
            }
            return;
        }

        if let Some(pulse) = self.pulse.as_mut() {
            if pulse.step(dt_ms) == PulseFrame::Finished {
                self.pulse = None;
            }
        }

        if let Some(animation) = self.animation.as_mut() {
            let frame = animation.step(dt_ms);
            self.viewport.center = frame.center;
            self.viewport.zoom = self.viewport.clamp_zoom(frame.zoom);
            if frame.finished {
                let then = self.animation.take().and_then(|a| a.then);
                if let Some(AfterPan::OpenAndPulse(id)) = then {
                    self.open_single(id);
                    self.pulse = Some(Pulse::new(
                        id,
                        self.config.pulse_cycles,
                        self.config.pulse_interval_ms,
                    ));
                }
            }
        }
    }

    fn initialize(&mut self) {
        self.lifecycle = Lifecycle::Ready;
        info!(
            width = self.viewport.width,
            height = self.viewport.height,
            features = self.features.len(),
            "map initialized"
        );
        if let Some(id) = self.selected_id {
            self.highlight(id);
        }
    }

    /// Run work deferred to after the host's layout pass. `popup_size` is the measured
    /// size of the rendered popup, if one is shown.
    pub fn layout_pass(&mut self, popup_size: Option<(f64, f64)>) {
        if !self.is_ready() {
            return;
        }
        for task in self.layout.drain() {
            match task {
                LayoutTask::AutoPan => self.auto_pan(popup_size),
            }
        }
    }

    fn auto_pan(&mut self, popup_size: Option<(f64, f64)>) {
        let (Some(size), true) = (popup_size, self.popup.is_open()) else {
            return;
        };
        let Some(rect) = self.popup.rect(&self.viewport, size) else {
            return;
        };
        let margin = self.config.popup_margin;
        if let Some(delta) = autopan_delta(rect, self.viewport.width, self.viewport.height, margin) {
            let center = panned_center(&self.viewport, delta);
            debug!(dx = delta.0, dy = delta.1, "auto-panning to fit popup");
            self.animate_to(center, self.viewport.zoom, None);
        }
    }

    fn animate_to(&mut self, center: Coord<f64>, zoom: f64, then: Option<AfterPan>) {
        self.animation = Some(ViewAnimation::new(
            (self.viewport.center, self.viewport.zoom),
            (center, self.viewport.clamp_zoom(zoom)),
            self.config.pan_duration_ms,
            then,
        ));
    }

    // Rendering

    /// Groups for the current zoom and feature set, recomputed only when either changed.
    pub fn groups(&mut self) -> Vec<ClusterGroup> {
        let zoom_bits = self.viewport.zoom.to_bits();
        let mode = self.mode();
        if let Some(draw) = &self.draw {
            if draw.generation == self.generation && draw.zoom_bits == zoom_bits && draw.mode == mode {
                return draw.groups.clone();
            }
        }
        let groups = match mode {
            LayerMode::Unclustered => ClusterIndex::singletons(&self.features),
            LayerMode::Clustered => {
                let distance = cluster_distance(self.features.len(), self.viewport.zoom, false);
                self.index
                    .clusters(&self.features, distance, self.viewport.resolution())
            }
        };
        self.draw = Some(DrawCycle {
            generation: self.generation,
            zoom_bits,
            mode,
            groups: groups.clone(),
        });
        groups
    }

    /// Everything to draw this frame, bottom to top.
    pub fn visuals(&mut self) -> Vec<Visual> {
        if !self.is_ready() {
            return Vec::new();
        }
        let groups = self.groups();
        let pulse = self.pulse.as_ref().map(|p| (p.feature_id, p.phase()));
        let mut out = Vec::with_capacity(groups.len() + 1);

        for group in &groups {
            let (style, kind) = if group.is_single() {
                let f = &self.features[group.members[0]];
                let style = match pulse {
                    Some((id, phase)) if id == f.id() => self.styles.pulse(&f.listing.category, phase),
                    _ => self.styles.marker(&f.listing.category, f.primary),
                };
                let label = if style.show_label { f.listing.price_label() } else { None };
                (style, VisualKind::Feature { id: f.id(), label })
            } else {
                (
                    self.styles.cluster(group.len()),
                    VisualKind::Cluster { count: group.len() },
                )
            };
            out.push(Visual {
                coord: group.coord,
                pixel: self.viewport.pixel_from_coordinate(group.coord),
                style,
                kind,
            });
        }

        if let Some((poi, coord)) = &self.poi {
            out.push(Visual {
                coord: *coord,
                pixel: self.viewport.pixel_from_coordinate(*coord),
                style: self.styles.point_of_interest(),
                kind: VisualKind::PointOfInterest { name: poi.name.clone() },
            });
        }
        out
    }

    // Interaction

    /// Handle a click on the map at a pixel position.
    pub fn click(&mut self, at: Pixel) {
        if !self.is_ready() {
            return;
        }
        let coord = self.viewport.coordinate_from_pixel(at);
        let resolution = self.viewport.resolution();
        let tolerance = self.config.hit_tolerance;
        let groups = self.groups();
        let features = &self.features;
        let hit = hit_test(&groups, coord, resolution, |g| {
            let radius = if g.is_single() {
                if features[g.members[0]].primary {
                    PRIMARY_RADIUS
                } else {
                    SECONDARY_RADIUS
                }
            } else {
                cluster_radius(g.len())
            };
            radius + tolerance
        });

        let Some(hit) = hit else {
            debug!("background click");
            self.popup.close();
            return;
        };
        let group = &groups[hit];
        if group.is_single() {
            let id = self.features[group.members[0]].id();
            self.events.push(MapEvent::RecordSelected(id));
            self.open_single(id);
        } else if group.len() <= CLUSTER_POPUP_MAX {
            let ids = group.members.iter().map(|&m| self.features[m].id()).collect();
            self.popup
                .open(&self.viewport, PopupTarget::Cluster(ids), group.coord, self.config.popup_offset);
            self.layout.push(LayoutTask::AutoPan);
        } else {
            self.popup.close();
            self.zoom_to_extent(group.extent, group.len());
        }
    }

    /// Drill into a cluster too large for a popup. A bad extent leaves the view as is.
    fn zoom_to_extent(&mut self, extent: Rect<f64>, members: usize) {
        match self.viewport.fit_target(extent, self.config.fit_padding) {
            Ok((center, zoom)) => self.animate_to(center, zoom, None),
            Err(err) => warn!(%err, members, "could not zoom to cluster"),
        }
    }

    /// A member row was picked in a cluster popup.
    pub fn select_cluster_member(&mut self, id: i64) {
        let member = matches!(
            self.popup.state().map(|s| &s.target),
            Some(PopupTarget::Cluster(ids)) if ids.contains(&id)
        );
        if !member {
            return;
        }
        self.events.push(MapEvent::RecordSelected(id));
        self.open_single(id);
    }

    /// Click landed outside the popup.
    pub fn click_outside_popup(&mut self) {
        self.popup.close();
    }

    pub fn close_popup(&mut self) {
        self.popup.close();
    }

    pub fn next_image(&mut self) {
        let count = self.popup_images();
        self.popup.next_image(count);
    }

    pub fn previous_image(&mut self) {
        let count = self.popup_images();
        self.popup.previous_image(count);
    }

    fn popup_images(&self) -> usize {
        self.popup
            .state()
            .and_then(|s| s.target.primary_id())
            .and_then(|id| self.feature_index(id))
            .map(|i| self.features[i].listing.images.len())
            .unwrap_or(0)
    }

    /// Content for the open popup, read from the current listings.
    pub fn popup_content(&self) -> Option<PopupContent> {
        let state = self.popup.state()?;
        match &state.target {
            PopupTarget::Single(id) => {
                let i = self.feature_index(*id)?;
                let colocated = colocated_count(&self.features, i);
                Some(PopupContent::Single(ListingDetail::new(
                    &self.features[i].listing,
                    state.image_index,
                    colocated,
                )))
            }
            PopupTarget::Cluster(ids) => {
                let members: Vec<_> = ids
                    .iter()
                    .filter_map(|id| self.feature_index(*id))
                    .map(|i| &self.features[i].listing)
                    .collect();
                cluster_content(&members, state.image_index)
            }
        }
    }

    /// Zoom in if needed, pan to the listing, then open its popup and pulse its marker.
    pub fn highlight(&mut self, id: i64) {
        if !self.is_ready() {
            return;
        }
        let Some(i) = self.feature_index(id) else {
            debug!(id, "highlight requested for a listing that is not on the map");
            return;
        };
        self.pulse = None;
        let zoom = self.viewport.zoom.max(HIGHLIGHT_ZOOM);
        let center = self.features[i].coord;
        self.animate_to(center, zoom, Some(AfterPan::OpenAndPulse(id)));
    }

    fn open_single(&mut self, id: i64) {
        let Some(i) = self.feature_index(id) else {
            return;
        };
        let anchor = self.features[i].coord;
        self.popup
            .open(&self.viewport, PopupTarget::Single(id), anchor, self.config.popup_offset);
        self.layout.push(LayoutTask::AutoPan);
    }

    fn feature_index(&self, id: i64) -> Option<usize> {
        self.features.iter().position(|f| f.id() == id)
    }

    /// Tear the session down. Every later call is a no-op.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }
        self.styles.clear();
        self.layout.clear();
        self.animation = None;
        self.pulse = None;
        self.popup.close();
        self.draw = None;
        self.features.clear();
        self.index = ClusterIndex::build(&[]);
        self.records.clear();
        self.events.clear();
        self.lifecycle = Lifecycle::Disposed;
        info!("map session disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, lat: f64, lng: f64) -> GeoRecord {
        serde_json::from_value(json!({
            "id": id, "title": format!("Listing {id}"), "price": 400,
            "propertyType": "apartment", "latitude": lat, "longitude": lng,
            "images": ["a.jpg", "b.jpg"]
        }))
        .unwrap()
    }

    fn ready_session() -> MapSession {
        let mut s = MapSession::new(MapConfig::default());
        s.resize(800, 600);
        s
    }

    #[test]
    fn initializes_on_first_size_or_fallback_timer() {
        let mut s = MapSession::new(MapConfig::default());
        s.resize(0, 0);
        assert!(!s.is_ready());
        s.resize(640, 480);
        assert!(s.is_ready());

        let mut s = MapSession::new(MapConfig::default());
        s.tick(200.0);
        assert!(!s.is_ready());
        s.tick(400.0);
        assert!(s.is_ready());
        assert_eq!(s.viewport().width, 800);
    }

    #[test]
    fn counts_invalid_records() {
        let mut s = ready_session();
        let bad: GeoRecord = serde_json::from_value(json!({ "id": 9, "title": "nowhere" })).unwrap();
        s.set_records(vec![record(1, 40.0, -3.7), bad]);
        assert_eq!(s.features().len(), 1);
        assert_eq!(s.invalid_count(), 1);
    }

    #[test]
    fn point_of_interest_toggles_layer_mode() {
        let mut s = ready_session();
        assert_eq!(s.mode(), LayerMode::Clustered);
        s.set_point_of_interest(Some(PointOfInterest {
            name: "Campus".into(),
            latitude: 40.45,
            longitude: -3.72,
        }));
        assert_eq!(s.mode(), LayerMode::Unclustered);
        assert!(s
            .visuals()
            .iter()
            .any(|v| matches!(v.kind, VisualKind::PointOfInterest { .. })));
        s.set_point_of_interest(None);
        assert_eq!(s.mode(), LayerMode::Clustered);
    }

    #[test]
    fn clicking_a_marker_emits_selection_and_opens_popup() {
        let mut s = ready_session();
        s.set_records(vec![record(7, 40.4168, -3.7038)]);
        let px = s.viewport().pixel_from_coordinate(s.features()[0].coord);
        s.click(Pixel::new(px.x + 3.0, px.y));
        assert_eq!(s.drain_events(), vec![MapEvent::RecordSelected(7)]);
        assert_eq!(s.popup_state().unwrap().target, PopupTarget::Single(7));
        match s.popup_content().unwrap() {
            PopupContent::Single(d) => assert_eq!(d.price, "€400 / month"),
            other => panic!("unexpected {other:?}"),
        }
        s.next_image();
        s.next_image();
        assert_eq!(s.popup_state().unwrap().image_index, 0);

        s.click(Pixel::new(5.0, 5.0));
        assert!(s.popup_state().is_none());
    }

    #[test]
    fn dispose_releases_everything() {
        let mut s = ready_session();
        s.set_records(vec![record(1, 40.4168, -3.7038)]);
        assert!(!s.visuals().is_empty());
        assert!(!s.style_cache().is_empty());
        s.dispose();
        assert!(s.style_cache().is_empty());
        assert!(s.visuals().is_empty());
        s.set_records(vec![record(2, 40.0, -3.0)]);
        assert!(s.features().is_empty());
    }

    #[test]
    fn unframeable_cluster_extent_leaves_view_untouched() {
        let mut s = ready_session();
        let (center, zoom) = (s.viewport().center, s.viewport().zoom);
        let bad = Rect::new(Coord { x: f64::NAN, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        s.zoom_to_extent(bad, 8);
        assert!(!s.is_animating());
        s.tick(1000.0);
        assert_eq!(s.viewport().center, center);
        assert_eq!(s.viewport().zoom, zoom);
    }

    #[test]
    fn zero_fallback_initializes_on_first_tick() {
        let config = MapConfig {
            init_fallback_ms: 0.0,
            ..MapConfig::default()
        };
        let mut s = MapSession::new(config);
        assert!(!s.is_ready());
        s.tick(16.0);
        assert!(s.is_ready());
        assert_eq!(s.viewport().width, 800);
    }

    #[test]
    fn inverted_zoom_limits_do_not_panic() {
        let config = MapConfig {
            min_zoom: 18.0,
            max_zoom: 3.0,
            zoom: 12.0,
            ..MapConfig::default()
        };
        let mut s = MapSession::new(config);
        s.resize(800, 600);
        assert_eq!(s.viewport().zoom, 12.0);
        s.set_records(vec![record(1, 40.4168, -3.7038)]);
        s.highlight(1);
        s.tick(1000.0);
        assert!(s.viewport().zoom <= 18.0);
    }

    #[test]
    fn huge_pulse_settings_do_not_panic() {
        let config = MapConfig {
            pulse_cycles: u32::MAX,
            ..MapConfig::default()
        };
        let mut s = MapSession::new(config);
        s.resize(800, 600);
        s.set_records(vec![record(1, 40.4168, -3.7038)]);
        s.highlight(1);
        s.tick(1000.0);
        assert_eq!(s.pulsing(), Some(1));
        s.tick(f64::MAX);
        assert_eq!(s.pulsing(), None);
    }

    #[test]
    fn point_of_interest_cancels_running_pan() {
        let mut s = ready_session();
        s.set_records(vec![record(1, 40.45, -3.65)]);
        s.highlight(1);
        assert!(s.is_animating());
        s.tick(100.0);

        let poi = PointOfInterest {
            name: "Campus".into(),
            latitude: 40.4168,
            longitude: -3.7038,
        };
        let expected = from_lon_lat(Point::new(poi.longitude, poi.latitude)).unwrap();
        s.set_point_of_interest(Some(poi));
        assert!(!s.is_animating());
        s.tick(1000.0);
        assert_eq!(s.viewport().center, expected);
        assert!(s.popup_state().is_none());
    }
}
