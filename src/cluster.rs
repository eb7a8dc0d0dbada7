//! Zoom-adaptive grouping of placed features.
//!
//! Features are indexed once per input list in an R-tree. Each draw cycle walks them in
//! input order and pulls every still-unassigned neighbour inside the grouping square
//! into the current cluster.

use crate::types::{ClusterGroup, PlacedFeature};
use geo::{Coord, Rect};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Grouping distance in pixels for a feature count and zoom level.
///
/// A focused view never clusters. Otherwise the distance shrinks as zoom and density grow.
pub fn cluster_distance(feature_count: usize, zoom: f64, focused: bool) -> f64 {
    if focused {
        return 0.0;
    }
    if feature_count > 100 && zoom < 14.0 {
        (40.0 - 3.0 * zoom).max(5.0)
    } else if feature_count > 50 && zoom < 15.0 {
        (25.0 - 2.0 * zoom).max(5.0)
    } else if feature_count > 20 && zoom < 16.0 {
        5.0
    } else {
        0.0
    }
}

// Wrapper so placed features can live in the R-tree by index.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    index: usize,
    pos: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over one placed feature list.
pub struct ClusterIndex {
    tree: RTree<IndexedPoint>,
}

impl ClusterIndex {
    pub fn build(features: &[PlacedFeature]) -> Self {
        let points = features
            .iter()
            .enumerate()
            .map(|(index, f)| IndexedPoint {
                index,
                pos: [f.coord.x, f.coord.y],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Group features for one draw cycle. `distance` is in pixels, `resolution` in
    /// metres per pixel.
    pub fn clusters(
        &self,
        features: &[PlacedFeature],
        distance: f64,
        resolution: f64,
    ) -> Vec<ClusterGroup> {
        let half = distance * resolution;
        let mut assigned = vec![false; features.len()];
        let mut groups = Vec::new();

        for (i, feature) in features.iter().enumerate() {
            if assigned[i] {
                continue;
            }
            let c = feature.coord;
            let envelope = AABB::from_corners([c.x - half, c.y - half], [c.x + half, c.y + half]);
            let mut members: Vec<usize> = self
                .tree
                .locate_in_envelope(&envelope)
                .map(|p| p.index)
                .filter(|&j| !assigned[j])
                .collect();
            if !members.contains(&i) {
                members.push(i);
            }
            members.sort_unstable();
            for &j in &members {
                assigned[j] = true;
            }
            groups.push(group_of(features, members));
        }
        groups
    }

    /// Each feature in its own group, used while clustering is switched off.
    pub fn singletons(features: &[PlacedFeature]) -> Vec<ClusterGroup> {
        (0..features.len())
            .map(|i| group_of(features, vec![i]))
            .collect()
    }
}

fn group_of(features: &[PlacedFeature], members: Vec<usize>) -> ClusterGroup {
    let n = members.len() as f64;
    let (mut sx, mut sy) = (0.0, 0.0);
    let mut min = Coord { x: f64::INFINITY, y: f64::INFINITY };
    let mut max = Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY };
    for &m in &members {
        let c = features[m].coord;
        sx += c.x;
        sy += c.y;
        min.x = min.x.min(c.x);
        min.y = min.y.min(c.y);
        max.x = max.x.max(c.x);
        max.y = max.y.max(c.y);
    }
    ClusterGroup {
        coord: Coord { x: sx / n, y: sy / n },
        members,
        extent: Rect::new(min, max),
    }
}

/// Find the group under a map coordinate. `radius_px` gives each group's hit radius in
/// pixels; the closest group inside its own radius wins.
pub fn hit_test<F>(groups: &[ClusterGroup], at: Coord<f64>, resolution: f64, radius_px: F) -> Option<usize>
where
    F: Fn(&ClusterGroup) -> f64,
{
    let points: Vec<IndexedPoint> = groups
        .iter()
        .enumerate()
        .map(|(index, g)| IndexedPoint {
            index,
            pos: [g.coord.x, g.coord.y],
        })
        .collect();
    let tree = RTree::bulk_load(points);
    let max_radius = groups.iter().map(&radius_px).fold(0.0, f64::max) * resolution;

    tree.locate_within_distance([at.x, at.y], max_radius * max_radius)
        .filter(|p| {
            let r = radius_px(&groups[p.index]) * resolution;
            p.distance_2(&[at.x, at.y]) <= r * r
        })
        .min_by(|a, b| {
            let da = a.distance_2(&[at.x, at.y]);
            let db = b.distance_2(&[at.x, at.y]);
            da.total_cmp(&db).then(b.index.cmp(&a.index))
        })
        .map(|p| p.index)
}
