use crate::projection::from_lon_lat;
use crate::types::{Listing, PlacedFeature};
use geo::Point;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use tracing::debug;

/// Coordinates are compared at 5 decimals (~1.1 m) when looking for duplicates.
const DEDUP_SCALE: f64 = 1e5;
/// Base jitter radius in degrees (~9 m at the equator).
const BASE_OFFSET_DEG: f64 = 0.00008;
const MAX_GROUP_MULTIPLIER: f64 = 4.0;
const SKIP_HASH_THRESHOLD: f64 = 0.2;
const SKIP_MAX_GROUP: usize = 10;

/// Output of a placement run.
#[derive(Debug, Default)]
pub struct Placement {
    pub features: Vec<PlacedFeature>,
    /// Listings that could not be projected.
    pub invalid: usize,
}

type DedupKey = (i64, i64);

fn dedup_key(p: Point<f64>) -> DedupKey {
    (
        (p.y() * DEDUP_SCALE).round() as i64,
        (p.x() * DEDUP_SCALE).round() as i64,
    )
}

/// Fixed sine hash in [0, 1). Stateless so the same seed always lands on the same value.
fn hash01(seed: f64) -> f64 {
    ((seed.sin() * 43_758.545_3).abs()).fract()
}

/// Offset in degrees `(d_lon, d_lat)` for the member at `index` of a group of `size`,
/// or `None` when the member stays on the shared coordinate.
pub fn jitter_offset(id: i64, index: usize, size: usize, lat: f64) -> Option<(f64, f64)> {
    if index == 0 || size < 2 {
        return None;
    }
    let seed = id as f64 + index as f64;
    let r1 = hash01(seed * 12.9898);
    let r2 = hash01(seed * 78.233);
    if r1 <= SKIP_HASH_THRESHOLD && size <= SKIP_MAX_GROUP {
        return None;
    }

    let step = 2.4 * PI / size as f64;
    let angle = index as f64 * step + (r1 - 0.5) * step;
    let group_factor = (1.0 + size as f64 / 5.0).min(MAX_GROUP_MULTIPLIER);
    let distance =
        BASE_OFFSET_DEG * group_factor * (1.0 + 0.3 * index as f64) * (0.75 + 0.5 * r2);

    let lat_scale = lat.to_radians().cos().max(0.01);
    Some((distance * angle.cos() / lat_scale, distance * angle.sin()))
}

/// Place resolved listings on the projected plane.
///
/// Listings whose coordinates collide at 5-decimal precision are fanned out around the
/// first one of their group. `visible_ids` selects primary markers; an empty set makes
/// every listing primary.
pub fn place_listings(listings: &[Listing], visible_ids: &HashSet<i64>) -> Placement {
    let mut group_sizes: HashMap<DedupKey, usize> = HashMap::new();
    for listing in listings {
        if let Some(p) = listing.position {
            *group_sizes.entry(dedup_key(p)).or_default() += 1;
        }
    }

    let mut seen: HashMap<DedupKey, usize> = HashMap::new();
    let mut placement = Placement::default();

    for listing in listings {
        let Some(origin) = listing.position else {
            placement.invalid += 1;
            continue;
        };
        let key = dedup_key(origin);
        let size = group_sizes.get(&key).copied().unwrap_or(1);
        let slot = seen.entry(key).or_default();
        let index = *slot;
        *slot += 1;

        let placed = match jitter_offset(listing.id, index, size, origin.y()) {
            Some((d_lon, d_lat)) => Point::new(origin.x() + d_lon, origin.y() + d_lat),
            None => origin,
        };

        match from_lon_lat(placed) {
            Ok(coord) => placement.features.push(PlacedFeature {
                coord,
                origin,
                listing: listing.clone(),
                primary: visible_ids.is_empty() || visible_ids.contains(&listing.id),
            }),
            Err(err) => {
                debug!(id = listing.id, %err, "listing left out of placement");
                placement.invalid += 1;
            }
        }
    }

    let groups = group_sizes.values().filter(|&&n| n > 1).count();
    debug!(
        placed = placement.features.len(),
        invalid = placement.invalid,
        duplicate_groups = groups,
        "placement complete"
    );
    placement
}

/// Number of other features resolved to exactly the same original coordinate.
pub fn colocated_count(features: &[PlacedFeature], index: usize) -> usize {
    let Some(target) = features.get(index) else {
        return 0;
    };
    features
        .iter()
        .enumerate()
        .filter(|(i, f)| *i != index && f.origin == target.origin)
        .count()
}
