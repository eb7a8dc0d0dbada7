//! Popup placement, auto-pan and content.

use crate::projection::{Pixel, Viewport};
use crate::types::Listing;
use geo::Coord;
use serde::Serialize;

/// Cluster popups list every member up to this many.
pub const CLUSTER_LIST_ALL_MAX: usize = 5;
/// Beyond that, only this many are listed before the "+N more" line.
pub const CLUSTER_LIST_TRUNCATED: usize = 3;

/// Which point of the popup box sits on the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Positioning {
    /// Popup hangs below the marker.
    TopCenter,
    /// Popup sits above the marker.
    BottomCenter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PopupTarget {
    Single(i64),
    Cluster(Vec<i64>),
}

impl PopupTarget {
    pub fn primary_id(&self) -> Option<i64> {
        match self {
            PopupTarget::Single(id) => Some(*id),
            PopupTarget::Cluster(ids) => ids.first().copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupState {
    pub target: PopupTarget,
    #[serde(skip)]
    pub anchor: Coord<f64>,
    pub positioning: Positioning,
    /// Pixel offset from the anchor, y negative when the popup sits above.
    pub offset: (f64, f64),
    pub image_index: usize,
}

/// Choose popup positioning for an anchor pixel: markers in the lower half of the map
/// get the popup above them.
pub fn placement(anchor_px: Pixel, map_height: u32, offset: f64) -> (Positioning, (f64, f64)) {
    if anchor_px.y > map_height as f64 / 2.0 {
        (Positioning::BottomCenter, (0.0, -offset))
    } else {
        (Positioning::TopCenter, (0.0, offset))
    }
}

/// Screen box of a popup, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

pub fn popup_rect(
    anchor_px: Pixel,
    positioning: Positioning,
    offset: (f64, f64),
    size: (f64, f64),
) -> PixelRect {
    let (w, h) = size;
    let x = anchor_px.x + offset.0;
    let y = anchor_px.y + offset.1;
    let top = match positioning {
        Positioning::TopCenter => y,
        Positioning::BottomCenter => y - h,
    };
    PixelRect {
        left: x - w / 2.0,
        top,
        right: x + w / 2.0,
        bottom: top + h,
    }
}

/// Pixel delta the map must pan so the popup keeps `margin` pixels from every edge, or
/// `None` when it already fits.
pub fn autopan_delta(rect: PixelRect, width: u32, height: u32, margin: f64) -> Option<(f64, f64)> {
    let (w, h) = (width as f64, height as f64);
    let dx = if rect.left < margin {
        rect.left - margin
    } else if rect.right > w - margin {
        rect.right - (w - margin)
    } else {
        0.0
    };
    let dy = if rect.top < margin {
        rect.top - margin
    } else if rect.bottom > h - margin {
        rect.bottom - (h - margin)
    } else {
        0.0
    };
    if dx == 0.0 && dy == 0.0 {
        None
    } else {
        Some((dx, dy))
    }
}

/// New view center after panning by a pixel delta.
pub fn panned_center(viewport: &Viewport, delta: (f64, f64)) -> Coord<f64> {
    let res = viewport.resolution();
    Coord {
        x: viewport.center.x + delta.0 * res,
        y: viewport.center.y - delta.1 * res,
    }
}

/// Detail block for one listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDetail {
    pub id: i64,
    pub title: String,
    pub address: String,
    pub price: String,
    pub beds: Option<u32>,
    pub baths: Option<u32>,
    pub area: Option<f64>,
    pub images: Vec<String>,
    pub image_index: usize,
    pub colocated_note: Option<String>,
}

impl ListingDetail {
    pub fn new(listing: &Listing, image_index: usize, colocated: usize) -> Self {
        let image_index = if listing.images.is_empty() {
            0
        } else {
            image_index % listing.images.len()
        };
        Self {
            id: listing.id,
            title: listing.title.clone(),
            address: listing.address_text(),
            price: listing.price_text(),
            beds: listing.beds,
            baths: listing.baths,
            area: listing.area,
            images: listing.images.clone(),
            image_index,
            colocated_note: colocated_note(colocated),
        }
    }

    pub fn current_image(&self) -> Option<&str> {
        self.images.get(self.image_index).map(String::as_str)
    }
}

fn colocated_note(others: usize) -> Option<String> {
    match others {
        0 => None,
        1 => Some("1 other property at this location".to_string()),
        n => Some(format!("{n} other properties at this location")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterEntry {
    pub id: i64,
    pub title: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopupContent {
    Single(ListingDetail),
    Cluster {
        primary: ListingDetail,
        entries: Vec<ClusterEntry>,
        more: Option<String>,
    },
}

/// Build cluster popup content. Members come in cluster order; the first is the primary.
pub fn cluster_content(members: &[&Listing], image_index: usize) -> Option<PopupContent> {
    let first = members.first()?;
    let shown = if members.len() <= CLUSTER_LIST_ALL_MAX {
        members.len()
    } else {
        CLUSTER_LIST_TRUNCATED
    };
    let entries = members[..shown]
        .iter()
        .map(|l| ClusterEntry {
            id: l.id,
            title: l.title.clone(),
            price: l.price_text(),
        })
        .collect();
    let hidden = members.len() - shown;
    Some(PopupContent::Cluster {
        primary: ListingDetail::new(first, image_index, 0),
        entries,
        more: (hidden > 0).then(|| format!("+{hidden} more...")),
    })
}

/// Owner of the single popup slot.
#[derive(Debug, Default)]
pub struct PopupController {
    state: Option<PopupState>,
}

impl PopupController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&PopupState> {
        self.state.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Open a popup at `anchor`, replacing any popup already open.
    pub fn open(&mut self, viewport: &Viewport, target: PopupTarget, anchor: Coord<f64>, offset: f64) {
        let px = viewport.pixel_from_coordinate(anchor);
        let (positioning, offset) = placement(px, viewport.height, offset);
        self.state = Some(PopupState {
            target,
            anchor,
            positioning,
            offset,
            image_index: 0,
        });
    }

    pub fn close(&mut self) -> Option<PopupState> {
        self.state.take()
    }

    /// Screen box of the open popup for a measured size.
    pub fn rect(&self, viewport: &Viewport, size: (f64, f64)) -> Option<PixelRect> {
        let s = self.state.as_ref()?;
        let px = viewport.pixel_from_coordinate(s.anchor);
        Some(popup_rect(px, s.positioning, s.offset, size))
    }

    pub fn next_image(&mut self, image_count: usize) {
        if let Some(s) = self.state.as_mut() {
            if image_count > 0 {
                s.image_index = (s.image_index + 1) % image_count;
            }
        }
    }

    pub fn previous_image(&mut self, image_count: usize) {
        if let Some(s) = self.state.as_mut() {
            if image_count > 0 {
                s.image_index = (s.image_index + image_count - 1) % image_count;
            }
        }
    }
}
