use geo::{Coord, Point, Rect};
use serde::{Deserialize, Serialize};

/// Record identifier as it arrives from the listing services: either a number or a
/// string that should hold one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RecordId {
    /// Coerce to the canonical integer id. Strings are trimmed and parsed, floats are
    /// accepted only when integral.
    pub fn canonical(&self) -> Option<i64> {
        match self {
            RecordId::Int(i) => Some(*i),
            RecordId::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            RecordId::Float(_) => None,
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Shape returned by the search endpoint. Coordinates are flat fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    pub id: Option<RecordId>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub price_period: Option<String>,
    pub property_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area: Option<f64>,
    pub image_url: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Nested location object carried by owner listings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OwnerLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
}

/// Shape returned by the owner dashboard endpoints. `location` is mandatory here, which
/// is what tells the two shapes apart when decoding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerListing {
    pub id: Option<RecordId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "type")]
    pub category: Option<String>,
    pub location: OwnerLocation,
    #[serde(default)]
    pub beds: Option<u32>,
    #[serde(default)]
    pub baths: Option<u32>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// A geo-tagged record in either of the known shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GeoRecord {
    OwnerListing(OwnerListing),
    SearchResult(SearchResult),
}

/// Canonical record every core component works on. Produced by the adapters in
/// `resolve`, never by hand-reading either shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub price: Option<f64>,
    pub currency: String,
    pub period: String,
    pub category: String,
    /// x = longitude, y = latitude
    pub position: Option<Point<f64>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub beds: Option<u32>,
    pub baths: Option<u32>,
    pub area: Option<f64>,
    pub images: Vec<String>,
}

/// A listing placed on the projected plane for the current input list.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFeature {
    /// Web Mercator metres, after jitter.
    pub coord: Coord<f64>,
    /// Resolved lon/lat before jitter.
    pub origin: Point<f64>,
    pub listing: Listing,
    pub primary: bool,
}

impl PlacedFeature {
    pub fn id(&self) -> i64 {
        self.listing.id
    }
}

/// Render-time group of placed features.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGroup {
    pub coord: Coord<f64>,
    /// Indices into the placed feature list, in input order.
    pub members: Vec<usize>,
    pub extent: Rect<f64>,
}

impl ClusterGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }
}

/// An institution or other point the view can be focused on.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PointOfInterest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Events the map hands back to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MapEvent {
    RecordSelected(i64),
}
