//! Shape adapters for incoming records plus the coordinate and detail resolvers.
//!
//! Each known record shape gets one adapter that turns it into a [`Listing`]. After that
//! nothing in the crate looks at the raw shapes again.

use crate::types::{GeoRecord, Listing, OwnerListing, SearchResult};
use geo::Point;
use tracing::debug;

pub const ADDRESS_FALLBACK: &str = "Address not available";
pub const PRICE_FALLBACK: &str = "Price not available";
pub const DEFAULT_CURRENCY: &str = "€";
pub const DEFAULT_PERIOD: &str = "month";
pub const DEFAULT_CATEGORY: &str = "other";

/// Listings that resolved to a coordinate, and how many records were dropped.
#[derive(Debug, Default)]
pub struct Resolved {
    pub listings: Vec<Listing>,
    pub invalid: usize,
}

/// Normalize a record into the canonical listing. Returns `None` when the id cannot be
/// coerced to an integer.
pub fn normalize(record: &GeoRecord) -> Option<Listing> {
    match record {
        GeoRecord::SearchResult(r) => from_search_result(r),
        GeoRecord::OwnerListing(r) => from_owner_listing(r),
    }
}

fn from_search_result(r: &SearchResult) -> Option<Listing> {
    let id = r.id.as_ref()?.canonical()?;
    let images = match (&r.images, &r.image_url) {
        (Some(list), _) if !list.is_empty() => list.clone(),
        (_, Some(url)) => vec![url.clone()],
        _ => Vec::new(),
    };
    Some(Listing {
        id,
        title: r.title.clone().unwrap_or_default(),
        price: r.price,
        currency: r.currency.clone().unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        period: r
            .price_period
            .clone()
            .unwrap_or_else(|| DEFAULT_PERIOD.to_string()),
        category: normalize_category(r.property_type.as_deref()),
        position: coordinate(r.latitude, r.longitude),
        address: non_empty(r.address.as_deref()),
        city: non_empty(r.city.as_deref()),
        district: non_empty(r.district.as_deref()),
        beds: r.bedrooms,
        baths: r.bathrooms,
        area: r.area,
        images,
    })
}

fn from_owner_listing(r: &OwnerListing) -> Option<Listing> {
    let id = r.id.as_ref()?.canonical()?;
    let images = match (&r.images, &r.cover_image) {
        (Some(list), _) if !list.is_empty() => list.clone(),
        (_, Some(url)) => vec![url.clone()],
        _ => Vec::new(),
    };
    let loc = &r.location;
    Some(Listing {
        id,
        title: r.title.clone().unwrap_or_default(),
        price: r.price,
        currency: r.currency.clone().unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        period: DEFAULT_PERIOD.to_string(),
        category: normalize_category(r.category.as_deref()),
        position: coordinate(loc.lat, loc.lng),
        address: non_empty(loc.address.as_deref()),
        city: non_empty(loc.city.as_deref()),
        district: non_empty(loc.district.as_deref()),
        beds: r.beds,
        baths: r.baths,
        area: r.size,
        images,
    })
}

/// Build a lon/lat point when both parts are present, finite and on the globe.
pub fn coordinate(lat: Option<f64>, lng: Option<f64>) -> Option<Point<f64>> {
    let (lat, lng) = (lat?, lng?);
    if !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(Point::new(lng, lat))
}

/// Resolve a whole input list, keeping input order. Records without an id or a
/// coordinate are counted and dropped.
pub fn resolve_all(records: &[GeoRecord]) -> Resolved {
    let mut out = Resolved::default();
    for record in records {
        match normalize(record) {
            Some(listing) if listing.position.is_some() => out.listings.push(listing),
            Some(listing) => {
                debug!(id = listing.id, "dropping record without a usable coordinate");
                out.invalid += 1;
            }
            None => {
                debug!("dropping record without a canonical id");
                out.invalid += 1;
            }
        }
    }
    out
}

fn normalize_category(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl Listing {
    /// Human readable address: explicit address, else "district, city", else fallback.
    pub fn address_text(&self) -> String {
        if let Some(address) = &self.address {
            return address.clone();
        }
        let parts: Vec<&str> = [self.district.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            ADDRESS_FALLBACK.to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Full price line, e.g. `€450 / month`.
    pub fn price_text(&self) -> String {
        match self.price.filter(|p| p.is_finite()) {
            Some(price) => format!("{}{} / {}", self.currency, format_amount(price), self.period),
            None => PRICE_FALLBACK.to_string(),
        }
    }

    /// Short marker label, e.g. `€450`.
    pub fn price_label(&self) -> Option<String> {
        self.price
            .filter(|p| p.is_finite())
            .map(|p| format!("{}{}", self.currency, format_amount(p)))
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}
