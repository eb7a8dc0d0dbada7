//! Web Mercator (EPSG:3857) transforms and the viewport state.

use crate::error::{MapError, Result};
use geo::{Coord, Point, Rect};
use std::f64::consts::PI;
use tracing::warn;

pub const EARTH_RADIUS: f64 = 6_378_137.0;
pub const TILE_SIZE: f64 = 256.0;
/// Web Mercator latitude limit.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
/// Metres per pixel at zoom 0.
pub const ZOOM0_RESOLUTION: f64 = 2.0 * PI * EARTH_RADIUS / TILE_SIZE;

/// Project a lon/lat point (x = lon, y = lat) to Web Mercator metres.
pub fn from_lon_lat(p: Point<f64>) -> Result<Coord<f64>> {
    let (lon, lat) = (p.x(), p.y());
    if !lon.is_finite() || !lat.is_finite() {
        return Err(MapError::NonFiniteCoordinate { x: lon, y: lat });
    }
    if lat.abs() > MAX_LATITUDE {
        return Err(MapError::LatitudeOutOfRange { lat });
    }
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    Ok(Coord { x, y })
}

/// Inverse of [`from_lon_lat`].
pub fn to_lon_lat(c: Coord<f64>) -> Point<f64> {
    let lon = (c.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (c.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    Point::new(lon, lat)
}

pub fn resolution_for_zoom(zoom: f64) -> f64 {
    ZOOM0_RESOLUTION / 2f64.powf(zoom)
}

pub fn zoom_for_resolution(resolution: f64) -> f64 {
    (ZOOM0_RESOLUTION / resolution).log2()
}

/// Pixel position on screen, origin top-left, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Center, zoom and pixel size of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub center: Coord<f64>,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Viewport {
    pub fn new(center: Coord<f64>, zoom: f64, width: u32, height: u32) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            min_zoom: 0.0,
            max_zoom: 20.0,
        }
    }

    /// Set the zoom range. Non-finite limits keep the current bound and limits given in
    /// the wrong order are swapped.
    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        let min_zoom = if min_zoom.is_finite() { min_zoom } else { self.min_zoom };
        let max_zoom = if max_zoom.is_finite() { max_zoom } else { self.max_zoom };
        if min_zoom > max_zoom {
            warn!(min_zoom, max_zoom, "zoom limits out of order, swapping");
            self.min_zoom = max_zoom;
            self.max_zoom = min_zoom;
        } else {
            self.min_zoom = min_zoom;
            self.max_zoom = max_zoom;
        }
        self.zoom = self.clamp_zoom(self.zoom);
        self
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.min_zoom;
        }
        zoom.max(self.min_zoom).min(self.max_zoom)
    }

    pub fn resolution(&self) -> f64 {
        resolution_for_zoom(self.zoom)
    }

    pub fn is_sized(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn pixel_from_coordinate(&self, c: Coord<f64>) -> Pixel {
        let res = self.resolution();
        Pixel {
            x: (c.x - self.center.x) / res + self.width as f64 / 2.0,
            y: (self.center.y - c.y) / res + self.height as f64 / 2.0,
        }
    }

    pub fn coordinate_from_pixel(&self, p: Pixel) -> Coord<f64> {
        let res = self.resolution();
        Coord {
            x: self.center.x + (p.x - self.width as f64 / 2.0) * res,
            y: self.center.y - (p.y - self.height as f64 / 2.0) * res,
        }
    }

    /// Center and zoom that frame `extent` with `padding` pixels on every side. A
    /// degenerate extent (a single point) resolves to the maximum zoom.
    pub fn fit_target(&self, extent: Rect<f64>, padding: f64) -> Result<(Coord<f64>, f64)> {
        if !self.is_sized() {
            return Err(MapError::ZeroSizedViewport);
        }
        let (min, max) = (extent.min(), extent.max());
        if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
            return Err(MapError::InvalidExtent);
        }
        let avail_w = (self.width as f64 - 2.0 * padding).max(1.0);
        let avail_h = (self.height as f64 - 2.0 * padding).max(1.0);
        let res = (extent.width() / avail_w).max(extent.height() / avail_h);
        let zoom = if res > 0.0 {
            self.clamp_zoom(zoom_for_resolution(res))
        } else {
            self.max_zoom
        };
        Ok((extent.center(), zoom))
    }
}
