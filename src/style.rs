//! Memoized marker, cluster and point-of-interest visuals.
//!
//! Icons are rasterized once per semantic key and shared through `Rc`. The cache is owned
//! by a map session and emptied when the session is disposed.

use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::rc::Rc;

pub const PRIMARY_RADIUS: f64 = 10.0;
pub const SECONDARY_RADIUS: f64 = 6.0;
pub const SECONDARY_OPACITY: f32 = 0.55;
pub const CLUSTER_MIN_RADIUS: f64 = 15.0;
pub const CLUSTER_MAX_RADIUS: f64 = 30.0;
pub const POI_RADIUS: f64 = 12.0;
const STROKE_WIDTH: f64 = 2.0;

const DEFAULT_COLOR: &str = "#6c757d";
const CLUSTER_COLOR: &str = "#1f6feb";
const POI_COLOR: &str = "#d63384";
const STROKE_COLOR: &str = "#ffffff";

/// Category colours. Anything not listed falls back to [`DEFAULT_COLOR`].
const CATEGORY_COLORS: &[(&str, &str)] = &[
    ("apartment", "#0d6efd"),
    ("studio", "#20c997"),
    ("room", "#fd7e14"),
    ("shared", "#fd7e14"),
    ("house", "#6f42c1"),
    ("residence", "#dc3545"),
    ("dormitory", "#dc3545"),
];

pub fn category_color(category: &str) -> &'static str {
    CATEGORY_COLORS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

/// Semantic key a style is cached under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleKey {
    Marker { category: String, primary: bool },
    Cluster { count: usize },
    PointOfInterest,
    Pulse { category: String, phase: u32 },
}

/// A rasterized visual.
#[derive(Debug, Clone)]
pub struct Style {
    pub radius: f64,
    pub color: Rgba<u8>,
    pub opacity: f32,
    /// Whether the per-feature price label is drawn next to the icon.
    pub show_label: bool,
    /// Fixed overlay text, the member count for clusters.
    pub text: Option<String>,
    pub icon: RgbaImage,
}

#[derive(Debug, Default)]
pub struct StyleCache {
    styles: HashMap<StyleKey, Rc<Style>>,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn clear(&mut self) {
        self.styles.clear();
    }

    pub fn get(&mut self, key: &StyleKey) -> Rc<Style> {
        if let Some(style) = self.styles.get(key) {
            return Rc::clone(style);
        }
        let style = Rc::new(build_style(key));
        self.styles.insert(key.clone(), Rc::clone(&style));
        style
    }

    pub fn marker(&mut self, category: &str, primary: bool) -> Rc<Style> {
        self.get(&StyleKey::Marker {
            category: category.to_string(),
            primary,
        })
    }

    pub fn cluster(&mut self, count: usize) -> Rc<Style> {
        self.get(&StyleKey::Cluster { count })
    }

    pub fn point_of_interest(&mut self) -> Rc<Style> {
        self.get(&StyleKey::PointOfInterest)
    }

    pub fn pulse(&mut self, category: &str, phase: u32) -> Rc<Style> {
        self.get(&StyleKey::Pulse {
            category: category.to_string(),
            phase,
        })
    }
}

/// Cluster badge radius: grows with log2 of the member count, clamped to 15..=30 px.
pub fn cluster_radius(count: usize) -> f64 {
    (12.0 + 3.0 * (count.max(1) as f64).log2()).clamp(CLUSTER_MIN_RADIUS, CLUSTER_MAX_RADIUS)
}

fn build_style(key: &StyleKey) -> Style {
    match key {
        StyleKey::Marker { category, primary } => {
            let (radius, opacity) = if *primary {
                (PRIMARY_RADIUS, 1.0)
            } else {
                (SECONDARY_RADIUS, SECONDARY_OPACITY)
            };
            disc_style(category_color(category), radius, opacity, *primary, None)
        }
        StyleKey::Cluster { count } => disc_style(
            CLUSTER_COLOR,
            cluster_radius(*count),
            1.0,
            false,
            Some(count.to_string()),
        ),
        StyleKey::PointOfInterest => disc_style(POI_COLOR, POI_RADIUS, 1.0, false, None),
        StyleKey::Pulse { category, phase } => {
            // Even phases swell, odd phases settle back.
            let (radius, opacity) = if phase % 2 == 0 {
                (PRIMARY_RADIUS * 1.6, 0.6)
            } else {
                (PRIMARY_RADIUS * 1.2, 1.0)
            };
            disc_style(category_color(category), radius, opacity, true, None)
        }
    }
}

fn disc_style(hex: &str, radius: f64, opacity: f32, show_label: bool, text: Option<String>) -> Style {
    let color = hex_to_rgba(hex, opacity);
    let stroke = hex_to_rgba(STROKE_COLOR, opacity);
    Style {
        radius,
        color,
        opacity,
        show_label,
        text,
        icon: draw_disc(radius, color, stroke),
    }
}

pub fn hex_to_rgba(hex: &str, opacity: f32) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([channel(0..2), channel(2..4), channel(4..6), alpha])
}

fn draw_disc(radius: f64, fill: Rgba<u8>, stroke: Rgba<u8>) -> RgbaImage {
    let size = (radius * 2.0).ceil() as u32 + 1;
    let c = size as f64 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f64 + 0.5 - c;
        let dy = y as f64 + 0.5 - c;
        let d = (dx * dx + dy * dy).sqrt();
        if d > radius {
            Rgba([0, 0, 0, 0])
        } else if d > radius - STROKE_WIDTH {
            stroke
        } else {
            fill
        }
    })
}
