use crate::types::PointOfInterest;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub records: PathBuf, // .json or .csv
    #[serde(default)]
    pub visible_ids: Vec<i64>,
    pub selected_id: Option<i64>,
    pub point_of_interest: Option<PointOfInterest>,
}

/// Map session settings. Every field has a default so a session can be built without
/// a config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Popups closer than this to a map edge trigger an auto-pan.
    pub popup_margin: f64,
    /// Vertical gap between marker and popup.
    pub popup_offset: f64,
    pub fit_padding: f64,
    /// Extra pixels added to marker radii when hit testing clicks.
    pub hit_tolerance: f64,
    pub init_fallback_ms: f64,
    pub pan_duration_ms: f64,
    pub pulse_cycles: u32,
    pub pulse_interval_ms: f64,
    pub background: String, // Hex code
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            center_lat: 40.4168,
            center_lon: -3.7038,
            zoom: 12.0,
            min_zoom: 2.0,
            max_zoom: 19.0,
            popup_margin: 30.0,
            popup_offset: 15.0,
            fit_padding: 50.0,
            hit_tolerance: 4.0,
            init_fallback_ms: 500.0,
            pan_duration_ms: 500.0,
            pulse_cycles: 3,
            pulse_interval_ms: 150.0,
            background: "#e9eef2".to_string(),
        }
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_zoom.is_finite() || !self.max_zoom.is_finite() {
            bail!("zoom limits must be finite numbers");
        }
        if self.min_zoom > self.max_zoom {
            bail!(
                "min_zoom ({}) is greater than max_zoom ({})",
                self.min_zoom,
                self.max_zoom
            );
        }
        if !self.zoom.is_finite() {
            bail!("zoom must be a finite number");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub snapshot: PathBuf,
    pub geojson: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot: PathBuf::from("map.png"),
            geojson: PathBuf::from("features.geojson"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        config
            .map
            .validate()
            .with_context(|| format!("Invalid [map] section in {:?}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            records = "listings.json"
            visible_ids = [1, 2]

            [map]
            zoom = 14.0
            "#,
        )
        .unwrap();
        assert_eq!(config.input.visible_ids, vec![1, 2]);
        assert_eq!(config.map.zoom, 14.0);
        assert_eq!(config.map.popup_margin, 30.0);
        assert_eq!(config.output.snapshot, PathBuf::from("map.png"));
        assert!(config.input.point_of_interest.is_none());
    }

    #[test]
    fn point_of_interest_section_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            records = "listings.csv"

            [input.point_of_interest]
            name = "University"
            latitude = 40.45
            longitude = -3.72
            "#,
        )
        .unwrap();
        let poi = config.input.point_of_interest.unwrap();
        assert_eq!(poi.name, "University");
    }

    #[test]
    fn inverted_zoom_limits_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [input]
            records = "listings.json"

            [map]
            min_zoom = 18.0
            max_zoom = 3.0
            "#,
        )
        .unwrap();
        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("min_zoom"));

        assert!(MapConfig::default().validate().is_ok());
    }
}
