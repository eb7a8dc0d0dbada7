//! Headless map core for a student-housing marketplace.
//!
//! Records come in pre-fetched, in either of the two listing shapes. The session places
//! them on a Web Mercator plane, spreads out listings that share a location, clusters
//! them per zoom level and answers clicks with popups and selection events.

pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod popup;
pub mod processing;
pub mod projection;
pub mod render;
pub mod resolve;
pub mod schedule;
pub mod session;
pub mod style;
pub mod types;

pub use config::{AppConfig, MapConfig};
pub use error::MapError;
pub use session::{LayerMode, MapSession};
pub use types::{GeoRecord, MapEvent, PointOfInterest};
