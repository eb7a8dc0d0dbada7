use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("coordinate is not finite: ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },

    #[error("latitude {lat} outside the projectable range")]
    LatitudeOutOfRange { lat: f64 },

    #[error("extent is empty or not finite")]
    InvalidExtent,

    #[error("viewport has no size yet")]
    ZeroSizedViewport,

    #[error("unsupported record file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T, E = MapError> = std::result::Result<T, E>;
