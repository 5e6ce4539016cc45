use thiserror::Error;

/// Errors raised by the geometry and coordinate conversion helpers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid bounds: xmin={xmin}, ymin={ymin}, xmax={xmax}, ymax={ymax} (min must not exceed max)")]
    InvalidBounds {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },

    #[error("bbox corner index {0} out of range (expected 0..4)")]
    IndexOutOfRange(usize),

    #[error("unsupported operand for containment check: {0}")]
    UnsupportedOperand(String),

    #[error("{axis} {value}° is outside the web mercator range (±{limit}°)")]
    CoordinateOutOfRange {
        axis: &'static str,
        value: f64,
        limit: f64,
    },

    #[error("zoom level {zoom} exceeds the maximum of {max}")]
    ZoomOutOfRange { zoom: u8, max: u8 },

    #[error("projection failed: {0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, Error>;
