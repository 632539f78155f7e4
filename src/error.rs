//! Error types for the frame pipeline and its external services
//!
//! The pipeline never propagates these to its caller. They exist so each
//! failure can be logged with a precise cause at the point it happens.

use thiserror::Error;

/// Malformed camera input. Fatal for the frame it was raised on only.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame reports a zero width or height
    #[error("frame has empty dimensions {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    /// A plane buffer cannot hold the declared stride layout
    #[error("{plane} plane too small: {actual} bytes, layout needs {required}")]
    PlaneTooSmall {
        plane: &'static str,
        required: usize,
        actual: usize,
    },

    /// Stride metadata that cannot describe a plane
    #[error("{plane} plane has invalid strides (row {row_stride}, pixel {pixel_stride})")]
    InvalidStride {
        plane: &'static str,
        row_stride: usize,
        pixel_stride: usize,
    },

    /// Rotation outside {0, 90, 180, 270}
    #[error("unsupported rotation of {0} degrees")]
    UnsupportedRotation(u32),

    /// JPEG encode or decode failed
    #[error("image codec failure: {0}")]
    Codec(#[from] image::ImageError),
}

/// Failure reported by, or while talking to, the text recognition service
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("recognition request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("recognition service returned status {0}")]
    Status(u16),

    /// Response body was not the expected block/line structure
    #[error("invalid recognition response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    /// Service reported an error in its payload
    #[error("recognition service error: {0}")]
    Service(String),
}

/// Failure fetching exchange rates
#[derive(Debug, Error)]
pub enum RateError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("rate request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Rate service answered with a non-success status
    #[error("rate service returned status {0}")]
    Status(u16),

    /// Response body was not a rate table
    #[error("invalid rate response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}
