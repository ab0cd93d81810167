//! Error types for capture tracking and matte compositing

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for capture and compositing operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Error types raised inside the capture pipeline
///
/// None of these escape a [`CaptureSessionTracker`](crate::capture::CaptureSessionTracker):
/// the tracker classifies every error with [`CaptureError::failure_kind`] and hands it to
/// the [`ErrorPolicy`](crate::policy::ErrorPolicy) table, which logs it and decides whether
/// the stage is skipped, degraded, or the request goes straight to finalize.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors from the image crate
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Error reported by the capture hardware alongside a lifecycle event
    #[error("Capture hardware error: {0}")]
    Hardware(String),

    /// Expected capture data never arrived
    #[error("Missing capture data: {0}")]
    MissingData(String),

    /// The working color space could not be resolved
    #[error("Color space error: {0}")]
    ColorSpace(String),

    /// An image carried no usable pixel data
    #[error("Missing pixel data: {0}")]
    MissingPixelData(String),

    /// The matte category is not supported by the compositor
    #[error("Unsupported matte: {0}")]
    UnsupportedMatte(String),

    /// Blending produced no output
    #[error("Blend failed: {0}")]
    BlendFailed(String),

    /// Container encoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The asset store rejected or failed the save
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The asset store refused authorization
    #[error("Not authorized to save to the asset store")]
    NotAuthorized,

    /// Temporary file cleanup failed
    #[error("Cleanup error: {0}")]
    Cleanup(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lifecycle event arrived after the request was finalized
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Category of a failure in the capture error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Error delivered by the capture hardware with an event
    HardwareCapture,
    /// No primary image bytes at finish time
    MissingData,
    /// A single matte could not be composited
    Compositing,
    /// The blend step produced nothing; a raw matte can be stored instead
    BlendFallback,
    /// Authorization denied or store write failure
    Persistence,
    /// Temporary file deletion failed
    Cleanup,
    /// Event received after finalization
    ProtocolViolation,
    /// Invalid configuration supplied by the caller
    Configuration,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::HardwareCapture => "hardware-capture",
            Self::MissingData => "missing-data",
            Self::Compositing => "compositing",
            Self::BlendFallback => "blend-fallback",
            Self::Persistence => "persistence",
            Self::Cleanup => "cleanup",
            Self::ProtocolViolation => "protocol-violation",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

impl CaptureError {
    /// Create a new hardware error
    pub fn hardware<S: Into<String>>(msg: S) -> Self {
        Self::Hardware(msg.into())
    }

    /// Create a new missing data error
    pub fn missing_data<S: Into<String>>(msg: S) -> Self {
        Self::MissingData(msg.into())
    }

    /// Create a new color space error
    pub fn color_space<S: Into<String>>(msg: S) -> Self {
        Self::ColorSpace(msg.into())
    }

    /// Create a new missing pixel data error
    pub fn missing_pixel_data<S: Into<String>>(msg: S) -> Self {
        Self::MissingPixelData(msg.into())
    }

    /// Create a new unsupported matte error
    pub fn unsupported_matte<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedMatte(msg.into())
    }

    /// Create a new blend failure
    pub fn blend_failed<S: Into<String>>(msg: S) -> Self {
        Self::BlendFailed(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a new cleanup error
    pub fn cleanup<S: Into<String>>(msg: S) -> Self {
        Self::Cleanup(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new protocol violation error
    pub fn protocol_violation<S: Into<String>>(msg: S) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Classify this error in the capture failure taxonomy
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Hardware(_) => FailureKind::HardwareCapture,
            Self::MissingData(_) => FailureKind::MissingData,
            Self::ColorSpace(_)
            | Self::MissingPixelData(_)
            | Self::UnsupportedMatte(_)
            | Self::Encoding(_)
            | Self::Image(_) => FailureKind::Compositing,
            Self::BlendFailed(_) => FailureKind::BlendFallback,
            Self::Persistence(_) | Self::NotAuthorized => FailureKind::Persistence,
            Self::Cleanup(_) | Self::Io(_) => FailureKind::Cleanup,
            Self::ProtocolViolation(_) => FailureKind::ProtocolViolation,
            Self::InvalidConfig(_) | Self::Internal(_) => FailureKind::Configuration,
        }
    }
}
