//! Error types for capcam.
//!
//! Every failure is funnelled through [`CapCamError`]. Variants up to
//! `DeviceOpenFailed` are expected, validated failures; the rest are
//! unexpected and reported differently by the binary.

use thiserror::Error;

use crate::traits::FourCC;

/// Error type for capture operations.
#[derive(Debug, Error)]
pub enum CapCamError {
    /// Malformed or out-of-range argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// Enumeration returned no capture devices.
    #[error("no cameras")]
    NoDevicesFound,

    /// Identifier did not resolve to an enumerated device.
    #[error("wrong device: {0}")]
    InvalidDevice(String),

    /// The opened device reported no capture resolutions.
    #[error("no camera resolutions")]
    NoResolutionsFound,

    /// Requested resolution index is out of bounds.
    #[error("wrong resolution id {index} (device has {available})")]
    InvalidResolution {
        /// Requested index.
        index: usize,
        /// Number of resolutions the device offers.
        available: usize,
    },

    /// The capture subsystem refused to open or start the device.
    #[error("failed to open device: {0}")]
    DeviceOpenFailed(String),

    /// Frame pixel format has no encoder.
    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(FourCC),

    /// Failure while talking to the capture backend.
    #[error("stream error: {0}")]
    Stream(String),

    /// Image decoding or encoding failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CapCamError {
    /// Whether this is a recognized user or configuration error, as opposed
    /// to an unexpected internal failure.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::NoDevicesFound
                | Self::InvalidDevice(_)
                | Self::NoResolutionsFound
                | Self::InvalidResolution { .. }
                | Self::DeviceOpenFailed(_)
        )
    }
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CapCamError>;
