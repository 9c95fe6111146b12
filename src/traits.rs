//! Core traits and types for the capture backend abstraction.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::error::Result;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");

    /// Pixel formats the encoder knows how to turn into an image.
    pub const SUPPORTED: [Self; 3] = [Self::YUYV, Self::MJPG, Self::RGB3];

    /// Whether frames in this format can be encoded.
    #[must_use]
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Identity of one capture-capable device, as enumerated by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Position in the enumeration order.
    pub index: usize,
    /// Display name reported by the driver.
    pub name: String,
    /// Opaque handle used to open the device (the device node for V4L2).
    pub path: PathBuf,
}

/// One capture resolution supported by an opened device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Position in the device's resolution list.
    pub index: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format the device delivers at this size.
    pub fourcc: FourCC,
}

impl Resolution {
    /// `(width, height)`, the key resolutions are compared by.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} {}", self.width, self.height, self.fourcc)
    }
}

/// Metadata for a captured frame.
#[derive(Debug, Clone, Default)]
pub struct FrameMetadata {
    /// Driver frame sequence number.
    pub sequence: u32,
    /// Driver capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A raw video frame as delivered by the device.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bytes per line including driver padding; zero for compressed formats.
    pub stride: u32,
    /// Pixel format of `data`.
    pub fourcc: FourCC,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Whether the frame carries no pixel data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A frame taken for one shot of a capture run.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// The device frame.
    pub frame: Frame,
    /// Shot number within the run, starting at zero.
    pub shot_index: u32,
    /// Local wall-clock time the shot was taken.
    pub captured_at: NaiveDateTime,
}

/// Source of capture devices.
pub trait CaptureBackend {
    /// The device type returned by `open`.
    type Device: CaptureDevice;

    /// List the capture devices currently attached, in a stable order.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open the device behind a descriptor.
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Device>;
}

/// An opened capture device with a push-based frame pipeline.
pub trait CaptureDevice {
    /// Resolutions the device can deliver, in driver order.
    fn supported_resolutions(&self) -> Result<Vec<Resolution>>;

    /// Configure the device for a resolution. Must be called before `start`.
    fn set_resolution(&mut self, resolution: &Resolution) -> Result<()>;

    /// Start delivering frames in the background.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering frames. Safe to call repeatedly or before `start`.
    fn stop(&mut self);

    /// Whether the frame pipeline is currently running.
    fn is_running(&self) -> bool;

    /// The most recently delivered frame, if any arrived since `start`.
    fn latest_frame(&self) -> Option<Frame>;
}
