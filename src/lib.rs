//! Capcam: capture still images from a V4L2 webcam
//!
//! This library resolves a capture device, negotiates its largest (or a
//! chosen) resolution, waits for the stream to deliver a usable frame and
//! saves one or more stills. The device layer sits behind traits so the
//! acquisition logic runs against mock devices in tests.

pub mod capture;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod device;
pub mod encode;
pub mod error;
pub mod filename;
pub mod resolution;
pub mod scheduler;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use capture::run_capture;
pub use clock::{Clock, SystemClock};
pub use config::{CaptureConfig, CaptureRequest, ImageFormat, Verbosity};
pub use device::{V4L2Backend, V4L2Device};
pub use encode::{FrameSink, ImageFileWriter};
pub use error::{CapCamError, Result};
pub use scheduler::{AcquisitionReport, Settle, ShotOutcome};
pub use traits::{
    CaptureBackend, CaptureDevice, CapturedFrame, DeviceDescriptor, FourCC, Frame, FrameMetadata,
    Resolution,
};
