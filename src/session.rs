//! Capture session: one device streaming at one negotiated resolution.

use tracing::{debug, warn};

use crate::error::{CapCamError, Result};
use crate::traits::{CaptureDevice, DeviceDescriptor, Frame, Resolution};

/// An opened, streaming device.
///
/// The device is stopped by [`CaptureSession::close`] or, failing that, when
/// the session is dropped, so every exit path releases it.
pub struct CaptureSession<D: CaptureDevice> {
    device: D,
    descriptor: DeviceDescriptor,
    resolution: Resolution,
    closed: bool,
}

impl<D: CaptureDevice> CaptureSession<D> {
    /// Configure `device` for `resolution` and start its frame pipeline.
    pub fn open(mut device: D, descriptor: DeviceDescriptor, resolution: Resolution) -> Result<Self> {
        let started = device
            .set_resolution(&resolution)
            .and_then(|()| device.start());

        if let Err(err) = started {
            device.stop();
            return Err(match err {
                err @ CapCamError::DeviceOpenFailed(_) => err,
                other => CapCamError::DeviceOpenFailed(other.to_string()),
            });
        }

        debug!(device = %descriptor.name, %resolution, "capture session started");
        Ok(Self {
            device,
            descriptor,
            resolution,
            closed: false,
        })
    }

    /// The device this session streams from.
    pub const fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// The negotiated resolution.
    pub const fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Whether the frame pipeline is running.
    pub fn is_running(&self) -> bool {
        !self.closed && self.device.is_running()
    }

    /// The most recently delivered frame. Never waits.
    pub fn current_frame(&self) -> Option<Frame> {
        if self.closed {
            return None;
        }
        self.device.latest_frame()
    }

    /// Stop the pipeline and release the device. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.device.stop();
        self.closed = true;
        debug!(device = %self.descriptor.name, "capture session closed");
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(device = %self.descriptor.name, "capture session dropped while open, stopping");
            self.close();
        }
    }
}
