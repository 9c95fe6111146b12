//! End-to-end capture run: resolve the device, negotiate a resolution,
//! stream, acquire, release.

use tracing::info;

use crate::catalog::DeviceCatalog;
use crate::clock::Clock;
use crate::config::{CaptureConfig, CaptureRequest};
use crate::encode::FrameSink;
use crate::error::Result;
use crate::resolution::negotiate;
use crate::scheduler::{Acquisition, AcquisitionReport};
use crate::session::CaptureSession;
use crate::traits::{CaptureBackend, CaptureDevice};

/// Capture the stills described by `request`.
///
/// Arguments are validated before any device is touched. Missed or failed
/// shots are reported in the returned report rather than as errors; the
/// device is released on every path.
pub fn run_capture<B, C, S>(
    backend: &B,
    request: &CaptureRequest,
    clock: &C,
    sink: &S,
) -> Result<AcquisitionReport>
where
    B: CaptureBackend,
    C: Clock,
    S: FrameSink,
{
    let plan = request.plan()?;

    let catalog = DeviceCatalog::enumerate(backend)?;
    for device in catalog.devices() {
        info!("{:>3}: {}", device.index, device.name);
    }
    let descriptor = catalog.resolve(&request.device)?;

    let device = backend.open(descriptor)?;
    let resolutions = device.supported_resolutions()?;
    info!("Camera {} resolutions", descriptor.index);
    for resolution in &resolutions {
        info!("{:>3}: {}", resolution.index, resolution);
    }
    let resolution = negotiate(&resolutions, request.resolution)?.clone();

    let config = CaptureConfig {
        device_index: descriptor.index,
        resolution_index: resolution.index,
        plan,
    };

    let mut session = CaptureSession::open(device, descriptor.clone(), resolution)?;
    info!(
        "Camera {} \"{}\" streaming {}",
        session.descriptor().index,
        session.descriptor().name,
        session.resolution()
    );
    let report = Acquisition::new(&config, clock, sink).run(&session);
    session.close();

    Ok(report)
}
