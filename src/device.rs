//! V4L2 device implementation using the v4l crate.
//!
//! Streaming runs on a background thread that owns the device and an mmap
//! stream and keeps only the newest frame in a shared slot. The control
//! thread polls that slot and never blocks on the driver.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::context;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::error::{CapCamError, Result};
use crate::traits::{
    CaptureBackend, CaptureDevice, DeviceDescriptor, FourCC, Frame, FrameMetadata, Resolution,
};

/// Number of mmap buffers queued with the driver.
const BUFFER_COUNT: u32 = 4;

/// How long the capture thread waits for a frame before rechecking for stop.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Enumerates and opens `/dev/video*` capture devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4L2Backend;

impl CaptureBackend for V4L2Backend {
    type Device = V4L2Device;

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut nodes = context::enum_devices();
        nodes.sort_by_key(context::Node::index);

        let descriptors = nodes
            .iter()
            .filter_map(|node| {
                // Skip metadata and output nodes; only capture devices can be opened.
                let device = Device::with_path(node.path()).ok()?;
                let caps = device.query_caps().ok()?;
                let capture = caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    && caps.capabilities.contains(v4l::capability::Flags::STREAMING);
                capture.then(|| {
                    let name = node.name().unwrap_or(caps.card);
                    (name.trim().to_owned(), node.path().to_path_buf())
                })
            })
            .enumerate()
            .map(|(index, (name, path))| DeviceDescriptor { index, name, path })
            .collect();

        Ok(descriptors)
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<V4L2Device> {
        V4L2Device::open(descriptor)
    }
}

/// Frame pipeline state shared with the capture thread.
#[derive(Default)]
struct Shared {
    latest: Mutex<Option<Frame>>,
    running: AtomicBool,
    stop: AtomicBool,
}

/// V4L2 device implementation wrapping the v4l crate.
pub struct V4L2Device {
    path: PathBuf,
    /// `None` while the capture thread owns the device.
    device: Option<Device>,
    resolution: Option<Resolution>,
    /// Bytes per line of the configured format.
    stride: u32,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Device>>,
}

impl V4L2Device {
    /// Open the device node behind `descriptor`.
    pub fn open(descriptor: &DeviceDescriptor) -> Result<Self> {
        let device = Device::with_path(&descriptor.path).map_err(|err| {
            CapCamError::DeviceOpenFailed(format!("{}: {err}", descriptor.path.display()))
        })?;

        let caps = device
            .query_caps()
            .map_err(|err| CapCamError::DeviceOpenFailed(err.to_string()))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CapCamError::DeviceOpenFailed(format!(
                "{} ({}) cannot capture video",
                caps.card, caps.driver
            )));
        }
        debug!(card = %caps.card, driver = %caps.driver, bus = %caps.bus, "opened device");

        Ok(Self {
            path: descriptor.path.clone(),
            device: Some(device),
            resolution: None,
            stride: 0,
            shared: Arc::default(),
            worker: None,
        })
    }

    fn idle_device(&self) -> Result<&Device> {
        self.device
            .as_ref()
            .ok_or_else(|| CapCamError::Stream(format!("{} is streaming", self.path.display())))
    }
}

impl CaptureDevice for V4L2Device {
    fn supported_resolutions(&self) -> Result<Vec<Resolution>> {
        let device = self.idle_device()?;
        let formats = device
            .enum_formats()
            .map_err(|err| CapCamError::Stream(err.to_string()))?;

        let mut resolutions = Vec::new();
        for description in formats {
            let fourcc = FourCC::from(description.fourcc);
            if !fourcc.is_supported() {
                continue;
            }
            let sizes = device
                .enum_framesizes(description.fourcc)
                .map_err(|err| CapCamError::Stream(err.to_string()))?;
            for size in sizes {
                let (width, height) = match size.size {
                    FrameSizeEnum::Discrete(discrete) => (discrete.width, discrete.height),
                    FrameSizeEnum::Stepwise(stepwise) => (stepwise.max_width, stepwise.max_height),
                };
                resolutions.push(Resolution {
                    index: resolutions.len(),
                    width,
                    height,
                    fourcc,
                });
            }
        }

        Ok(resolutions)
    }

    fn set_resolution(&mut self, resolution: &Resolution) -> Result<()> {
        let device = self.idle_device()?;
        let mut fmt = device
            .format()
            .map_err(|err| CapCamError::Stream(err.to_string()))?;

        fmt.width = resolution.width;
        fmt.height = resolution.height;
        fmt.fourcc = resolution.fourcc.into();

        let fmt = device
            .set_format(&fmt)
            .map_err(|err| CapCamError::Stream(err.to_string()))?;

        let actual = Resolution {
            index: resolution.index,
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
        };
        if actual != *resolution {
            warn!(requested = %resolution, actual = %actual, "driver adjusted the format");
        }
        self.resolution = Some(actual);
        self.stride = fmt.stride;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let resolution = self
            .resolution
            .clone()
            .ok_or_else(|| CapCamError::DeviceOpenFailed("no resolution configured".to_owned()))?;
        let stride = self.stride;
        let device = self
            .device
            .take()
            .ok_or_else(|| CapCamError::DeviceOpenFailed("device unavailable".to_owned()))?;

        self.shared.stop.store(false, Ordering::Release);
        *self.shared.latest.lock() = None;

        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("capcam-capture".to_owned())
            .spawn(move || {
                let created = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT);
                match created {
                    Ok(mut stream) => {
                        stream.set_timeout(DEQUEUE_TIMEOUT);
                        let queue = MmapQueue {
                            stream,
                            resolution,
                            stride,
                        };
                        pump_frames(queue, &shared, &ready_tx);
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(format!("buffer allocation: {err}")));
                    }
                }
                device
            })
            .map_err(|err| CapCamError::DeviceOpenFailed(format!("capture thread: {err}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                Ok(())
            }
            Ok(Err(message)) => {
                self.device = handle.join().ok();
                Err(CapCamError::DeviceOpenFailed(message))
            }
            Err(_) => {
                self.device = handle.join().ok();
                Err(CapCamError::DeviceOpenFailed(
                    "capture thread exited during startup".to_owned(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        match handle.join() {
            Ok(device) => self.device = Some(device),
            Err(_) => warn!(path = %self.path.display(), "capture thread panicked"),
        }
        self.shared.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.shared.latest.lock().clone()
    }
}

impl Drop for V4L2Device {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Dequeue side of a buffer stream.
///
/// `next_frame` hands the previously returned buffer back to the driver
/// before waiting; the very first call queues every buffer and turns the
/// stream on. Both waits fail with [`io::ErrorKind::TimedOut`] when no frame
/// arrives in time, leaving the buffer with the driver.
trait FrameQueue {
    /// Requeue the last buffer and wait for the next frame.
    fn next_frame(&mut self) -> io::Result<Frame>;
    /// Wait for a buffer without requeueing and discard its contents.
    fn skip_frame(&mut self) -> io::Result<()>;
}

/// [`FrameQueue`] over a v4l mmap stream.
struct MmapQueue<'a> {
    stream: Stream<'a>,
    resolution: Resolution,
    stride: u32,
}

impl FrameQueue for MmapQueue<'_> {
    fn next_frame(&mut self) -> io::Result<Frame> {
        let (buf, meta) = V4lCaptureStream::next(&mut self.stream)?;
        let used = buf.get(..meta.bytesused as usize).unwrap_or(buf);

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        Ok(Frame {
            data: used.to_vec(),
            width: self.resolution.width,
            height: self.resolution.height,
            stride: self.stride,
            fourcc: self.resolution.fourcc,
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
            },
        })
    }

    fn skip_frame(&mut self) -> io::Result<()> {
        V4lCaptureStream::dequeue(&mut self.stream).map(|_| ())
    }
}

/// Tracks whether a timed-out wait left our buffer queued with the driver.
struct Pump<Q> {
    queue: Q,
    stalled: bool,
}

impl<Q: FrameQueue> Pump<Q> {
    const fn new(queue: Q) -> Self {
        Self {
            queue,
            stalled: false,
        }
    }

    /// Wait for one frame. `Ok(None)` means the wait timed out.
    ///
    /// After a timeout the driver still holds the buffer `next_frame` would
    /// requeue, so the pump first waits for any buffer to come back.
    fn poll(&mut self) -> io::Result<Option<Frame>> {
        if self.stalled {
            match self.queue.skip_frame() {
                Ok(()) => self.stalled = false,
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(err) => return Err(err),
            }
        }
        match self.queue.next_frame() {
            Ok(frame) => Ok(Some(frame)),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                self.stalled = true;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Start `queue`, report the outcome on `ready`, then dequeue frames into
/// the shared slot until asked to stop.
fn pump_frames<Q: FrameQueue>(
    queue: Q,
    shared: &Shared,
    ready: &Sender<std::result::Result<(), String>>,
) {
    let mut pump = Pump::new(queue);

    // A timeout here still means the stream is on.
    match pump.poll() {
        Ok(frame) => {
            if let Some(frame) = frame {
                *shared.latest.lock() = Some(frame);
            }
            shared.running.store(true, Ordering::Release);
            let _ = ready.send(Ok(()));
        }
        Err(err) => {
            let _ = ready.send(Err(format!("stream start: {err}")));
            return;
        }
    }

    while !shared.stop.load(Ordering::Acquire) {
        match pump.poll() {
            Ok(Some(frame)) => *shared.latest.lock() = Some(frame),
            Ok(None) => debug!("no frame within {DEQUEUE_TIMEOUT:?}"),
            Err(err) => {
                warn!("stream error: {err}");
                break;
            }
        }
    }
    shared.running.store(false, Ordering::Release);
}
