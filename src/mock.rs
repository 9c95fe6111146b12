//! Mock backend, device, clock and sink for testing without hardware.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::clock::Clock;
use crate::config::ImageFormat;
use crate::encode::FrameSink;
use crate::error::{CapCamError, Result};
use crate::traits::{
    CaptureBackend, CaptureDevice, CapturedFrame, DeviceDescriptor, FourCC, Frame, FrameMetadata,
    Resolution,
};

/// Width of frames produced by [`MockDevice::frame`].
pub const MOCK_WIDTH: u32 = 64;
/// Height of frames produced by [`MockDevice::frame`].
pub const MOCK_HEIGHT: u32 = 48;

/// Descriptor for a mock device.
pub fn mock_descriptor(index: usize, name: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        index,
        name: name.to_owned(),
        path: PathBuf::from(format!("mock:{index}")),
    }
}

/// Backend handing out pre-built mock devices.
#[derive(Default)]
pub struct MockBackend {
    devices: Vec<String>,
    openable: RefCell<Vec<Option<MockDevice>>>,
}

impl MockBackend {
    /// Create a backend with no devices attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device under `name`.
    #[must_use]
    pub fn with_device(mut self, name: &str, device: MockDevice) -> Self {
        self.devices.push(name.to_owned());
        self.openable.get_mut().push(Some(device));
        self
    }

    /// Attach a device that enumerates but refuses to open.
    #[must_use]
    pub fn with_unopenable_device(mut self, name: &str) -> Self {
        self.devices.push(name.to_owned());
        self.openable.get_mut().push(None);
        self
    }
}

impl CaptureBackend for MockBackend {
    type Device = MockDevice;

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self
            .devices
            .iter()
            .enumerate()
            .map(|(index, name)| mock_descriptor(index, name))
            .collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<MockDevice> {
        self.openable
            .borrow_mut()
            .get_mut(descriptor.index)
            .and_then(Option::take)
            .ok_or_else(|| CapCamError::DeviceOpenFailed(format!("{} is busy", descriptor.name)))
    }
}

/// Observable state of a mock device, shared with the test.
#[derive(Debug, Default)]
pub struct MockState {
    running: Cell<bool>,
    stop_calls: Cell<u32>,
    configured: RefCell<Option<Resolution>>,
}

impl MockState {
    /// Whether the device is streaming.
    pub fn running(&self) -> bool {
        self.running.get()
    }

    /// How many times `stop` was called.
    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.get()
    }

    /// Resolution last passed to `set_resolution`.
    pub fn configured(&self) -> Option<Resolution> {
        self.configured.borrow().clone()
    }
}

/// Mock device delivering scripted frames.
///
/// Each `latest_frame` call consumes the next scripted entry; once the
/// script is exhausted every call returns the fallback frame.
pub struct MockDevice {
    resolutions: Vec<Resolution>,
    script: RefCell<VecDeque<Option<Frame>>>,
    fallback: Option<Frame>,
    fail_start: bool,
    never_running: bool,
    state: Rc<MockState>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a device offering a few resolutions and always delivering a
    /// color bar frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolutions: Vec::new(),
            script: RefCell::new(VecDeque::new()),
            fallback: Some(Self::frame()),
            fail_start: false,
            never_running: false,
            state: Rc::default(),
        }
        .with_resolutions(&[(320, 240), (1280, 720), (640, 480)])
    }

    /// Replace the resolution list.
    #[must_use]
    pub fn with_resolutions(mut self, sizes: &[(u32, u32)]) -> Self {
        self.resolutions = sizes
            .iter()
            .enumerate()
            .map(|(index, &(width, height))| Resolution {
                index,
                width,
                height,
                fourcc: FourCC::YUYV,
            })
            .collect();
        self
    }

    /// Frames (or gaps) returned by successive `latest_frame` calls.
    #[must_use]
    pub fn with_script(mut self, script: Vec<Option<Frame>>) -> Self {
        self.script = RefCell::new(script.into());
        self
    }

    /// Never deliver a frame once the script runs out.
    #[must_use]
    pub fn without_frames(mut self) -> Self {
        self.fallback = None;
        self
    }

    /// Make `start` fail.
    #[must_use]
    pub const fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Start successfully but never report a running pipeline.
    #[must_use]
    pub const fn never_running(mut self) -> Self {
        self.never_running = true;
        self
    }

    /// Handle on the device state that outlives the device.
    pub fn state(&self) -> Rc<MockState> {
        Rc::clone(&self.state)
    }

    /// A small color bar frame.
    pub fn frame() -> Frame {
        test_frame(MOCK_WIDTH, MOCK_HEIGHT, TestPattern::ColorBars)
    }

    /// A frame with no pixel data.
    pub fn empty_frame() -> Frame {
        Frame {
            data: Vec::new(),
            ..Self::frame()
        }
    }
}

impl CaptureDevice for MockDevice {
    fn supported_resolutions(&self) -> Result<Vec<Resolution>> {
        Ok(self.resolutions.clone())
    }

    fn set_resolution(&mut self, resolution: &Resolution) -> Result<()> {
        *self.state.configured.borrow_mut() = Some(resolution.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(CapCamError::Stream("VIDIOC_STREAMON: device busy".to_owned()));
        }
        self.state.running.set(!self.never_running);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.running.set(false);
        self.state.stop_calls.set(self.state.stop_calls.get() + 1);
    }

    fn is_running(&self) -> bool {
        self.state.running.get()
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Clock that records sleeps and advances its time by them.
pub struct FakeClock {
    now: Cell<NaiveDateTime>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    /// Clock starting at 2024-01-02 03:04:05.
    pub fn new() -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid start time");
        Self {
            now: Cell::new(start),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let step = chrono::Duration::from_std(duration).expect("duration in range");
        self.now.set(self.now.get() + step);
    }

    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// Sink that records saves without touching the file system.
#[derive(Default)]
pub struct RecordingSink {
    saved: RefCell<Vec<(u32, PathBuf)>>,
    fail_on: Option<u32>,
}

impl RecordingSink {
    /// Sink that accepts every frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the save of one shot.
    pub const fn failing_on(mut self, shot_index: u32) -> Self {
        self.fail_on = Some(shot_index);
        self
    }

    /// `(shot_index, path)` of every successful save.
    pub fn saved(&self) -> Vec<(u32, PathBuf)> {
        self.saved.borrow().clone()
    }
}

impl FrameSink for RecordingSink {
    fn save(&self, frame: &CapturedFrame, path: &Path, _format: ImageFormat) -> Result<()> {
        if self.fail_on == Some(frame.shot_index) {
            return Err(CapCamError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file system",
            )));
        }
        self.saved
            .borrow_mut()
            .push((frame.shot_index, path.to_path_buf()));
        Ok(())
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// Generate a YUYV frame with the given pattern.
pub fn test_frame(width: u32, height: u32, pattern: TestPattern) -> Frame {
    let size = (width * height * 2) as usize; // YUYV = 2 bytes/pixel
    let mut data = vec![0u8; size];

    match pattern {
        TestPattern::ColorBars => generate_color_bars(&mut data, width, height),
        TestPattern::Gradient => generate_gradient(&mut data, width, height),
        TestPattern::Solid(y, u, v) => generate_solid(&mut data, y, u, v),
    }

    Frame {
        data,
        width,
        height,
        stride: width * 2,
        fourcc: FourCC::YUYV,
        metadata: FrameMetadata {
            sequence: 0,
            timestamp: Duration::ZERO,
            #[allow(clippy::cast_possible_truncation)]
            bytes_used: size as u32,
        },
    }
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars[bar_idx];

            let offset = ((y * width + x) * 2) as usize;
            if offset + 3 < data.len() {
                data[offset] = y_val;
                data[offset + 1] = u_val;
                data[offset + 2] = y_val;
                data[offset + 3] = v_val;
            }
        }
    }
}

/// Generate YUYV horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32, height: u32) {
    for y in 0..height {
        for x in (0..width).step_by(2) {
            #[allow(clippy::cast_possible_truncation)]
            let y_val = ((x * 255) / width) as u8;
            let offset = ((y * width + x) * 2) as usize;

            if offset + 3 < data.len() {
                data[offset] = y_val;
                data[offset + 1] = 128;
                data[offset + 2] = y_val;
                data[offset + 3] = 128;
            }
        }
    }
}

/// Generate solid color YUYV frame.
fn generate_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for pixel_pair in data.chunks_exact_mut(4) {
        pixel_pair.copy_from_slice(&[y, u, y, v]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_script_then_fallback() {
        let device = MockDevice::new().with_script(vec![None, Some(MockDevice::empty_frame())]);
        assert!(device.latest_frame().is_none());
        assert!(device.latest_frame().is_some_and(|f| f.is_empty()));
        assert!(device.latest_frame().is_some_and(|f| !f.is_empty()));
    }

    #[test]
    fn test_mock_backend_opens_once() {
        let backend = MockBackend::new().with_device("Mock Camera", MockDevice::new());
        let descriptor = mock_descriptor(0, "Mock Camera");
        assert!(backend.open(&descriptor).is_ok());
        assert!(matches!(
            backend.open(&descriptor),
            Err(CapCamError::DeviceOpenFailed(_))
        ));
    }

    #[test]
    fn test_color_bars_pattern() {
        let frame = test_frame(640, 480, TestPattern::ColorBars);
        assert_eq!(frame.data.len(), 640 * 480 * 2);
        // First bar should be white (Y=235)
        assert_eq!(frame.data[0], 235);
    }

    #[test]
    fn test_solid_pattern() {
        let frame = test_frame(64, 64, TestPattern::Solid(128, 64, 192));
        assert_eq!(&frame.data[..4], &[128, 64, 128, 192]);
    }

    #[test]
    fn test_fake_clock_advances() {
        let clock = FakeClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(90));
        assert_eq!((clock.now() - start).num_seconds(), 90);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
    }
}
