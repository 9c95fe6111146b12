//! Run configuration: raw request, validated shot plan and resolved config.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CapCamError, Result};

/// Settle delay must be strictly below this many seconds.
pub const MAX_SETTLE_DELAY_SECS: i64 = 12;

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG (`jpg`).
    Jpeg,
    /// PNG (`png`).
    Png,
    /// Windows bitmap (`bmp`).
    Bmp,
}

impl ImageFormat {
    /// Lower-case file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = CapCamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            _ => Err(CapCamError::InvalidArgument(format!("wrong format: {s}"))),
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::Bmp => Self::Bmp,
        }
    }
}

/// How much diagnostic output a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Progress, device listings and per-shot results.
    #[default]
    Normal,
    /// Errors only.
    Quiet,
}

impl Verbosity {
    /// Default `tracing` filter directive for this verbosity.
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Normal => "info",
            Self::Quiet => "error",
        }
    }
}

/// Unvalidated run parameters as supplied by the user.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Device index or case-insensitive name substring.
    pub device: String,
    /// Seconds to wait between settle polls.
    pub settle_delay_secs: i64,
    /// Resolution index override; `None` picks the largest.
    pub resolution: Option<usize>,
    /// Number of images to capture.
    pub shot_count: i64,
    /// Seconds to wait after each shot.
    pub inter_shot_secs: i64,
    /// Image format name (`jpg`, `png` or `bmp`).
    pub format: String,
    /// Output filename template.
    pub output: Option<String>,
    /// Diagnostic output level.
    pub verbosity: Verbosity,
}

impl CaptureRequest {
    /// Create a request for `device` with the default timings and format.
    #[must_use]
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_owned(),
            settle_delay_secs: 2,
            resolution: None,
            shot_count: 1,
            inter_shot_secs: 1,
            format: ImageFormat::Jpeg.extension().to_owned(),
            output: None,
            verbosity: Verbosity::Normal,
        }
    }

    /// Validate the timing and format parameters.
    pub fn plan(&self) -> Result<ShotPlan> {
        if !(0..MAX_SETTLE_DELAY_SECS).contains(&self.settle_delay_secs) {
            return Err(CapCamError::InvalidArgument(format!(
                "wrong delay: {} (must be 0..{MAX_SETTLE_DELAY_SECS})",
                self.settle_delay_secs
            )));
        }
        let shot_count = u32::try_from(self.shot_count)
            .ok()
            .filter(|count| *count >= 1)
            .ok_or_else(|| {
                CapCamError::InvalidArgument(format!("wrong number: {}", self.shot_count))
            })?;
        if self.inter_shot_secs < 1 {
            return Err(CapCamError::InvalidArgument(format!(
                "wrong wait: {}",
                self.inter_shot_secs
            )));
        }
        let format = self.format.parse::<ImageFormat>()?;

        Ok(ShotPlan {
            settle_delay: secs(self.settle_delay_secs),
            shot_count,
            inter_shot_delay: secs(self.inter_shot_secs),
            format,
            template: self.output.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[allow(clippy::cast_sign_loss)]
const fn secs(value: i64) -> Duration {
    // Callers have already checked `value >= 0`.
    Duration::from_secs(value as u64)
}

/// Validated timing, count and output parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotPlan {
    settle_delay: Duration,
    shot_count: u32,
    inter_shot_delay: Duration,
    format: ImageFormat,
    template: Option<String>,
}

impl ShotPlan {
    /// Wait before each settle poll.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Number of shots, always at least one.
    #[must_use]
    pub const fn shot_count(&self) -> u32 {
        self.shot_count
    }

    /// Wait after each shot.
    #[must_use]
    pub const fn inter_shot_delay(&self) -> Duration {
        self.inter_shot_delay
    }

    /// Output image format.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// Output filename template, if one was given.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

/// Fully resolved parameters of one acquisition run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Index of the selected device.
    pub device_index: usize,
    /// Index of the selected resolution.
    pub resolution_index: usize,
    /// Validated timings and output settings.
    pub plan: ShotPlan,
}

impl fmt::Display for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -d{} -r{} -n{} -w{} -f{}",
            self.device_index,
            self.plan.settle_delay.as_secs(),
            self.resolution_index,
            self.plan.shot_count,
            self.plan.inter_shot_delay.as_secs(),
            self.plan.format
        )
    }
}
