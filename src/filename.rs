//! Output filename policy.

use std::path::{is_separator, PathBuf};

use chrono::NaiveDateTime;

use crate::config::{CaptureConfig, ImageFormat};

/// Base name used when none is given.
pub const DEFAULT_BASENAME: &str = "capcam";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Derives the output path of each shot from the run configuration.
#[derive(Debug, Clone)]
pub struct FilenamePolicy {
    template: Option<String>,
    shot_count: u32,
    device_index: usize,
    format: ImageFormat,
}

impl FilenamePolicy {
    /// Build the policy for one run.
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            template: config.plan.template().map(str::to_owned),
            shot_count: config.plan.shot_count(),
            device_index: config.device_index,
            format: config.plan.format(),
        }
    }

    /// Output path for the shot captured at `now`.
    ///
    /// Without a template the name is `capcam{device}-{timestamp}.{format}`.
    /// With one, an empty base name becomes `capcam`, an empty extension
    /// becomes the format, and multi-shot runs append the timestamp to the
    /// base name. Shots within the same second get the same name.
    #[must_use]
    pub fn derive(&self, now: NaiveDateTime) -> PathBuf {
        let timestamp = now.format(TIMESTAMP_FORMAT);

        let Some(template) = self.template.as_deref() else {
            return PathBuf::from(format!(
                "{DEFAULT_BASENAME}{}-{timestamp}.{}",
                self.device_index,
                self.format.extension()
            ));
        };

        let (directory, file_name) = split_directory(template);
        let (base, extension) = split_extension(file_name);

        let mut base = if base.is_empty() {
            DEFAULT_BASENAME.to_owned()
        } else {
            base.to_owned()
        };
        let extension = if extension.is_empty() {
            self.format.extension()
        } else {
            extension
        };
        if self.shot_count > 1 {
            base.push_str(&timestamp.to_string());
        }

        PathBuf::from(directory).join(format!("{base}.{extension}"))
    }
}

/// Split at the last path separator; the directory keeps its separator.
fn split_directory(template: &str) -> (&str, &str) {
    match template.rfind(is_separator) {
        Some(pos) => template.split_at(pos + 1),
        None => ("", template),
    }
}

/// Split a file name into base and extension (without the dot).
///
/// `"a.tar.gz"` gives `("a.tar", "gz")`, `".png"` gives `("", "png")` and
/// `"out."` gives `("out", "")`.
fn split_extension(file_name: &str) -> (&str, &str) {
    file_name
        .rsplit_once('.')
        .unwrap_or((file_name, ""))
}
