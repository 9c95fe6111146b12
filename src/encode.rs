//! Frame to image conversion and saving.

use std::path::Path;

use image::RgbImage;

use crate::config::ImageFormat;
use crate::error::{CapCamError, Result};
use crate::traits::{CapturedFrame, FourCC, Frame};

/// Writes a captured frame to an image file.
pub trait FrameSink {
    /// Encode `frame` as `format` and write it to `path`.
    fn save(&self, frame: &CapturedFrame, path: &Path, format: ImageFormat) -> Result<()>;
}

/// [`FrameSink`] that encodes with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileWriter;

impl FrameSink for ImageFileWriter {
    fn save(&self, frame: &CapturedFrame, path: &Path, format: ImageFormat) -> Result<()> {
        let image = to_rgb_image(&frame.frame)?;
        image.save_with_format(path, format.into())?;
        Ok(())
    }
}

/// Convert a raw device frame into an RGB image.
pub fn to_rgb_image(frame: &Frame) -> Result<RgbImage> {
    match frame.fourcc {
        FourCC::YUYV => yuyv_to_rgb(frame),
        FourCC::MJPG => {
            let decoded = image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)?;
            Ok(decoded.to_rgb8())
        }
        FourCC::RGB3 => {
            let data = packed_rows(frame, 3)?;
            let expected = data.len();
            RgbImage::from_raw(frame.width, frame.height, data)
                .ok_or_else(|| short_frame(frame, expected))
        }
        other => Err(CapCamError::UnsupportedPixelFormat(other)),
    }
}

/// Convert packed YUYV 4:2:2 (`[Y0 U Y1 V]` per pixel pair) to RGB.
fn yuyv_to_rgb(frame: &Frame) -> Result<RgbImage> {
    let data = packed_rows(frame, 2)?;
    let expected = data.len();

    let mut rgb = Vec::with_capacity(pixel_count(frame) * 3);
    for pair in data.chunks_exact(4) {
        if let &[y0, u, y1, v] = pair {
            let (r, g, b) = yuv_to_rgb(y0, u, v);
            rgb.extend_from_slice(&[r, g, b]);
            let (r, g, b) = yuv_to_rgb(y1, u, v);
            rgb.extend_from_slice(&[r, g, b]);
        }
    }

    RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(|| short_frame(frame, expected))
}

/// Copy the visible bytes of every line, dropping any padding the driver
/// adds after each one. A zero stride means lines are unpadded.
fn packed_rows(frame: &Frame, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    let line = frame.width as usize * bytes_per_pixel;
    let stride = match frame.stride as usize {
        0 => line,
        stride => stride,
    };
    if stride < line {
        return Err(CapCamError::Stream(format!(
            "{} frame stride {stride} is shorter than its {line} byte lines",
            frame.fourcc
        )));
    }

    let height = frame.height as usize;
    let expected = height.saturating_sub(1) * stride + line;
    let mut packed = Vec::with_capacity(line * height);
    for row in 0..height {
        let start = row * stride;
        let bytes = frame
            .data
            .get(start..start + line)
            .ok_or_else(|| short_frame(frame, expected))?;
        packed.extend_from_slice(bytes);
    }
    Ok(packed)
}

const fn pixel_count(frame: &Frame) -> usize {
    frame.width as usize * frame.height as usize
}

fn short_frame(frame: &Frame, expected: usize) -> CapCamError {
    CapCamError::Stream(format!(
        "{} frame {}x{} has {} bytes, expected {expected}",
        frame.fourcc,
        frame.width,
        frame.height,
        frame.data.len()
    ))
}

/// Convert YUV values to RGB.
///
/// Uses the ITU-R BT.601 conversion formula.
///
/// # Arguments
///
/// * `y` - Luminance value (16-235 for studio range)
/// * `u` - Blue-difference chroma value (16-240)
/// * `v` - Red-difference chroma value (16-240)
///
/// # Returns
///
/// RGB tuple with values clamped to 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |val: f32| -> u8 { val.clamp(0.0, 255.0) as u8 };

    (clamp(r), clamp(g), clamp(b))
}
