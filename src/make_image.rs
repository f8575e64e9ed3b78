use image::{
    imageops::{self, FilterType},
    RgbaImage,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::warn;

use crate::{grid::FrameRect, wrappers::PixelExt};

pub const DEFAULT_TARGET_SIZE: u32 = 64;
pub const DEFAULT_MAX_CONTENT_SIZE: u32 = 54;

#[allow(missing_copy_implementations)]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("target size must be non-zero")]
    ZeroTargetSize,
    #[error("max content size must be non-zero")]
    ZeroContentSize,
    #[error("max content size {max_content_size} exceeds target size {target_size}")]
    ContentLargerThanTarget { max_content_size: u32, target_size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScaleMode {
    /// Same factor on both axes, aspect ratio kept
    #[default]
    Uniform,
    /// Resize content to exactly `max_content_size` square
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Width and height of the output canvas
    pub target_size: u32,
    /// Content larger than this on either axis is scaled down
    pub max_content_size: u32,
    /// Alpha above this counts towards the content bounding box
    pub bbox_alpha_threshold: u8,
    pub scale_mode: ScaleMode,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            bbox_alpha_threshold: 0,
            scale_mode: ScaleMode::Uniform,
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.target_size == 0 {
            return Err(NormalizeError::ZeroTargetSize);
        }
        if self.max_content_size == 0 {
            return Err(NormalizeError::ZeroContentSize);
        }
        if self.max_content_size > self.target_size {
            return Err(NormalizeError::ContentLargerThanTarget {
                max_content_size: self.max_content_size,
                target_size: self.target_size,
            });
        }
        Ok(())
    }
}

/// Tight box around content pixels, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Smallest rectangle holding every pixel with `alpha > alpha_threshold`.
/// `None` for a fully transparent image.
pub fn content_bbox(image: &RgbaImage, alpha_threshold: u8) -> Option<BoundingBox> {
    let mut min_xy = (u32::MAX, u32::MAX);
    let mut max_xy = (0, 0);
    let mut has_content = false;
    for (x, y, px) in image.enumerate_pixels() {
        if !px.is_content(alpha_threshold) {
            continue;
        }
        has_content = true;
        min_xy.0 = u32::min(min_xy.0, x);
        min_xy.1 = u32::min(min_xy.1, y);
        max_xy.0 = u32::max(max_xy.0, x + 1);
        max_xy.1 = u32::max(max_xy.1, y + 1);
    }
    has_content.then(|| BoundingBox {
        x: min_xy.0,
        y: min_xy.1,
        width: max_xy.0 - min_xy.0,
        height: max_xy.1 - min_xy.1,
    })
}

/// Copy of the region of `sheet` covered by `frame`
pub fn crop_frame(sheet: &RgbaImage, frame: &FrameRect) -> RgbaImage {
    imageops::crop_imm(sheet, frame.x_start, frame.y_start, frame.width(), frame.height()).to_image()
}

/// Top-left position that centers `content` in `canvas`, biased up/left on odd remainders
pub fn centered_offset(content: (u32, u32), canvas: (u32, u32)) -> (u32, u32) {
    (
        canvas.0.saturating_sub(content.0) / 2,
        canvas.1.saturating_sub(content.1) / 2,
    )
}

/// Dimensions after fitting `(width, height)` into a `max_content_size` budget
pub fn fitted_size(width: u32, height: u32, max_content_size: u32, mode: ScaleMode) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max_content_size {
        return (width, height);
    }
    match mode {
        ScaleMode::Uniform => {
            let scale = max_content_size as f64 / largest as f64;
            let scaled = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, max_content_size);
            (scaled(width), scaled(height))
        }
        ScaleMode::Stretch => (max_content_size, max_content_size),
    }
}

/// Crop a frame to its content, fit it into the content budget and center it on a
/// transparent `target_size` square.
///
/// A fully transparent frame gives a fully transparent canvas. Running this on its own
/// output returns the same pixels.
pub fn normalize_frame(frame: &RgbaImage, config: &NormalizeConfig) -> RgbaImage {
    let mut canvas = RgbaImage::new(config.target_size, config.target_size);

    let Some(bbox) = content_bbox(frame, config.bbox_alpha_threshold) else {
        warn!(
            width = frame.width(),
            height = frame.height(),
            "frame has no visible content, emitting transparent placeholder"
        );
        return canvas;
    };

    let content = imageops::crop_imm(frame, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
    let (width, height) =
        fitted_size(bbox.width, bbox.height, config.max_content_size, config.scale_mode);
    let content = if (width, height) == content.dimensions() {
        content
    } else {
        imageops::resize(&content, width, height, FilterType::Lanczos3)
    };

    let (x, y) = centered_offset(content.dimensions(), canvas.dimensions());
    // replace, not overlay: pixels are copied as-is with no alpha blending
    imageops::replace(&mut canvas, &content, x as i64, y as i64);
    canvas
}
