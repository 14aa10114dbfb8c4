//! Bounding-box mapping between normalized device coordinates and pixels.
//!
//! The device stores an item's top-left corner as `(x, y)` in `[-1, 1]`,
//! where `-1` is the left/top frame edge. The usable upper bound shrinks as
//! the item grows so its far edge never leaves the frame:
//!
//! ```text
//! x_max = 1 - 2 * (item_px / frame_px)
//! pixel = (norm - min) / (max - min) * (frame_px - item_px)
//! ```
//!
//! Every conversion clamps, so a box computed here always lies inside the
//! video rectangle.

#[cfg(test)]
#[path = "bbox_test.rs"]
mod bbox_test;

use serde::{Deserialize, Serialize};

use crate::Point;
use crate::consts::{LOGICAL_WIDTH, NORMALIZED_MAX, NORMALIZED_MIN, RANGE_EPSILON};

/// On-screen description of the video element.
///
/// `video_*` is the native stream resolution, `pixel_*` the rendered size,
/// and `offset_*` the element's top-left offset inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub video_width: f64,
    pub video_height: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

impl Dimensions {
    /// Dimensions of a video rendered at `pixel_width x pixel_height` with no offset.
    #[must_use]
    pub fn rendered(video_width: f64, video_height: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { video_width, video_height, pixel_width, pixel_height, offset_x: 0.0, offset_y: 0.0 }
    }

    /// Ratio of rendered pixels to logical pixels.
    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        self.pixel_width / LOGICAL_WIDTH
    }
}

/// Width and height, in whatever unit the caller is working in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A device-side position in `[-1, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPos {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPos {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Valid normalized interval on each axis for an item of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRanges {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// A pixel rectangle relative to the video element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxRect {
    #[must_use]
    pub fn new(origin: Point, size: Size) -> Self {
        Self { x: origin.x, y: origin.y, width: size.width, height: size.height }
    }

    /// True when the rectangle lies within `[0, pixel_width] x [0, pixel_height]`.
    #[must_use]
    pub fn contained_in(&self, dims: &Dimensions) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= dims.pixel_width
            && self.y + self.height <= dims.pixel_height
    }

    /// The same rectangle in container coordinates (video offset applied).
    #[must_use]
    pub fn to_container(&self, dims: &Dimensions) -> Self {
        Self { x: self.x + dims.offset_x, y: self.y + dims.offset_y, ..*self }
    }
}

/// Item size in rendered pixels.
///
/// Logical sizes are scaled by [`Dimensions::scale_factor`] and capped at the
/// rendered frame so an oversized item can never exceed it.
#[must_use]
pub fn widget_size_px(dims: &Dimensions, logical: Size) -> Size {
    let scale = dims.scale_factor();
    Size {
        width: (logical.width * scale).min(dims.pixel_width),
        height: (logical.height * scale).min(dims.pixel_height),
    }
}

/// Normalized ranges for an item of `size_px` rendered pixels.
#[must_use]
pub fn normalized_ranges(dims: &Dimensions, size_px: Size) -> NormalizedRanges {
    NormalizedRanges {
        x_min: NORMALIZED_MIN,
        x_max: axis_max(size_px.width, dims.pixel_width),
        y_min: NORMALIZED_MIN,
        y_max: axis_max(size_px.height, dims.pixel_height),
    }
}

/// Normalized → pixel position relative to the video element.
#[must_use]
pub fn widget_position(norm: NormalizedPos, dims: &Dimensions, size_px: Size) -> Point {
    let ranges = normalized_ranges(dims, size_px);
    Point {
        x: axis_to_pixel(norm.x, ranges.x_min, ranges.x_max, dims.pixel_width, size_px.width),
        y: axis_to_pixel(norm.y, ranges.y_min, ranges.y_max, dims.pixel_height, size_px.height),
    }
}

/// Pixel → normalized position. Inverse of [`widget_position`], used when a
/// drag is released to persist the new location.
#[must_use]
pub fn normalized_position(pixel: Point, dims: &Dimensions, size_px: Size) -> NormalizedPos {
    let ranges = normalized_ranges(dims, size_px);
    NormalizedPos {
        x: axis_to_normalized(pixel.x, ranges.x_min, ranges.x_max, dims.pixel_width, size_px.width),
        y: axis_to_normalized(pixel.y, ranges.y_min, ranges.y_max, dims.pixel_height, size_px.height),
    }
}

/// Clamp an arbitrary pixel position (e.g. a raw drag) so the box stays in frame.
#[must_use]
pub fn clamp_position(pixel: Point, dims: &Dimensions, size_px: Size) -> Point {
    Point {
        x: pixel.x.clamp(0.0, travel(dims.pixel_width, size_px.width)),
        y: pixel.y.clamp(0.0, travel(dims.pixel_height, size_px.height)),
    }
}

fn axis_max(item: f64, frame: f64) -> f64 {
    if frame <= 0.0 {
        return NORMALIZED_MIN;
    }
    (NORMALIZED_MAX - 2.0 * (item / frame)).max(NORMALIZED_MIN)
}

fn travel(frame: f64, item: f64) -> f64 {
    (frame - item).max(0.0)
}

fn axis_to_pixel(norm: f64, min: f64, max: f64, frame: f64, item: f64) -> f64 {
    let travel = travel(frame, item);
    // Item fills the axis: it can only move along the other one.
    if travel <= 0.0 {
        return 0.0;
    }
    let range = (max - min).max(RANGE_EPSILON);
    ((norm - min) / range * travel).clamp(0.0, travel)
}

fn axis_to_normalized(pixel: f64, min: f64, max: f64, frame: f64, item: f64) -> f64 {
    let travel = travel(frame, item);
    if travel <= 0.0 {
        return min;
    }
    let max = max.max(min);
    (min + pixel / travel * (max - min)).clamp(min, max)
}
