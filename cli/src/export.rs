//! Offline helpers built on the geometry crate: widget placement reports and
//! SVG annotation export.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use geometry::Point;
use geometry::anchor::{self, Anchor, Placement, SnapConfig, SnapTransition};
use geometry::bbox::{self, BoxRect, Dimensions, NormalizedPos, NormalizedRanges, Size};
use geometry::drawing::{Annotation, Resolution, ScreenRect, StrokeStyle, ViewBoxTransform};
use serde::{Deserialize, Serialize};

use crate::CliError;

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Parse a `WxH` size. Fractional values are allowed.
pub fn parse_size(raw: &str) -> Result<Size, CliError> {
    let (w, h) = parse_pair(raw, ['x', 'X'])?;
    if w <= 0.0 || h <= 0.0 {
        return Err(CliError::InvalidArgument(format!("size must be positive: `{raw}`")));
    }
    Ok(Size::new(w, h))
}

/// Parse an `X,Y` pair.
pub fn parse_point(raw: &str) -> Result<Point, CliError> {
    let (x, y) = parse_pair(raw, [','])?;
    Ok(Point::new(x, y))
}

fn parse_pair<const N: usize>(raw: &str, separators: [char; N]) -> Result<(f64, f64), CliError> {
    let invalid = || CliError::InvalidArgument(format!("expected two numbers: `{raw}`"));
    let (a, b) = raw.trim().split_once(separators).ok_or_else(invalid)?;
    let a: f64 = a.trim().parse().map_err(|_| invalid())?;
    let b: f64 = b.trim().parse().map_err(|_| invalid())?;
    if !a.is_finite() || !b.is_finite() {
        return Err(invalid());
    }
    Ok((a, b))
}

// =============================================================================
// PLACEMENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceTarget {
    Normalized(NormalizedPos),
    Anchored(Anchor),
    /// Pixel drop point, relative to the video element.
    Drop(Point),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReport {
    pub size_px: Size,
    pub ranges: NormalizedRanges,
    pub placement: Placement,
    /// Box relative to the video element.
    pub rect: BoxRect,
    /// Box relative to the video's container.
    pub container: BoxRect,
    /// Normalized position of `rect`, as it would be stored on the device.
    pub normalized: NormalizedPos,
    pub contained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<SnapTransition>,
}

#[must_use]
pub fn place(dims: &Dimensions, logical: Size, target: PlaceTarget, snap: &SnapConfig) -> PlacementReport {
    let size_px = bbox::widget_size_px(dims, logical);
    let (placement, transition) = match target {
        PlaceTarget::Normalized(position) => (Placement::Free { position }, None),
        PlaceTarget::Anchored(anchor) => (Placement::from_parts(anchor, NormalizedPos::new(-1.0, -1.0)), None),
        PlaceTarget::Drop(point) => {
            let clamped = bbox::clamp_position(point, dims, size_px);
            let released = anchor::release(Anchor::None, clamped, size_px, dims, snap);
            (released.placement, Some(released.transition))
        }
    };

    let origin = placement.resolve(dims, size_px);
    let rect = BoxRect::new(origin, size_px);
    PlacementReport {
        size_px,
        ranges: bbox::normalized_ranges(dims, size_px),
        placement,
        rect,
        container: rect.to_container(dims),
        normalized: bbox::normalized_position(origin, dims, size_px),
        contained: rect.contained_in(dims),
        transition,
    }
}

// =============================================================================
// ANNOTATION
// =============================================================================

/// Annotation input: either strokes already in logical space, or pointer
/// positions captured on a screen rectangle.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnotationInput {
    Captured(Capture),
    Stored(Annotation),
}

#[derive(Debug, Deserialize)]
struct Capture {
    screen: ScreenRect,
    strokes: Vec<CapturedStroke>,
}

#[derive(Debug, Deserialize)]
struct CapturedStroke {
    tool: Tool,
    points: Vec<Point>,
    #[serde(default)]
    style: StrokeStyle,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Tool {
    Freehand,
    Rect,
}

/// Render an annotation input document to SVG. `resolution` overrides the
/// logical size; captured input defaults to 1920x1080.
pub fn render_annotation(raw: &str, resolution: Option<Resolution>) -> Result<String, CliError> {
    let annotation = match serde_json::from_str::<AnnotationInput>(raw)? {
        AnnotationInput::Captured(capture) => replay(capture, resolution.unwrap_or_default())?,
        AnnotationInput::Stored(mut stored) => {
            if let Some(resolution) = resolution {
                stored.resolution = resolution;
            }
            stored
        }
    };
    annotation.validate()?;
    Ok(annotation.to_svg())
}

fn replay(capture: Capture, resolution: Resolution) -> Result<Annotation, CliError> {
    let transform = ViewBoxTransform::meet(resolution, capture.screen)?;
    let mut annotation = Annotation::new(resolution);
    for stroke in capture.strokes {
        let Some((first, rest)) = stroke.points.split_first() else {
            continue;
        };
        match stroke.tool {
            Tool::Freehand => annotation.begin_freehand(*first, &transform, stroke.style),
            Tool::Rect => annotation.begin_rect(*first, &transform, stroke.style),
        }
        for point in rest {
            annotation.extend(*point, &transform);
        }
        annotation.finish();
    }
    Ok(annotation)
}
