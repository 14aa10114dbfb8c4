//! Symbolic anchors and snap-to-edge behaviour.
//!
//! While an item is dragged its box is tested against proximity zones near
//! the frame edges and centre lines. On release the first matching zone
//! becomes the item's anchor, otherwise the free normalized position is kept.
//! Zones are checked in a fixed order (centre, top/bottom centre, left/right
//! centre, corners); when thresholds overlap the earlier zone wins.

#[cfg(test)]
#[path = "anchor_test.rs"]
mod anchor_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Point;
use crate::bbox::{Dimensions, NormalizedPos, Size, normalized_position, widget_position};
use crate::consts::{ANCHOR_EDGE_OFFSET_PX, DEFAULT_SNAP_THRESHOLD};
use crate::error::GeometryError;

/// Symbolic position relative to the frame edges and centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    #[default]
    None,
}

impl Anchor {
    pub const ALL: [Anchor; 10] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::CenterLeft,
        Anchor::Center,
        Anchor::CenterRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
        Anchor::None,
    ];

    /// Wire name, as used by the device and the console.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::TopLeft => "topLeft",
            Anchor::TopCenter => "topCenter",
            Anchor::TopRight => "topRight",
            Anchor::CenterLeft => "centerLeft",
            Anchor::Center => "center",
            Anchor::CenterRight => "centerRight",
            Anchor::BottomLeft => "bottomLeft",
            Anchor::BottomCenter => "bottomCenter",
            Anchor::BottomRight => "bottomRight",
            Anchor::None => "none",
        }
    }

    #[must_use]
    pub fn is_anchored(self) -> bool {
        self != Anchor::None
    }

    fn horizontal(self) -> Option<Align> {
        match self {
            Anchor::TopLeft | Anchor::CenterLeft | Anchor::BottomLeft => Some(Align::Start),
            Anchor::TopCenter | Anchor::Center | Anchor::BottomCenter => Some(Align::Middle),
            Anchor::TopRight | Anchor::CenterRight | Anchor::BottomRight => Some(Align::End),
            Anchor::None => None,
        }
    }

    fn vertical(self) -> Option<Align> {
        match self {
            Anchor::TopLeft | Anchor::TopCenter | Anchor::TopRight => Some(Align::Start),
            Anchor::CenterLeft | Anchor::Center | Anchor::CenterRight => Some(Align::Middle),
            Anchor::BottomLeft | Anchor::BottomCenter | Anchor::BottomRight => Some(Align::End),
            Anchor::None => None,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GeometryError::UnknownAnchor(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Start,
    Middle,
    End,
}

fn align_axis(align: Align, frame: f64, item: f64) -> f64 {
    match align {
        Align::Start => -ANCHOR_EDGE_OFFSET_PX,
        Align::Middle => (frame - item) / 2.0,
        Align::End => frame - item + ANCHOR_EDGE_OFFSET_PX,
    }
}

/// Pixel position of an anchored item, or `None` for [`Anchor::None`].
///
/// Edge-anchored sides sit one pixel outside the frame so the box outline
/// lines up with the edge; `topLeft` is therefore `(-1, -1)`.
#[must_use]
pub fn anchor_position(anchor: Anchor, dims: &Dimensions, size_px: Size) -> Option<Point> {
    let (h, v) = (anchor.horizontal()?, anchor.vertical()?);
    Some(Point {
        x: align_axis(h, dims.pixel_width, size_px.width),
        y: align_axis(v, dims.pixel_height, size_px.height),
    })
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Where an item is: pinned to an anchor, or free at a normalized position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Placement {
    Anchored { anchor: Anchor },
    Free { position: NormalizedPos },
}

impl Placement {
    /// Build a placement from the device's `(anchor, position)` pair. A set
    /// anchor overrides the stored position.
    #[must_use]
    pub fn from_parts(anchor: Anchor, position: NormalizedPos) -> Self {
        if anchor.is_anchored() { Placement::Anchored { anchor } } else { Placement::Free { position } }
    }

    #[must_use]
    pub fn anchor(&self) -> Anchor {
        match self {
            Placement::Anchored { anchor } => *anchor,
            Placement::Free { .. } => Anchor::None,
        }
    }

    /// Pixel position of the item's top-left corner relative to the video.
    #[must_use]
    pub fn resolve(&self, dims: &Dimensions, size_px: Size) -> Point {
        match self {
            Placement::Anchored { anchor } => anchor_position(*anchor, dims, size_px)
                .unwrap_or_else(|| widget_position(NormalizedPos::new(-1.0, -1.0), dims, size_px)),
            Placement::Free { position } => widget_position(*position, dims, size_px),
        }
    }
}

// =============================================================================
// SNAPPING
// =============================================================================

/// Snap behaviour. `threshold` is a fraction of the frame size per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapConfig {
    pub threshold: f64,
    pub enabled: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { threshold: DEFAULT_SNAP_THRESHOLD, enabled: true }
    }
}

/// Which proximity zones a box currently touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapZones {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
    pub h_center: bool,
    pub v_center: bool,
}

impl SnapZones {
    /// Zones touched by a box at `pos` (top-left, video-relative pixels).
    #[must_use]
    pub fn of(pos: Point, size_px: Size, dims: &Dimensions, threshold: f64) -> Self {
        let tx = dims.pixel_width * threshold;
        let ty = dims.pixel_height * threshold;
        let center_x = pos.x + size_px.width / 2.0;
        let center_y = pos.y + size_px.height / 2.0;
        Self {
            top: pos.y <= ty,
            bottom: dims.pixel_height - (pos.y + size_px.height) <= ty,
            left: pos.x <= tx,
            right: dims.pixel_width - (pos.x + size_px.width) <= tx,
            h_center: (center_x - dims.pixel_width / 2.0).abs() <= tx,
            v_center: (center_y - dims.pixel_height / 2.0).abs() <= ty,
        }
    }

    /// Resolve touched zones to a single anchor in precedence order.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        if self.h_center && self.v_center {
            Anchor::Center
        } else if self.top && self.h_center {
            Anchor::TopCenter
        } else if self.bottom && self.h_center {
            Anchor::BottomCenter
        } else if self.left && self.v_center {
            Anchor::CenterLeft
        } else if self.right && self.v_center {
            Anchor::CenterRight
        } else if self.top && self.left {
            Anchor::TopLeft
        } else if self.top && self.right {
            Anchor::TopRight
        } else if self.bottom && self.left {
            Anchor::BottomLeft
        } else if self.bottom && self.right {
            Anchor::BottomRight
        } else {
            Anchor::None
        }
    }
}

/// Anchor a box at `pos` would snap to, honouring `cfg.enabled`.
#[must_use]
pub fn detect_snap(pos: Point, size_px: Size, dims: &Dimensions, cfg: &SnapConfig) -> Anchor {
    if !cfg.enabled {
        return Anchor::None;
    }
    SnapZones::of(pos, size_px, dims, cfg.threshold).anchor()
}

/// How the anchor changed across a drag. Hosts use this to pick a cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapTransition {
    Anchored,
    Unanchored,
    Unchanged,
}

/// Outcome of releasing a drag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragRelease {
    pub placement: Placement,
    /// Normalized position of the drop point, stored even when anchored.
    pub normalized: NormalizedPos,
    pub transition: SnapTransition,
}

/// Finish a drag at pixel position `pos`.
#[must_use]
pub fn release(previous: Anchor, pos: Point, size_px: Size, dims: &Dimensions, cfg: &SnapConfig) -> DragRelease {
    let anchor = detect_snap(pos, size_px, dims, cfg);
    let normalized = normalized_position(pos, dims, size_px);
    let transition = match (previous.is_anchored(), anchor.is_anchored()) {
        (false, true) => SnapTransition::Anchored,
        (true, false) => SnapTransition::Unanchored,
        (true, true) if previous != anchor => SnapTransition::Anchored,
        _ => SnapTransition::Unchanged,
    };
    DragRelease { placement: Placement::from_parts(anchor, normalized), normalized, transition }
}
