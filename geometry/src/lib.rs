//! Overlay placement geometry for the camera configuration console.
//!
//! Widgets and overlays live on the device in a normalized `[-1, 1]`
//! coordinate space, are shown to the operator as pixel boxes on top of a
//! scaled video element, and annotations are drawn in a fixed logical space
//! so exports do not depend on the on-screen size. This crate holds all of
//! the math that moves values between those spaces. Everything here is pure
//! and synchronous; hosts call it from pointer handlers and layout passes.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`bbox`] | Normalized ⇄ pixel mapping, clamping, the video [`bbox::Dimensions`] |
//! | [`anchor`] | Symbolic anchors, snap-zone detection, drag release |
//! | [`drawing`] | `viewBox` transforms, stroke capture, SVG export, logical resolution |
//! | [`ptz`] | Reticle drag and scroll to pan/tilt/zoom speeds |
//! | [`consts`] | Shared numeric constants |
//! | [`error`] | Error type for fallible parsing and matrix inversion |

pub mod anchor;
pub mod bbox;
pub mod consts;
pub mod drawing;
pub mod error;
pub mod ptz;

pub use error::GeometryError;

use serde::{Deserialize, Serialize};

/// A point in pixel, container, or `viewBox` user space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
