//! Reticle gestures to PTZ speeds.
//!
//! Dragging away from the reticle centre drives continuous pan/tilt, with
//! speed proportional to the distance (capped at the reticle radius). The
//! scroll wheel drives continuous zoom. Speeds are integers in
//! `[-PTZ_MAX_SPEED, PTZ_MAX_SPEED]`, the range the device's continuous
//! move commands accept.

#[cfg(test)]
#[path = "ptz_test.rs"]
mod ptz_test;

use serde::Serialize;

use crate::Point;
use crate::consts::{PTZ_DEAD_ZONE, PTZ_MAX_SPEED, PTZ_SCROLL_FULL_SPEED};

/// On-screen reticle the operator drags from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reticle {
    pub center: Point,
    pub radius: f64,
    /// Fraction of `radius` that produces no movement.
    pub dead_zone: f64,
}

impl Reticle {
    #[must_use]
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius, dead_zone: PTZ_DEAD_ZONE }
    }

    /// Pan/tilt speeds for a pointer at `pointer`. Screen y grows downward,
    /// so dragging up yields a positive tilt.
    #[must_use]
    pub fn pan_tilt(&self, pointer: Point) -> PanTilt {
        if self.radius <= 0.0 {
            return PanTilt::STOP;
        }
        let mut dx = (pointer.x - self.center.x) / self.radius;
        let mut dy = (pointer.y - self.center.y) / self.radius;
        let magnitude = dx.hypot(dy);
        if magnitude < self.dead_zone {
            return PanTilt::STOP;
        }
        if magnitude > 1.0 {
            dx /= magnitude;
            dy /= magnitude;
        }
        PanTilt { pan: to_speed(dx), tilt: to_speed(-dy) }
    }
}

/// Continuous pan/tilt speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanTilt {
    pub pan: i32,
    pub tilt: i32,
}

impl PanTilt {
    pub const STOP: PanTilt = PanTilt { pan: 0, tilt: 0 };

    #[must_use]
    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// Zoom speed for a wheel delta. Scrolling up (negative delta) zooms in.
#[must_use]
pub fn zoom_speed(scroll_delta_y: f64) -> i32 {
    zoom_speed_with(scroll_delta_y, PTZ_SCROLL_FULL_SPEED)
}

/// Zoom speed with a custom full-speed scroll distance.
#[must_use]
pub fn zoom_speed_with(scroll_delta_y: f64, full_speed_delta: f64) -> i32 {
    if full_speed_delta <= 0.0 {
        return 0;
    }
    to_speed(-scroll_delta_y / full_speed_delta)
}

#[allow(clippy::cast_possible_truncation)]
fn to_speed(unit: f64) -> i32 {
    let max = f64::from(PTZ_MAX_SPEED);
    // Clamped to ±100 first, so the cast cannot truncate.
    (unit * max).round().clamp(-max, max) as i32
}
