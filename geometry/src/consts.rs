//! Shared numeric constants for the geometry crate.

// ── Logical space ───────────────────────────────────────────────

/// Width of the logical coordinate system widget sizes are expressed in.
pub const LOGICAL_WIDTH: f64 = 1920.0;

/// Height of the logical coordinate system widget sizes are expressed in.
pub const LOGICAL_HEIGHT: f64 = 1080.0;

/// [`LOGICAL_WIDTH`] as a drawing resolution.
pub const LOGICAL_WIDTH_PX: u32 = 1920;

/// [`LOGICAL_HEIGHT`] as a drawing resolution.
pub const LOGICAL_HEIGHT_PX: u32 = 1080;

// ── Normalized space ────────────────────────────────────────────

/// Lower bound of every normalized axis.
pub const NORMALIZED_MIN: f64 = -1.0;

/// Upper bound of a normalized axis for a zero-sized item.
pub const NORMALIZED_MAX: f64 = 1.0;

/// Smallest normalized range used as a divisor. Keeps `max - min` away from
/// zero when an item fills its axis.
pub const RANGE_EPSILON: f64 = 1e-6;

// ── Anchoring ───────────────────────────────────────────────────

/// Default snap threshold as a fraction of the frame size on each axis.
pub const DEFAULT_SNAP_THRESHOLD: f64 = 0.02;

/// Pixel offset applied outward on anchored edges so the box outline sits
/// flush with the frame edge.
pub const ANCHOR_EDGE_OFFSET_PX: f64 = 1.0;

// ── PTZ ─────────────────────────────────────────────────────────

/// Maximum magnitude of a continuous pan, tilt, or zoom speed.
pub const PTZ_MAX_SPEED: i32 = 100;

/// Fraction of the reticle radius treated as "no movement".
pub const PTZ_DEAD_ZONE: f64 = 0.05;

/// Scroll distance (wheel delta units) that maps to full zoom speed.
pub const PTZ_SCROLL_FULL_SPEED: f64 = 500.0;
