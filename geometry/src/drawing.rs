//! Drawing overlay: pointer capture in `viewBox` user space and SVG export.
//!
//! The overlay is an SVG whose `viewBox` is the logical resolution (for
//! example `0 0 1920 1080`), laid over the video with
//! `preserveAspectRatio="xMidYMid meet"`. Pointer events arrive in screen
//! pixels and are pushed through the inverse of the screen CTM, so strokes
//! are stored at logical resolution no matter how large the video is drawn.

#[cfg(test)]
#[path = "drawing_test.rs"]
mod drawing_test;

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Point;
use crate::consts::{LOGICAL_HEIGHT_PX, LOGICAL_WIDTH_PX};
use crate::error::GeometryError;

// =============================================================================
// RESOLUTION
// =============================================================================

/// Logical drawing size, parsed from the `"WxH"` strings the device uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self { width: LOGICAL_WIDTH_PX, height: LOGICAL_HEIGHT_PX }
    }
}

impl Resolution {
    /// Read the `resolution` field of the console's stored `vapix` settings,
    /// falling back to the default when it is absent or malformed.
    #[must_use]
    pub fn from_settings_json(raw: &str) -> Self {
        #[derive(Deserialize)]
        struct Settings {
            resolution: Option<String>,
        }
        match serde_json::from_str::<Settings>(raw) {
            Ok(Settings { resolution: Some(res) }) => res.parse().unwrap_or_default(),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn width_f64(&self) -> f64 {
        f64::from(self.width)
    }

    #[must_use]
    pub fn height_f64(&self) -> f64 {
        f64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GeometryError::InvalidResolution(s.to_owned());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

// =============================================================================
// MATRIX
// =============================================================================

/// 2D affine matrix in SVG order: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    #[must_use]
    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self { a: sx, b: 0.0, c: 0.0, d: sy, e: tx, f: ty }
    }

    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point { x: self.a * p.x + self.c * p.y + self.e, y: self.b * p.x + self.d * p.y + self.f }
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SingularMatrix`] when the determinant is zero
    /// (e.g. the overlay has collapsed to zero size).
    pub fn invert(&self) -> Result<Self, GeometryError> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return Err(GeometryError::SingularMatrix(det));
        }
        Ok(Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }
}

/// Screen rectangle the overlay element occupies, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Screen ⇄ user space mapping for an overlay element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBoxTransform {
    ctm: Matrix,
    inverse: Matrix,
}

impl ViewBoxTransform {
    /// Transform for a `viewBox` of `view` fitted into `screen` with
    /// `xMidYMid meet` (uniform scale, centred, letterboxed).
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SingularMatrix`] for a zero-sized screen rect.
    pub fn meet(view: Resolution, screen: ScreenRect) -> Result<Self, GeometryError> {
        let scale = (screen.width / view.width_f64()).min(screen.height / view.height_f64());
        let tx = screen.x + (screen.width - view.width_f64() * scale) / 2.0;
        let ty = screen.y + (screen.height - view.height_f64() * scale) / 2.0;
        Self::from_ctm(Matrix::scale_translate(scale, scale, tx, ty))
    }

    /// Wrap an arbitrary screen CTM (user → screen).
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::SingularMatrix`] if `ctm` cannot be inverted.
    pub fn from_ctm(ctm: Matrix) -> Result<Self, GeometryError> {
        Ok(Self { ctm, inverse: ctm.invert()? })
    }

    #[must_use]
    pub fn user_to_screen(&self, p: Point) -> Point {
        self.ctm.apply(p)
    }

    #[must_use]
    pub fn screen_to_user(&self, p: Point) -> Point {
        self.inverse.apply(p)
    }
}

// =============================================================================
// STROKES
// =============================================================================

/// Stroke styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self { color: "#ff0000".into(), width: 4.0 }
    }
}

/// One drawn shape, in user space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Freehand { points: Vec<Point> },
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub shape: Shape,
    #[serde(default)]
    pub style: StrokeStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tool {
    Freehand,
    Rect { origin: Point },
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveStroke {
    tool: Tool,
    points: Vec<Point>,
    style: StrokeStyle,
}

/// Annotation layer: finished strokes plus the one being drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub resolution: Resolution,
    pub strokes: Vec<Stroke>,
    #[serde(skip)]
    active: Option<ActiveStroke>,
}

impl Annotation {
    #[must_use]
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution, strokes: Vec::new(), active: None }
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    /// Start a freehand stroke at a screen-space pointer position.
    pub fn begin_freehand(&mut self, screen: Point, transform: &ViewBoxTransform, style: StrokeStyle) {
        let p = self.to_user(screen, transform);
        self.active = Some(ActiveStroke { tool: Tool::Freehand, points: vec![p], style });
    }

    /// Start a rectangle with one corner at a screen-space pointer position.
    pub fn begin_rect(&mut self, screen: Point, transform: &ViewBoxTransform, style: StrokeStyle) {
        let p = self.to_user(screen, transform);
        self.active = Some(ActiveStroke { tool: Tool::Rect { origin: p }, points: vec![p], style });
    }

    /// Feed a pointer move. Freehand strokes append; rectangles track the
    /// opposite corner. Ignored when nothing is being drawn.
    pub fn extend(&mut self, screen: Point, transform: &ViewBoxTransform) {
        let p = self.to_user(screen, transform);
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.tool {
            Tool::Freehand => active.points.push(p),
            Tool::Rect { origin } => active.points = vec![origin, p],
        }
    }

    /// Commit the active stroke. Returns the committed stroke, if any.
    pub fn finish(&mut self) -> Option<&Stroke> {
        let active = self.active.take()?;
        let shape = match active.tool {
            Tool::Freehand => Shape::Freehand { points: active.points },
            Tool::Rect { origin } => {
                let corner = active.points.last().copied().unwrap_or(origin);
                Shape::Rect {
                    x: origin.x.min(corner.x),
                    y: origin.y.min(corner.y),
                    width: (corner.x - origin.x).abs(),
                    height: (corner.y - origin.y).abs(),
                }
            }
        };
        self.strokes.push(Stroke { shape, style: active.style });
        self.strokes.last()
    }

    /// Drop the active stroke without committing it.
    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Remove the most recent stroke.
    pub fn undo(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.active = None;
    }

    /// Check that every stored point lies inside the logical `viewBox`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidAnnotation`] naming the first offending stroke.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let (w, h) = (self.resolution.width_f64(), self.resolution.height_f64());
        let inside = |p: &Point| (0.0..=w).contains(&p.x) && (0.0..=h).contains(&p.y);
        for (index, stroke) in self.strokes.iter().enumerate() {
            let ok = match &stroke.shape {
                Shape::Freehand { points } => !points.is_empty() && points.iter().all(inside),
                Shape::Rect { x, y, width, height } => {
                    *width >= 0.0 && *height >= 0.0 && inside(&Point::new(*x, *y)) && inside(&Point::new(x + width, y + height))
                }
            };
            if !ok {
                return Err(GeometryError::InvalidAnnotation(format!("stroke {index} is outside {}", self.resolution)));
            }
        }
        Ok(())
    }

    /// Standalone SVG document at the logical resolution.
    #[must_use]
    pub fn to_svg(&self) -> String {
        let Resolution { width, height } = self.resolution;
        let mut out = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n"
        );
        for stroke in &self.strokes {
            let paint = format!(
                "fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linecap=\"round\" stroke-linejoin=\"round\"",
                escape_attr(&stroke.style.color),
                stroke.style.width
            );
            match &stroke.shape {
                Shape::Freehand { points } => {
                    let mut d = String::new();
                    for (i, p) in points.iter().enumerate() {
                        let cmd = if i == 0 { 'M' } else { 'L' };
                        if i > 0 {
                            d.push(' ');
                        }
                        if write!(d, "{cmd}{} {}", fmt_num(p.x), fmt_num(p.y)).is_err() {
                            break;
                        }
                    }
                    out.push_str(&format!("  <path d=\"{d}\" {paint}/>\n"));
                }
                Shape::Rect { x, y, width, height } => {
                    out.push_str(&format!(
                        "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" {paint}/>\n",
                        fmt_num(*x),
                        fmt_num(*y),
                        fmt_num(*width),
                        fmt_num(*height)
                    ));
                }
            }
        }
        out.push_str("</svg>\n");
        out
    }

    fn to_user(&self, screen: Point, transform: &ViewBoxTransform) -> Point {
        let p = transform.screen_to_user(screen);
        Point {
            x: p.x.clamp(0.0, self.resolution.width_f64()),
            y: p.y.clamp(0.0, self.resolution.height_f64()),
        }
    }
}

/// Two decimals, trailing zeros trimmed.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_owned() } else { s.to_owned() }
}

fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
