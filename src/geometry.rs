//! Pixel-space geometry shared by the raster, overlay and thumbnail code.
//!
//! Three coordinate spaces meet here:
//!
//! * **intrinsic**: the page raster as recorded when it was produced; the
//!   detection service reports boxes in this space.
//! * **display**: the size the raster is shown at after scaling.
//! * **natural**: the dimensions of the decoded bitmap, which can differ
//!   from the recorded intrinsic size.

use serde::{Deserialize, Serialize};

/// Width and height of a bitmap in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero; nothing can be mapped from such a size.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// On-screen size of the currently shown raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub width: f64,
    pub height: f64,
}

impl DisplayGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Display the raster at its intrinsic size.
    pub fn actual(size: PixelSize) -> Self {
        Self::new(f64::from(size.width), f64::from(size.height))
    }

    /// Fit the raster into `max_width`, keeping its aspect ratio and never
    /// scaling up.
    pub fn fit_width(size: PixelSize, max_width: f64) -> Self {
        let w = f64::from(size.width);
        let h = f64::from(size.height);
        if size.is_empty() || max_width <= 0.0 || w <= max_width {
            return Self::new(w, h);
        }
        Self::new(max_width, h * max_width / w)
    }

    /// True when the geometry cannot be drawn into (zero, negative or NaN).
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned detection box `(x, y, width, height)` in raster pixel space.
///
/// Serialised as the `[x, y, w, h]` array the detection service uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale each axis independently.
    pub fn scaled(&self, sx: f64, sy: f64) -> Rect {
        Rect {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// A rectangle in some target space (display or natural pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Clamp to `[0, bounds)` and round outwards to whole pixels.
    ///
    /// Returns `(x, y, w, h)` or `None` when nothing of the rectangle lies
    /// inside the bounds.
    pub fn to_pixel_region(&self, bounds: PixelSize) -> Option<(u32, u32, u32, u32)> {
        let max_x = f64::from(bounds.width);
        let max_y = f64::from(bounds.height);
        let x0 = self.x.round().clamp(0.0, max_x);
        let y0 = self.y.round().clamp(0.0, max_y);
        let x1 = (self.x + self.width).round().clamp(0.0, max_x);
        let y1 = (self.y + self.height).round().clamp(0.0, max_y);
        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Per-axis scale from `from` to `to`, or `None` if `from` has a zero side.
pub fn axis_scale(from: PixelSize, to_width: f64, to_height: f64) -> Option<(f64, f64)> {
    if from.is_empty() {
        return None;
    }
    Some((
        to_width / f64::from(from.width),
        to_height / f64::from(from.height),
    ))
}
