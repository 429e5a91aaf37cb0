//! Crop rectangles in normalized and pixel space.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Normalized rectangle, `0.0..=1.0` on both axes, `left <= right`, `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub const FULL: Bounds = Bounds {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Smallest rectangle containing every point. `None` for an empty iterator.
    pub fn enclosing<I: IntoIterator<Item = DVec2>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self::new(min.x, min.y, max.x, max.y))
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// Grows each side by `fraction` of the corresponding dimension.
    pub fn padded(&self, fraction: f64) -> Self {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        Self::new(
            self.left - dx,
            self.top - dy,
            self.right + dx,
            self.bottom + dy,
        )
    }

    /// Grows each side by fixed margins (normalized units).
    pub fn expanded(&self, horizontal: f64, vertical: f64) -> Self {
        Self::new(
            self.left - horizontal,
            self.top - vertical,
            self.right + horizontal,
            self.bottom + vertical,
        )
    }

    pub fn clamped(&self) -> Self {
        Self::new(
            self.left.clamp(0.0, 1.0),
            self.top.clamp(0.0, 1.0),
            self.right.clamp(0.0, 1.0),
            self.bottom.clamp(0.0, 1.0),
        )
    }

    /// Expands the shorter dimension symmetrically so width equals height.
    ///
    /// The center is preserved unless the square would leave the unit frame, in which
    /// case it is shifted back inside. A side longer than the frame is capped at 1.
    pub fn to_square_bounds(&self) -> Self {
        let side = self.width().max(self.height()).min(1.0);
        let center = self.center();
        let (left, right) = fit_span(center.x, side, 1.0);
        let (top, bottom) = fit_span(center.y, side, 1.0);
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Converts to whole pixels, rounding outward and clamping to the image.
    pub fn to_pixel_bounds(&self, width: u32, height: u32) -> PixelBounds {
        let w = width as f64;
        let h = height as f64;
        let left = (self.left.clamp(0.0, 1.0) * w).floor();
        let top = (self.top.clamp(0.0, 1.0) * h).floor();
        let right = (self.right.clamp(0.0, 1.0) * w).ceil();
        let bottom = (self.bottom.clamp(0.0, 1.0) * h).ceil();
        PixelBounds {
            x: left as u32,
            y: top as u32,
            width: (right - left).max(0.0) as u32,
            height: (bottom - top).max(0.0) as u32,
        }
    }
}

/// Start/end of a span of `length` centered at `center`, shifted into `0..=limit`.
fn fit_span(center: f64, length: f64, limit: f64) -> (f64, f64) {
    let start = (center - length * 0.5).clamp(0.0, (limit - length).max(0.0));
    (start, start + length)
}

/// Integer pixel rectangle used for crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Clips the rectangle to a `width x height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }

    /// Square crop inside a `width x height` image, centered on this rectangle when
    /// possible. The side is capped by the smaller image dimension.
    pub fn to_square(&self, image_width: u32, image_height: u32) -> Self {
        let side = self.width.max(self.height).min(image_width.min(image_height)) as f64;
        let cx = self.x as f64 + self.width as f64 * 0.5;
        let cy = self.y as f64 + self.height as f64 * 0.5;
        let (x, _) = fit_span(cx, side, image_width as f64);
        let (y, _) = fit_span(cy, side, image_height as f64);
        Self {
            x: x.round() as u32,
            y: y.round() as u32,
            width: side as u32,
            height: side as u32,
        }
    }
}
