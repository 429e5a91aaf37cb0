//! Geometry primitives shared by every alignment path.
//!
//! - [`LandmarkPoint`]: a detected landmark, normalized (0..1) or pixel space
//! - [`AlignmentMatrix`]: 2x3 affine used by the face/body stabilizer
//! - [`HomographyMatrix`]: 3x3 projective transform used only by the landscape path
//! - [`Bounds`] / [`PixelBounds`]: crop rectangles
//!
//! All matrices map SOURCE image coordinates to OUTPUT canvas coordinates. Composition
//! is associative but not commutative, so callers must respect the documented order.

mod affine;
mod bounds;
mod homography;

#[cfg(test)]
mod tests;

pub use affine::AlignmentMatrix;
pub use bounds::{Bounds, PixelBounds};
pub use homography::HomographyMatrix;

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A single landmark. `z` is carried through from 3-D capable detectors and
/// ignored by all 2-D math.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl LandmarkPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub const fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn xy(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Scales a normalized point onto a `width x height` pixel canvas.
    pub fn to_pixels(&self, width: f64, height: f64) -> Self {
        Self::with_z(self.x * width, self.y * height, self.z)
    }

    /// Inverse of [`to_pixels`](Self::to_pixels).
    pub fn to_normalized(&self, width: f64, height: f64) -> Self {
        Self::with_z(self.x / width, self.y / height, self.z)
    }

    pub fn distance(&self, other: &Self) -> f64 {
        self.xy().distance(other.xy())
    }
}

impl From<DVec2> for LandmarkPoint {
    fn from(p: DVec2) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<LandmarkPoint> for DVec2 {
    fn from(p: LandmarkPoint) -> Self {
        p.xy()
    }
}
