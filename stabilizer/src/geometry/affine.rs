//! 2x3 affine alignment matrix.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{HomographyMatrix, LandmarkPoint};

const SINGULAR_DETERMINANT: f64 = 1e-12;

/// Row-major 2x3 affine transform from source pixels to canvas pixels:
/// ```text
/// | scale_x  skew_x  translate_x |
/// | skew_y   scale_y translate_y |
/// ```
///
/// Values are never mutated in place by the engine; every refinement returns a new
/// matrix so a rejected pass cannot leak into the last known good one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentMatrix {
    pub scale_x: f64,
    pub skew_x: f64,
    pub translate_x: f64,
    pub skew_y: f64,
    pub scale_y: f64,
    pub translate_y: f64,
}

impl Default for AlignmentMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for AlignmentMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Affine(dx={:.2}, dy={:.2}, rot={:.3}°, scale={:.4})",
            self.translate_x,
            self.translate_y,
            self.rotation_angle().to_degrees(),
            self.scale_factor()
        )
    }
}

impl AlignmentMatrix {
    pub const fn identity() -> Self {
        Self::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    /// Create from `[scale_x, skew_x, translate_x, skew_y, scale_y, translate_y]`.
    pub const fn from_array(m: [f64; 6]) -> Self {
        Self {
            scale_x: m[0],
            skew_x: m[1],
            translate_x: m[2],
            skew_y: m[3],
            scale_y: m[4],
            translate_y: m[5],
        }
    }

    pub const fn to_array(&self) -> [f64; 6] {
        [
            self.scale_x,
            self.skew_x,
            self.translate_x,
            self.skew_y,
            self.scale_y,
            self.translate_y,
        ]
    }

    pub fn translation(t: DVec2) -> Self {
        Self::from_array([1.0, 0.0, t.x, 0.0, 1.0, t.y])
    }

    /// Rotation by `angle` radians and uniform `scale` that keeps `center` fixed:
    /// `p' = center + scale * R(angle) * (p - center)`.
    pub fn similarity_about(center: DVec2, angle: f64, scale: f64) -> Self {
        let a = angle.cos() * scale;
        let c = angle.sin() * scale;
        // T(center) * S*R * T(-center)
        let tx = center.x - a * center.x + c * center.y;
        let ty = center.y - c * center.x - a * center.y;
        Self::from_array([a, -c, tx, c, a, ty])
    }

    /// Maps a source-space point onto the canvas.
    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.scale_x * p.x + self.skew_x * p.y + self.translate_x,
            self.skew_y * p.x + self.scale_y * p.y + self.translate_y,
        )
    }

    pub fn apply_landmark(&self, p: &LandmarkPoint) -> LandmarkPoint {
        let mapped = self.apply(p.xy());
        LandmarkPoint::with_z(mapped.x, mapped.y, p.z)
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        Self::from_array([
            a[0] * b[0] + a[1] * b[3],
            a[0] * b[1] + a[1] * b[4],
            a[0] * b[2] + a[1] * b[5] + a[2],
            a[3] * b[0] + a[4] * b[3],
            a[3] * b[1] + a[4] * b[4],
            a[3] * b[2] + a[4] * b[5] + a[5],
        ])
    }

    /// Apply `self` first, then `after`. Reads left to right in pipeline order.
    pub fn then(&self, after: &Self) -> Self {
        after.compose(self)
    }

    pub fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.skew_x * self.skew_y
    }

    /// Matrix inverse, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < SINGULAR_DETERMINANT {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = self.scale_y * inv_det;
        let b = -self.skew_x * inv_det;
        let c = -self.skew_y * inv_det;
        let d = self.scale_x * inv_det;
        Some(Self::from_array([
            a,
            b,
            -(a * self.translate_x + b * self.translate_y),
            c,
            d,
            -(c * self.translate_x + d * self.translate_y),
        ]))
    }

    pub fn translation_components(&self) -> DVec2 {
        DVec2::new(self.translate_x, self.translate_y)
    }

    /// Copy with `delta` added to the translate terms only.
    pub fn with_translation_delta(&self, delta: DVec2) -> Self {
        Self {
            translate_x: self.translate_x + delta.x,
            translate_y: self.translate_y + delta.y,
            ..*self
        }
    }

    /// Rotation angle in radians (meaningful for similarity matrices).
    pub fn rotation_angle(&self) -> f64 {
        self.skew_y.atan2(self.scale_x)
    }

    /// Uniform scale factor (meaningful for similarity matrices).
    pub fn scale_factor(&self) -> f64 {
        (self.scale_x * self.scale_x + self.skew_y * self.skew_y).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    pub fn to_homography(&self) -> HomographyMatrix {
        HomographyMatrix::from_array([
            self.scale_x,
            self.skew_x,
            self.translate_x,
            self.skew_y,
            self.scale_y,
            self.translate_y,
            0.0,
            0.0,
            1.0,
        ])
    }
}
