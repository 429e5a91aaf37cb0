//! 3x3 projective transform for the landscape path.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::ops::Index;

const SINGULAR_DETERMINANT: f64 = 1e-12;
const POINT_AT_INFINITY: f64 = 1e-12;

/// Row-major 3x3 homography:
/// ```text
/// | h[0] h[1] h[2] |
/// | h[3] h[4] h[5] |
/// | h[6] h[7] h[8] |
/// ```
///
/// Kept separate from [`AlignmentMatrix`](super::AlignmentMatrix) on purpose: the
/// face/body engine never receives a projective transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomographyMatrix {
    data: [f64; 9],
}

impl Default for HomographyMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl HomographyMatrix {
    pub const fn identity() -> Self {
        Self {
            data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    pub const fn from_array(data: [f64; 9]) -> Self {
        Self { data }
    }

    pub const fn as_array(&self) -> &[f64; 9] {
        &self.data
    }

    pub const fn to_array(self) -> [f64; 9] {
        self.data
    }

    /// `self * rhs`: apply `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Self) -> Self {
        let a = &self.data;
        let b = &rhs.data;
        Self {
            data: [
                a[0] * b[0] + a[1] * b[3] + a[2] * b[6],
                a[0] * b[1] + a[1] * b[4] + a[2] * b[7],
                a[0] * b[2] + a[1] * b[5] + a[2] * b[8],
                a[3] * b[0] + a[4] * b[3] + a[5] * b[6],
                a[3] * b[1] + a[4] * b[4] + a[5] * b[7],
                a[3] * b[2] + a[4] * b[5] + a[5] * b[8],
                a[6] * b[0] + a[7] * b[3] + a[8] * b[6],
                a[6] * b[1] + a[7] * b[4] + a[8] * b[7],
                a[6] * b[2] + a[7] * b[5] + a[8] * b[8],
            ],
        }
    }

    pub fn determinant(&self) -> f64 {
        let d = &self.data;
        d[0] * (d[4] * d[8] - d[5] * d[7]) - d[1] * (d[3] * d[8] - d[5] * d[6])
            + d[2] * (d[3] * d[7] - d[4] * d[6])
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < SINGULAR_DETERMINANT {
            return None;
        }
        let inv_det = 1.0 / det;
        let d = &self.data;
        Some(Self {
            data: [
                (d[4] * d[8] - d[5] * d[7]) * inv_det,
                (d[2] * d[7] - d[1] * d[8]) * inv_det,
                (d[1] * d[5] - d[2] * d[4]) * inv_det,
                (d[5] * d[6] - d[3] * d[8]) * inv_det,
                (d[0] * d[8] - d[2] * d[6]) * inv_det,
                (d[2] * d[3] - d[0] * d[5]) * inv_det,
                (d[3] * d[7] - d[4] * d[6]) * inv_det,
                (d[1] * d[6] - d[0] * d[7]) * inv_det,
                (d[0] * d[4] - d[1] * d[3]) * inv_det,
            ],
        })
    }

    /// Scaled so that `h[8] == 1`, or `None` if `h[8]` vanishes.
    pub fn normalized(&self) -> Option<Self> {
        let scale = self.data[8];
        if scale.abs() < SINGULAR_DETERMINANT {
            return None;
        }
        let mut data = self.data;
        for v in &mut data {
            *v /= scale;
        }
        Some(Self { data })
    }

    /// Projects a point with the perspective divide. `None` for points mapped to infinity.
    pub fn apply(&self, p: DVec2) -> Option<DVec2> {
        let d = &self.data;
        let w = d[6] * p.x + d[7] * p.y + d[8];
        if w.abs() < POINT_AT_INFINITY {
            return None;
        }
        Some(DVec2::new(
            (d[0] * p.x + d[1] * p.y + d[2]) / w,
            (d[3] * p.x + d[4] * p.y + d[5]) / w,
        ))
    }

    /// Frobenius norm of the difference from identity, after normalization.
    pub fn deviation_from_identity(&self) -> f64 {
        let Some(n) = self.normalized() else {
            return f64::INFINITY;
        };
        n.data
            .iter()
            .zip(Self::identity().data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_near_identity(&self, tolerance: f64) -> bool {
        self.deviation_from_identity() <= tolerance
    }

    /// Mean distance between `H * src[i]` and `dst[i]`.
    ///
    /// Pairs whose source projects to infinity count as infinite error. Returns `None`
    /// for empty or mismatched inputs.
    pub fn reprojection_error(&self, src: &[DVec2], dst: &[DVec2]) -> Option<f64> {
        if src.is_empty() || src.len() != dst.len() {
            return None;
        }
        let total: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| match self.apply(*s) {
                Some(p) => p.distance(*d),
                None => f64::INFINITY,
            })
            .sum();
        Some(total / src.len() as f64)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 9]> for HomographyMatrix {
    fn from(data: [f64; 9]) -> Self {
        Self { data }
    }
}

impl Index<usize> for HomographyMatrix {
    type Output = f64;
    #[inline]
    fn index(&self, idx: usize) -> &f64 {
        &self.data[idx]
    }
}
