use serde::{Deserialize, Serialize};

use crate::config::StabilizationConfig;
use crate::geometry::AlignmentMatrix;
use crate::landmarks::AnchorPair;

/// Damping and clamping for [`refine_rotation_scale`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationScaleParams {
    pub rotation_damping: f64,
    pub scale_damping: f64,
    pub min_scale_ratio: f64,
    pub max_scale_ratio: f64,
}

impl Default for RotationScaleParams {
    fn default() -> Self {
        Self::from_config(&StabilizationConfig::default())
    }
}

impl RotationScaleParams {
    pub fn from_config(config: &StabilizationConfig) -> Self {
        Self {
            rotation_damping: config.rotation_damping,
            scale_damping: config.scale_damping,
            min_scale_ratio: config.min_scale_ratio,
            max_scale_ratio: config.max_scale_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationScaleRefinement {
    pub matrix: AlignmentMatrix,
    /// Rotation added this step, radians.
    pub rotation_applied: f64,
    /// Uniform scale multiplied in this step.
    pub scale_applied: f64,
    /// Undamped `goal distance / detected distance`, before clamping.
    pub raw_scale_ratio: f64,
    pub scale_clamped: bool,
}

/// Rotates and scales the canvas around the detected midpoint so the anchor pair
/// takes the goal's orientation and spacing.
///
/// `detected` and `goal` are canvas pixels, with `detected` measured on the image
/// produced by `matrix`. The correction is composed after `matrix`, so it acts in
/// canvas space. Returns `matrix` unchanged if either pair is degenerate.
pub fn refine_rotation_scale(
    matrix: &AlignmentMatrix,
    detected: &AnchorPair,
    goal: &AnchorPair,
    params: &RotationScaleParams,
) -> RotationScaleRefinement {
    let detected_distance = detected.distance();
    let goal_distance = goal.distance();
    if !(detected_distance > f64::EPSILON && goal_distance > f64::EPSILON) {
        return RotationScaleRefinement {
            matrix: *matrix,
            rotation_applied: 0.0,
            scale_applied: 1.0,
            raw_scale_ratio: 1.0,
            scale_clamped: false,
        };
    }

    let angle_error = wrap_angle(goal.angle() - detected.angle());
    let rotation = angle_error * params.rotation_damping;

    let raw_scale_ratio = goal_distance / detected_distance;
    let ratio = raw_scale_ratio.clamp(params.min_scale_ratio, params.max_scale_ratio);
    let scale = 1.0 + (ratio - 1.0) * params.scale_damping;

    let correction = AlignmentMatrix::similarity_about(detected.midpoint(), rotation, scale);

    RotationScaleRefinement {
        matrix: correction.compose(matrix),
        rotation_applied: rotation,
        scale_applied: scale,
        raw_scale_ratio,
        scale_clamped: ratio != raw_scale_ratio,
    }
}

/// Wraps an angle into `(-pi, pi]`.
fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
