//! Quality scores in `0..=1` for finished runs.
//!
//! Face/body runs are scored by [`ConfidenceCalculator`] from the detector's own
//! confidence, the residual landmark error, the stop reason and the number of passes
//! used. Landscape runs are scored by [`landscape_quality`] from reprojection error,
//! inlier statistics and canvas overlap.

use glam::DVec2;

use crate::config::ConfidenceConfig;
use crate::geometry::HomographyMatrix;
use crate::stabilization::{EarlyStopReason, StabilizationResult};


/// Scores face/body [`StabilizationResult`]s.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceCalculator {
    config: ConfidenceConfig,
}

impl ConfidenceCalculator {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn calculate(&self, result: &StabilizationResult) -> f64 {
        let base = result
            .diagnostics
            .detector_confidence
            .map(f64::from)
            .unwrap_or(self.config.unreported_detector_confidence)
            .clamp(0.0, 1.0);

        if result.reason.is_detection_failure() {
            return (base * self.config.detection_failure_cap).clamp(0.0, 1.0);
        }

        let error_factor = result
            .final_score
            .map_or(0.0, |score| (-score.max(0.0) / self.config.score_falloff_px).exp());

        let confidence = base * error_factor - reason_penalty(result.reason)
            + self.pass_reward(result.passes, result.max_passes);

        if confidence.is_nan() {
            return 0.0;
        }
        confidence.clamp(0.0, 1.0)
    }

    /// Full reward for a single pass, falling linearly to zero at the budget.
    fn pass_reward(&self, passes: u32, max_passes: u32) -> f64 {
        let spent = if max_passes > 1 {
            (passes.saturating_sub(1) as f64 / (max_passes - 1) as f64).min(1.0)
        } else {
            0.0
        };
        self.config.pass_reward * (1.0 - spent)
    }
}

fn reason_penalty(reason: EarlyStopReason) -> f64 {
    match reason {
        EarlyStopReason::ScoreBelowThreshold => 0.0,
        EarlyStopReason::RotationConverged | EarlyStopReason::ScaleConverged => 0.05,
        EarlyStopReason::TranslationConverged => 0.1,
        EarlyStopReason::NoImprovement => 0.2,
        EarlyStopReason::MaxPassesReached => 0.3,
        // scored separately, never reaches here
        EarlyStopReason::FaceDetectionFailed | EarlyStopReason::BodyDetectionFailed => 1.0,
    }
}

/// Overall landscape alignment quality (0.0 - 1.0).
///
/// Weighted mix of reprojection error decay, inlier count, inlier ratio and overlap
/// of the warped source with the canvas.
pub fn landscape_quality(
    reprojection_error: f64,
    num_inliers: usize,
    num_matches: usize,
    overlap_fraction: f64,
) -> f64 {
    // 0.5 px = 0.78, 2 px = 0.37
    let error_score = (-reprojection_error.max(0.0) / 2.0).exp();

    // saturates at 50 inliers
    let match_score = (num_inliers as f64 / 50.0).min(1.0);

    let inlier_score = if num_matches > 0 {
        num_inliers as f64 / num_matches as f64
    } else {
        0.0
    };

    let score = 0.4 * error_score
        + 0.25 * match_score
        + 0.2 * inlier_score
        + 0.15 * overlap_fraction.clamp(0.0, 1.0);

    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

/// Fraction of a `width x height` canvas covered by the bounding box of the source
/// frame after `transform`.
///
/// Uses the axis-aligned box of the four warped corners, so strong rotation
/// overestimates slightly. Returns 0 if any corner maps to infinity.
pub fn estimate_overlap(width: f64, height: f64, transform: &HomographyMatrix) -> f64 {
    if !(width > 0.0 && height > 0.0) {
        return 0.0;
    }

    let corners = [
        DVec2::new(0.0, 0.0),
        DVec2::new(width, 0.0),
        DVec2::new(width, height),
        DVec2::new(0.0, height),
    ];

    let mut min = DVec2::splat(f64::INFINITY);
    let mut max = DVec2::splat(f64::NEG_INFINITY);
    for corner in corners {
        let Some(p) = transform.apply(corner) else {
            return 0.0;
        };
        min = min.min(p);
        max = max.max(p);
    }

    let overlap_w = (max.x.min(width) - min.x.max(0.0)).max(0.0);
    let overlap_h = (max.y.min(height) - min.y.max(0.0)).max(0.0);
    (overlap_w * overlap_h) / (width * height)
}
