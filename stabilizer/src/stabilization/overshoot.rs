use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::landmarks::AnchorPair;

/// Residual error of one pass: how far each detected anchor sits from its goal.
///
/// Overshoot is `detected - goal` in canvas pixels, so a positive X means the landmark
/// landed to the right of where it should be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OvershootCorrection {
    pub left_overshoot_x: f64,
    pub left_overshoot_y: f64,
    pub right_overshoot_x: f64,
    pub right_overshoot_y: f64,
    /// Mean Euclidean landmark error, pixels. Lower is better.
    pub current_score: f64,
    noop_threshold: f64,
}

impl OvershootCorrection {
    pub fn new(
        left_overshoot: DVec2,
        right_overshoot: DVec2,
        current_score: f64,
        noop_threshold: f64,
    ) -> Self {
        Self {
            left_overshoot_x: left_overshoot.x,
            left_overshoot_y: left_overshoot.y,
            right_overshoot_x: right_overshoot.x,
            right_overshoot_y: right_overshoot.y,
            current_score,
            noop_threshold,
        }
    }

    /// Measures `detected` against `goal`; both in canvas pixels.
    pub fn measure(detected: &AnchorPair, goal: &AnchorPair, noop_threshold: f64) -> Self {
        let left = detected.left.xy() - goal.left.xy();
        let right = detected.right.xy() - goal.right.xy();
        let score = (left.length() + right.length()) * 0.5;
        Self::new(left, right, score, noop_threshold)
    }

    pub fn left_overshoot(&self) -> DVec2 {
        DVec2::new(self.left_overshoot_x, self.left_overshoot_y)
    }

    pub fn right_overshoot(&self) -> DVec2 {
        DVec2::new(self.right_overshoot_x, self.right_overshoot_y)
    }

    pub fn average_overshoot_x(&self) -> f64 {
        (self.left_overshoot_x + self.right_overshoot_x) * 0.5
    }

    pub fn average_overshoot_y(&self) -> f64 {
        (self.left_overshoot_y + self.right_overshoot_y) * 0.5
    }

    pub fn average_overshoot(&self) -> DVec2 {
        DVec2::new(self.average_overshoot_x(), self.average_overshoot_y())
    }

    /// False only when both average overshoot axes are under the no-op threshold.
    pub fn needs_correction(&self) -> bool {
        self.average_overshoot_x().abs() >= self.noop_threshold
            || self.average_overshoot_y().abs() >= self.noop_threshold
    }

    /// Score that remains once the average overshoot has been translated away.
    ///
    /// Exact for a pure translation correction, which is all FAST mode applies.
    pub fn residual_score_after_translation(&self) -> f64 {
        if !self.needs_correction() {
            return self.current_score;
        }
        let avg = self.average_overshoot();
        ((self.left_overshoot() - avg).length() + (self.right_overshoot() - avg).length()) * 0.5
    }
}
