use serde::{Deserialize, Serialize};

use super::{EarlyStopReason, OvershootCorrection};
use crate::config::{StabilizationConfig, StabilizationMode};
use crate::landmarks::AnchorPair;

/// Measurements of one pass, fed to [`EarlyStopCriteria::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    /// 1-based.
    pub pass: u32,
    pub score: f64,
    pub previous_score: Option<f64>,
    /// Anchor delta-Y measured in the goal pair's frame, pixels.
    pub rotation_delta_y: f64,
    /// |detected distance - goal distance|, pixels.
    pub distance_error: f64,
    /// Average overshoot is under the translation no-op threshold on both axes.
    pub translation_settled: bool,
}

impl PassMetrics {
    /// `overshoot` must have been measured on `detected` against `goal`.
    pub fn measure(
        pass: u32,
        overshoot: &OvershootCorrection,
        previous_score: Option<f64>,
        detected: &AnchorPair,
        goal: &AnchorPair,
    ) -> Self {
        let angle_error = detected.angle() - goal.angle();
        Self {
            pass,
            score: overshoot.current_score,
            previous_score,
            translation_settled: !overshoot.needs_correction(),
            rotation_delta_y: (detected.distance() * angle_error.sin()).abs(),
            distance_error: (detected.distance() - goal.distance()).abs(),
        }
    }

    pub fn improvement(&self) -> Option<f64> {
        self.previous_score.map(|previous| previous - self.score)
    }
}

/// Stop rules, checked in fixed priority order; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopCriteria {
    pub mode: StabilizationMode,
    pub max_passes: u32,
    pub score_threshold: f64,
    pub rotation_convergence_px: f64,
    pub scale_convergence_px: f64,
    pub min_score_improvement: f64,
}

impl EarlyStopCriteria {
    pub fn from_config(config: &StabilizationConfig) -> Self {
        Self {
            mode: config.mode,
            max_passes: config.effective_max_passes(),
            score_threshold: config.score_threshold,
            rotation_convergence_px: config.rotation_convergence_px,
            scale_convergence_px: config.scale_convergence_px,
            min_score_improvement: config.min_score_improvement,
        }
    }

    /// Priority:
    /// 1. score below threshold
    /// 2. no improvement over the previous pass
    /// 3. rotation converged (SLOW)
    /// 4. scale converged (SLOW)
    /// 5. improvement below minimum
    /// 6. pass budget exhausted
    ///
    /// Rules 3 and 4 only apply once translation is settled and the distance error is
    /// within `scale_convergence_px`. Rule 4 accepts a residual delta-Y up to
    /// `scale_convergence_px`, rule 3 needs it within `rotation_convergence_px`.
    pub fn evaluate(&self, m: &PassMetrics) -> Option<EarlyStopReason> {
        let geometry_settled = self.mode == StabilizationMode::Slow
            && m.translation_settled
            && m.distance_error <= self.scale_convergence_px;

        if m.score < self.score_threshold {
            return Some(EarlyStopReason::ScoreBelowThreshold);
        }
        if let Some(previous) = m.previous_score {
            if m.score >= previous {
                return Some(EarlyStopReason::NoImprovement);
            }
        }
        if geometry_settled && m.rotation_delta_y <= self.rotation_convergence_px {
            return Some(EarlyStopReason::RotationConverged);
        }
        if geometry_settled && m.rotation_delta_y <= self.scale_convergence_px {
            return Some(EarlyStopReason::ScaleConverged);
        }
        if m
            .improvement()
            .is_some_and(|improvement| improvement < self.min_score_improvement)
        {
            return Some(EarlyStopReason::TranslationConverged);
        }
        if m.pass >= self.max_passes {
            return Some(EarlyStopReason::MaxPassesReached);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> EarlyStopCriteria {
        EarlyStopCriteria::from_config(&StabilizationConfig::default())
    }

    fn unconverged(pass: u32, score: f64, previous_score: Option<f64>) -> PassMetrics {
        PassMetrics {
            pass,
            score,
            previous_score,
            rotation_delta_y: 5.0,
            distance_error: 10.0,
            translation_settled: false,
        }
    }

    fn settled(rotation_delta_y: f64, distance_error: f64) -> PassMetrics {
        PassMetrics {
            rotation_delta_y,
            distance_error,
            translation_settled: true,
            ..unconverged(2, 4.0, Some(9.0))
        }
    }

    #[test]
    fn test_score_below_threshold_wins_over_everything() {
        let m = PassMetrics {
            pass: 5,
            score: 0.3,
            previous_score: Some(0.2),
            rotation_delta_y: 0.0,
            distance_error: 0.0,
            translation_settled: true,
        };
        assert_eq!(
            criteria().evaluate(&m),
            Some(EarlyStopReason::ScoreBelowThreshold)
        );
    }

    #[test]
    fn test_no_improvement_before_convergence_checks() {
        let m = PassMetrics {
            score: 8.0,
            previous_score: Some(7.5),
            ..settled(0.0, 0.0)
        };
        assert_eq!(criteria().evaluate(&m), Some(EarlyStopReason::NoImprovement));

        // equal score counts as no improvement
        let m = unconverged(2, 7.5, Some(7.5));
        assert_eq!(criteria().evaluate(&m), Some(EarlyStopReason::NoImprovement));
    }

    #[test]
    fn test_rotation_before_scale() {
        assert_eq!(
            criteria().evaluate(&settled(0.1, 0.5)),
            Some(EarlyStopReason::RotationConverged)
        );
        assert_eq!(
            criteria().evaluate(&settled(0.6, 1.0)),
            Some(EarlyStopReason::ScaleConverged)
        );
    }

    #[test]
    fn test_geometry_stops_wait_for_translation() {
        let level_but_offset = PassMetrics {
            translation_settled: false,
            ..settled(0.0, 0.0)
        };
        assert_eq!(criteria().evaluate(&level_but_offset), None);
    }

    #[test]
    fn test_rotation_and_scale_must_both_converge() {
        // level pair, 30px too wide
        assert_eq!(criteria().evaluate(&settled(0.0, 30.0)), None);
        // right spacing, still tilted by 5px
        assert_eq!(criteria().evaluate(&settled(5.0, 0.0)), None);
    }

    #[test]
    fn test_fast_mode_skips_rotation_and_scale_checks() {
        let fast = EarlyStopCriteria::from_config(&StabilizationConfig::fast());
        let m = PassMetrics {
            pass: 1,
            score: 4.0,
            previous_score: None,
            rotation_delta_y: 0.0,
            distance_error: 0.0,
            translation_settled: true,
        };
        assert_eq!(fast.evaluate(&m), Some(EarlyStopReason::MaxPassesReached));
    }

    #[test]
    fn test_small_improvement_is_translation_converged() {
        let m = unconverged(3, 4.0, Some(4.04));
        assert_eq!(
            criteria().evaluate(&m),
            Some(EarlyStopReason::TranslationConverged)
        );
    }

    #[test]
    fn test_continue_until_budget() {
        let c = criteria();
        assert_eq!(c.evaluate(&unconverged(1, 30.0, None)), None);
        assert_eq!(c.evaluate(&unconverged(4, 10.0, Some(15.0))), None);
        assert_eq!(
            c.evaluate(&unconverged(5, 8.0, Some(10.0))),
            Some(EarlyStopReason::MaxPassesReached)
        );
    }

    #[test]
    fn test_measure_uses_goal_frame() {
        use crate::geometry::LandmarkPoint;

        let goal = AnchorPair::new(LandmarkPoint::new(0.0, 0.0), LandmarkPoint::new(100.0, 100.0));
        let same_tilt =
            AnchorPair::new(LandmarkPoint::new(10.0, 10.0), LandmarkPoint::new(60.0, 60.0));
        let overshoot = OvershootCorrection::measure(&same_tilt, &goal, 0.1);

        let m = PassMetrics::measure(1, &overshoot, None, &same_tilt, &goal);
        assert_eq!(m.score, overshoot.current_score);
        assert!(m.rotation_delta_y < 1e-9);
        assert!((m.distance_error - (goal.distance() - same_tilt.distance())).abs() < 1e-9);
        // midpoint (35, 35) vs (50, 50)
        assert!(!m.translation_settled);
    }
}
