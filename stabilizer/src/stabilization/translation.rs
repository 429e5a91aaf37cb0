use serde::{Deserialize, Serialize};

use super::OvershootCorrection;
use crate::geometry::AlignmentMatrix;

/// Output of one translation refinement step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TranslationRefinement {
    pub matrix: AlignmentMatrix,
    pub correction_applied: bool,
    /// Shift added to the canvas translation, pixels.
    pub correction_x: f64,
    pub correction_y: f64,
}

/// Moves the transform so the landmark midpoint lands on the goal midpoint.
///
/// Subtracts the average overshoot from the translate terms. Only the translate
/// terms change; when [`OvershootCorrection::needs_correction`] is false the input
/// matrix is returned untouched with a zero correction.
pub fn refine_translation(
    matrix: &AlignmentMatrix,
    overshoot: &OvershootCorrection,
) -> TranslationRefinement {
    if !overshoot.needs_correction() {
        return TranslationRefinement {
            matrix: *matrix,
            correction_applied: false,
            correction_x: 0.0,
            correction_y: 0.0,
        };
    }

    let correction = -overshoot.average_overshoot();
    TranslationRefinement {
        matrix: matrix.with_translation_delta(correction),
        correction_applied: true,
        correction_x: correction.x,
        correction_y: correction.y,
    }
}
