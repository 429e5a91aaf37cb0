//! Multi-pass face/body stabilization.
//!
//! # Pass loop
//!
//! Each pass warps the source image onto the output canvas with the current
//! candidate matrix, detects the anchor pair (eyes or shoulders), scores it against
//! the goal geometry and either stops or refines:
//!
//! 1. **Detect** - subject detector on the warped image
//! 2. **Score** - [`OvershootCorrection`]: per-landmark overshoot and mean error
//! 3. **Early stop** - [`EarlyStopCriteria`] in fixed priority order
//! 4. **Translation** - [`refine_translation`], always
//! 5. **Rotation/scale** - [`refine_rotation_scale`], SLOW mode only
//!
//! FAST mode runs steps 1-4 once. Every refiner returns a new matrix; a pass that
//! makes things worse is discarded and the last good matrix is returned.

mod early_stop;
mod overshoot;
mod pipeline;
mod progress;
mod rotation_scale;
mod subject;
mod translation;


pub use early_stop::{EarlyStopCriteria, PassMetrics};
pub use overshoot::OvershootCorrection;
pub use pipeline::{BodyStabilizer, FaceStabilizer, StabilizeOptions, Stabilizer};
pub use progress::{
    progress_channel, ProgressReceiver, ProgressSink, StabilizationProgress, StabilizationStage,
};
pub use rotation_scale::{refine_rotation_scale, RotationScaleParams, RotationScaleRefinement};
pub use subject::{AnchorDetection, BodySubject, FaceSubject, Subject, SubjectKind};
pub use translation::{refine_translation, TranslationRefinement};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::config::StabilizationMode;
use crate::geometry::AlignmentMatrix;
use crate::landmarks::AnchorPair;

/// Why a run ended. Exactly one accompanies every finished run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EarlyStopReason {
    /// Error was already below the no-action threshold.
    ScoreBelowThreshold,
    /// The last pass did not reduce the error; it was discarded.
    NoImprovement,
    /// Anchor pair delta-Y within tolerance.
    RotationConverged,
    /// Anchor pair distance within tolerance.
    ScaleConverged,
    /// Score improvement fell below the minimum.
    TranslationConverged,
    MaxPassesReached,
    FaceDetectionFailed,
    BodyDetectionFailed,
}

impl EarlyStopReason {
    pub fn is_detection_failure(&self) -> bool {
        matches!(
            self,
            EarlyStopReason::FaceDetectionFailed | EarlyStopReason::BodyDetectionFailed
        )
    }

    /// True for reasons that mean the frame reached an acceptable alignment.
    pub fn is_converged(&self) -> bool {
        match self {
            EarlyStopReason::ScoreBelowThreshold
            | EarlyStopReason::RotationConverged
            | EarlyStopReason::ScaleConverged
            | EarlyStopReason::TranslationConverged => true,
            EarlyStopReason::NoImprovement
            | EarlyStopReason::MaxPassesReached
            | EarlyStopReason::FaceDetectionFailed
            | EarlyStopReason::BodyDetectionFailed => false,
        }
    }
}

/// Per-run diagnostics. Pixel quantities are in output canvas pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilizationDiagnostics {
    /// Goal anchor pair in canvas pixels.
    pub goal: Option<AnchorPair>,
    /// Score measured on the first pass, before any correction.
    pub initial_score: Option<f64>,
    /// Score measured on every pass, in order.
    pub score_history: Vec<f64>,
    /// Anchor pair detected on the pass the returned matrix was measured on.
    pub detected: Option<AnchorPair>,
    pub detector_confidence: Option<f32>,
    /// Normalized landmarks synthesized at the goal after a detection failure.
    pub fallback_landmarks: Option<AnchorPair>,
    /// Anchor delta-Y relative to the goal orientation, pixels.
    pub rotation_delta_y: Option<f64>,
    /// |detected distance - goal distance|, pixels.
    pub distance_error: Option<f64>,
    /// Passes whose refinement was thrown away for making things worse.
    pub discarded_passes: u32,
}

impl StabilizationDiagnostics {
    pub fn used_fallback_landmarks(&self) -> bool {
        self.fallback_landmarks.is_some()
    }
}

/// Final output of a face/body stabilization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizationResult {
    /// Source-to-canvas transform.
    pub matrix: AlignmentMatrix,
    pub reason: EarlyStopReason,
    pub mode: StabilizationMode,
    /// Passes consumed, counting the one that triggered the stop.
    pub passes: u32,
    pub max_passes: u32,
    /// Mean landmark error in canvas pixels for `matrix`. `None` when nothing was
    /// ever detected.
    pub final_score: Option<f64>,
    /// Quality in `0..=1` from [`ConfidenceCalculator`](crate::confidence::ConfidenceCalculator).
    pub confidence: f64,
    pub diagnostics: StabilizationDiagnostics,
}

impl StabilizationResult {
    /// The surrounding application treats anything but a detection failure as success.
    pub fn is_success(&self) -> bool {
        !self.reason.is_detection_failure()
    }
}
