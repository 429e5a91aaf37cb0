use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use tokio::sync::mpsc;

use crate::config::StabilizationMode;

/// What the pass that emitted a [`StabilizationProgress`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StabilizationStage {
    /// FAST mode translation.
    Translation,
    /// SLOW mode translation plus rotation/scale correction.
    RotationScale,
    /// One landscape RANSAC pass.
    HomographyRefinement,
    /// The pass that ended the run.
    Complete,
}

/// Emitted once per pass. Advisory only; nothing in the engine depends on delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizationProgress {
    pub current_pass: u32,
    pub max_passes: u32,
    pub stage: StabilizationStage,
    /// Score measured this pass: landmark error or reprojection error, pixels.
    pub score: Option<f64>,
    pub progress_percent: f64,
    pub message: String,
    /// Face/body mode. `None` for landscape runs, which have no FAST/SLOW split.
    pub mode: Option<StabilizationMode>,
}

impl StabilizationProgress {
    pub(crate) fn new(
        current_pass: u32,
        max_passes: u32,
        stage: StabilizationStage,
        score: Option<f64>,
        mode: Option<StabilizationMode>,
    ) -> Self {
        let progress_percent = if stage == StabilizationStage::Complete {
            100.0
        } else {
            (current_pass as f64 / max_passes.max(1) as f64 * 100.0).min(100.0)
        };
        let message = match score {
            Some(score) => format!(
                "pass {}/{} {}: score {:.3}",
                current_pass, max_passes, stage, score
            ),
            None => format!("pass {}/{} {}", current_pass, max_passes, stage),
        };
        Self {
            current_pass,
            max_passes,
            stage,
            score,
            progress_percent,
            message,
            mode,
        }
    }
}

/// Receives progress updates from a running engine.
///
/// Implemented for any `Fn(StabilizationProgress)` closure, so a plain callback works.
/// Implementations are called on the engine's task and should not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: StabilizationProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(StabilizationProgress) + Send + Sync,
{
    fn report(&self, progress: StabilizationProgress) {
        self(progress)
    }
}

impl ProgressSink for mpsc::UnboundedSender<StabilizationProgress> {
    fn report(&self, progress: StabilizationProgress) {
        // a dropped receiver only means nobody is listening
        let _ = self.send(progress);
    }
}

pub type ProgressReceiver = mpsc::UnboundedReceiver<StabilizationProgress>;

/// Channel-backed sink for consumers that poll updates from another task.
pub fn progress_channel() -> (mpsc::UnboundedSender<StabilizationProgress>, ProgressReceiver) {
    mpsc::unbounded_channel()
}
