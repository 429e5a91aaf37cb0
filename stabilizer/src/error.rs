//! Error types for the alignment engine.
//!
//! Convergence outcomes (no improvement, max passes, detection failure mid-run) are
//! NOT errors; they end a run with an
//! [`EarlyStopReason`](crate::stabilization::EarlyStopReason). Only the conditions below
//! escape the engine as `Err`.

use common::CancelToken;
use strum_macros::Display;
use thiserror::Error;

/// Capability a run depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Capability {
    #[strum(serialize = "face detector")]
    FaceDetector,
    #[strum(serialize = "body pose detector")]
    BodyPoseDetector,
    #[strum(serialize = "feature matcher")]
    FeatureMatcher,
}

/// Which side of a feature correspondence set was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum KeypointSide {
    #[strum(serialize = "source")]
    Source,
    #[strum(serialize = "reference")]
    Reference,
}

/// Failure reported by a landmark detector backend.
///
/// "Ran but found nothing" is not an error; detectors report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector is not available on this platform")]
    Unavailable,
    #[error("detector backend failed: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Failure reported by a feature matcher backend.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("feature matcher is not available on this platform")]
    Unavailable,
    /// The backend does not implement the requested operation.
    #[error("operation not supported by this matcher: {0}")]
    Unsupported(&'static str),
    #[error("feature matcher backend failed: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Configuration rejected by `validate()`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StabilizationError {
    #[error("{0} is not available")]
    Unavailable(Capability),
    #[error(transparent)]
    Detector(DetectorError),
    #[error(transparent)]
    Matcher(MatcherError),
    /// Image load/save/warp failure, propagated as-is from the image processor.
    #[error("image operation failed: {0:#}")]
    Image(#[source] anyhow::Error),
    #[error("insufficient correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },
    #[error("no keypoints on the {0} side")]
    EmptyKeypoints(KeypointSide),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("stabilization run was cancelled")]
    Cancelled,
}

impl StabilizationError {
    pub(crate) fn from_detector(capability: Capability, err: DetectorError) -> Self {
        match err {
            DetectorError::Unavailable => Self::Unavailable(capability),
            other => Self::Detector(other),
        }
    }

    pub(crate) fn from_matcher(err: MatcherError) -> Self {
        match err {
            MatcherError::Unavailable => Self::Unavailable(Capability::FeatureMatcher),
            other => Self::Matcher(other),
        }
    }
}

pub type EngineResult<T> = Result<T, StabilizationError>;

/// `Err(Cancelled)` once `cancel` has been triggered.
pub(crate) fn check_cancelled(cancel: Option<&CancelToken>) -> EngineResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(StabilizationError::Cancelled),
        _ => Ok(()),
    }
}
