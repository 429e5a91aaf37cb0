use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::EarlyStopReason;
use crate::capability::{BodyPoseDetector, FaceDetector};
use crate::config::StabilizationConfig;
use crate::error::{Capability, DetectorError};
use crate::landmarks::AnchorPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubjectKind {
    Face,
    Body,
}

impl SubjectKind {
    pub fn capability(self) -> Capability {
        match self {
            SubjectKind::Face => Capability::FaceDetector,
            SubjectKind::Body => Capability::BodyPoseDetector,
        }
    }

    pub fn failure_reason(self) -> EarlyStopReason {
        match self {
            SubjectKind::Face => EarlyStopReason::FaceDetectionFailed,
            SubjectKind::Body => EarlyStopReason::BodyDetectionFailed,
        }
    }

    /// Whether a detection failure synthesizes landmarks at the goal unless the
    /// config overrides it.
    pub fn synthesizes_fallback(self) -> bool {
        match self {
            SubjectKind::Face => true,
            SubjectKind::Body => false,
        }
    }

    /// Normalized goal pair used when the caller supplies none.
    pub fn default_goal(self, config: &StabilizationConfig) -> AnchorPair {
        match self {
            SubjectKind::Face => config.face_goal,
            SubjectKind::Body => config.body_goal,
        }
    }
}

/// Anchor pair found on one image, normalized to that image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorDetection {
    pub anchors: AnchorPair,
    pub confidence: Option<f32>,
}

/// What the stabilizer aligns: reduces a detector's full output to one anchor pair.
#[async_trait]
pub trait Subject<I>: Send + Sync
where
    I: Send + Sync + 'static,
{
    fn kind(&self) -> SubjectKind;

    fn is_available(&self) -> bool;

    async fn detect_anchors(&self, image: &I) -> Result<Option<AnchorDetection>, DetectorError>;
}

/// Aligns on the eyes.
#[derive(Debug, Clone)]
pub struct FaceSubject<D> {
    detector: D,
}

impl<D> FaceSubject<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

#[async_trait]
impl<I, D> Subject<I> for FaceSubject<D>
where
    I: Send + Sync + 'static,
    D: FaceDetector<I>,
{
    fn kind(&self) -> SubjectKind {
        SubjectKind::Face
    }

    fn is_available(&self) -> bool {
        self.detector.is_available()
    }

    async fn detect_anchors(&self, image: &I) -> Result<Option<AnchorDetection>, DetectorError> {
        let face = self.detector.detect_face(image).await?;
        Ok(face.map(|face| AnchorDetection {
            anchors: face.eyes(),
            confidence: face.confidence,
        }))
    }
}

/// Aligns on the shoulders. A body without both shoulders visible counts as not
/// detected.
#[derive(Debug, Clone)]
pub struct BodySubject<D> {
    detector: D,
}

impl<D> BodySubject<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

#[async_trait]
impl<I, D> Subject<I> for BodySubject<D>
where
    I: Send + Sync + 'static,
    D: BodyPoseDetector<I>,
{
    fn kind(&self) -> SubjectKind {
        SubjectKind::Body
    }

    fn is_available(&self) -> bool {
        self.detector.is_available()
    }

    async fn detect_anchors(&self, image: &I) -> Result<Option<AnchorDetection>, DetectorError> {
        let body = self.detector.detect_body(image).await?;
        Ok(body.and_then(|body| {
            body.shoulders().map(|anchors| AnchorDetection {
                anchors,
                confidence: body.confidence,
            })
        }))
    }
}
