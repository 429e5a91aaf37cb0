//! Landmark sets produced by the face and body detectors.
//!
//! Detectors report coordinates normalized to the image they ran on. The
//! stabilizer aligns one [`AnchorPair`] per subject: the eyes for faces, the
//! shoulders for bodies.

use glam::DVec2;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::geometry::{AlignmentMatrix, LandmarkPoint};


/// Keypoints below this visibility are treated as missing.
pub const MIN_KEYPOINT_VISIBILITY: f32 = 0.3;

/// The two landmarks the engine drives toward the goal geometry.
///
/// `left` and `right` are image-left and image-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorPair {
    pub left: LandmarkPoint,
    pub right: LandmarkPoint,
}

impl AnchorPair {
    pub const fn new(left: LandmarkPoint, right: LandmarkPoint) -> Self {
        Self { left, right }
    }

    /// Vector from left to right.
    pub fn delta(&self) -> DVec2 {
        self.right.xy() - self.left.xy()
    }

    /// Vertical offset between the two landmarks; zero for a level pair.
    pub fn delta_y(&self) -> f64 {
        self.right.y - self.left.y
    }

    pub fn distance(&self) -> f64 {
        self.delta().length()
    }

    pub fn midpoint(&self) -> DVec2 {
        (self.left.xy() + self.right.xy()) * 0.5
    }

    /// Angle of the left-to-right vector, radians.
    pub fn angle(&self) -> f64 {
        let d = self.delta();
        d.y.atan2(d.x)
    }

    pub fn to_pixels(&self, width: f64, height: f64) -> Self {
        Self::new(
            self.left.to_pixels(width, height),
            self.right.to_pixels(width, height),
        )
    }

    pub fn to_normalized(&self, width: f64, height: f64) -> Self {
        Self::new(
            self.left.to_normalized(width, height),
            self.right.to_normalized(width, height),
        )
    }

    pub fn transformed(&self, matrix: &AlignmentMatrix) -> Self {
        Self::new(
            matrix.apply_landmark(&self.left),
            matrix.apply_landmark(&self.right),
        )
    }

    pub fn is_finite(&self) -> bool {
        [self.left.x, self.left.y, self.right.x, self.right.y]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Face detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: LandmarkPoint,
    pub right_eye: LandmarkPoint,
    #[serde(default)]
    pub nose: Option<LandmarkPoint>,
    #[serde(default)]
    pub mouth_left: Option<LandmarkPoint>,
    #[serde(default)]
    pub mouth_right: Option<LandmarkPoint>,
    /// Detector-reported confidence in `0..=1`, when the backend provides one.
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl FaceLandmarks {
    pub fn from_eyes(left_eye: LandmarkPoint, right_eye: LandmarkPoint) -> Self {
        Self {
            left_eye,
            right_eye,
            nose: None,
            mouth_left: None,
            mouth_right: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn eyes(&self) -> AnchorPair {
        AnchorPair::new(self.left_eye, self.right_eye)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum BodyKeypoint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeypointObservation {
    pub point: LandmarkPoint,
    pub visibility: f32,
}

/// Body pose detector output. Any keypoint may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyLandmarks {
    keypoints: HashMap<BodyKeypoint, KeypointObservation>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl BodyLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keypoint: BodyKeypoint, point: LandmarkPoint) -> Self {
        self.insert(keypoint, point, 1.0);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn insert(&mut self, keypoint: BodyKeypoint, point: LandmarkPoint, visibility: f32) {
        self.keypoints
            .insert(keypoint, KeypointObservation { point, visibility });
    }

    /// The keypoint, if present and visible enough to trust.
    pub fn get(&self, keypoint: BodyKeypoint) -> Option<LandmarkPoint> {
        self.keypoints
            .get(&keypoint)
            .filter(|obs| obs.visibility >= MIN_KEYPOINT_VISIBILITY)
            .map(|obs| obs.point)
    }

    pub fn observation(&self, keypoint: BodyKeypoint) -> Option<&KeypointObservation> {
        self.keypoints.get(&keypoint)
    }

    /// Midpoint of two keypoints, or the one that exists.
    pub fn center_of(&self, a: BodyKeypoint, b: BodyKeypoint) -> Option<DVec2> {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => Some((a.xy() + b.xy()) * 0.5),
            (Some(p), None) | (None, Some(p)) => Some(p.xy()),
            (None, None) => None,
        }
    }

    pub fn shoulders(&self) -> Option<AnchorPair> {
        Some(AnchorPair::new(
            self.get(BodyKeypoint::LeftShoulder)?,
            self.get(BodyKeypoint::RightShoulder)?,
        ))
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
