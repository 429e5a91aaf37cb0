//! Feature-based projective alignment for static scenes.
//!
//! Landscapes have no anchor landmarks; the source frame is registered against a
//! reference frame through sparse feature correspondences and a homography.
//!
//! # Pass loop
//!
//! 1. **Features** - [`FeatureExtractor`](crate::capability::FeatureExtractor) on both frames
//! 2. **Matching** - descriptor matching with the Lowe ratio test
//! 3. **Refinement** - [`HomographyRefiner`] re-estimates with a tighter RANSAC threshold
//!    each pass: `t' = max(t * reduction_factor, min_threshold)`
//! 4. **Stop** - reprojection error below target, threshold floor reached, or pass
//!    budget exhausted

mod pipeline;
mod refiner;


pub use pipeline::{LandscapeOptions, LandscapeStabilizer};
pub use refiner::{HomographyRefiner, RefinementPass};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::geometry::HomographyMatrix;

/// A detected feature, pixel coordinates of the image it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureKeypoint {
    pub x: f64,
    pub y: f64,
    /// Diameter of the meaningful neighbourhood, pixels.
    #[serde(default)]
    pub size: f32,
    /// Orientation in degrees, negative when not computed.
    #[serde(default)]
    pub angle: f32,
    #[serde(default)]
    pub response: f32,
    #[serde(default)]
    pub octave: i32,
}

impl FeatureKeypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            angle: -1.0,
            ..Default::default()
        }
    }

    #[inline]
    pub fn pos(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }
}

/// Keypoints plus their descriptors.
///
/// Descriptors are opaque to the engine: they are produced and consumed only by the
/// feature matcher. `descriptors` holds `descriptor_len` bytes per keypoint, in
/// keypoint order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<FeatureKeypoint>,
    pub descriptors: Vec<u8>,
    pub descriptor_len: usize,
}

impl FeatureSet {
    pub fn new(
        keypoints: Vec<FeatureKeypoint>,
        descriptors: Vec<u8>,
        descriptor_len: usize,
    ) -> Self {
        Self {
            keypoints,
            descriptors,
            descriptor_len,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn descriptor(&self, index: usize) -> Option<&[u8]> {
        if self.descriptor_len == 0 {
            return None;
        }
        let start = index.checked_mul(self.descriptor_len)?;
        let end = start.checked_add(self.descriptor_len)?;
        self.descriptors.get(start..end)
    }
}

/// Correspondence between `source.keypoints[source_index]` and
/// `reference.keypoints[reference_index]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatch {
    pub source_index: usize,
    pub reference_index: usize,
    /// Descriptor distance; lower is better.
    pub distance: f32,
}

impl FeatureMatch {
    pub fn new(source_index: usize, reference_index: usize, distance: f32) -> Self {
        Self {
            source_index,
            reference_index,
            distance,
        }
    }
}

/// Output of [`FeatureMatcher::compute_homography`](crate::capability::FeatureMatcher::compute_homography).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographyEstimate {
    /// Maps source pixels to reference pixels.
    pub matrix: HomographyMatrix,
    pub inlier_count: usize,
    /// One flag per match, `true` for inliers. May be empty if the backend does not
    /// report it.
    #[serde(default)]
    pub inlier_mask: Vec<bool>,
}

/// Reprojection error of a homography over its inliers, pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    pub mean_error: f64,
    pub max_error: f64,
    pub inlier_count: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LandscapeStopReason {
    /// Mean reprojection error fell below the target.
    ReprojectionConverged,
    /// RANSAC threshold bottomed out at its minimum.
    ThresholdFloorReached,
    MaxPassesReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandscapeResult {
    /// Maps source pixels to reference pixels.
    pub homography: HomographyMatrix,
    pub reason: LandscapeStopReason,
    pub passes: u32,
    pub max_passes: u32,
    /// RANSAC threshold used on the last pass.
    pub final_threshold: f64,
    pub mean_reprojection_error: f64,
    /// True when the matcher could not report the error and `threshold / 2` was used.
    pub reprojection_error_estimated: bool,
    pub inlier_count: usize,
    pub match_count: usize,
    pub inlier_ratio: f64,
    /// Mean reprojection error after every pass, in order.
    pub error_history: Vec<f64>,
    /// Quality in `0..=1` from [`landscape_quality`](crate::confidence::landscape_quality).
    pub confidence: f64,
}
