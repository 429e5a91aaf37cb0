//! Injected platform capabilities.
//!
//! The engine never touches pixels or ML models itself. Detection, feature matching
//! and image warping are supplied by the caller through these traits; the engine only
//! does the geometry in between. A backend that cannot run on the current platform
//! reports `is_available() == false`, which the engines surface as
//! [`StabilizationError::Unavailable`](crate::error::StabilizationError::Unavailable).

use std::path::Path;

use async_trait::async_trait;

use crate::error::{DetectorError, MatcherError};
use crate::geometry::{AlignmentMatrix, HomographyMatrix, PixelBounds};
use crate::landmarks::{BodyLandmarks, FaceLandmarks};
use crate::landscape::{
    FeatureKeypoint, FeatureMatch, FeatureSet, HomographyEstimate, ReprojectionStats,
};

/// Image I/O and resampling.
///
/// `Image` is whatever handle the backend uses; the engine treats it as opaque.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    type Image: Send + Sync + 'static;

    async fn load_image(&self, path: &Path) -> anyhow::Result<Self::Image>;

    async fn save_image(&self, image: &Self::Image, path: &Path) -> anyhow::Result<()>;

    async fn crop_image(
        &self,
        image: &Self::Image,
        bounds: PixelBounds,
    ) -> anyhow::Result<Self::Image>;

    async fn resize_image(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
        maintain_aspect_ratio: bool,
    ) -> anyhow::Result<Self::Image>;

    /// Resamples `image` onto a `width x height` canvas; `matrix` maps source pixels
    /// to canvas pixels.
    async fn warp_affine(
        &self,
        image: &Self::Image,
        matrix: &AlignmentMatrix,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self::Image>;

    async fn warp_perspective(
        &self,
        image: &Self::Image,
        matrix: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self::Image>;

    /// `(width, height)` in pixels.
    fn dimensions(&self, image: &Self::Image) -> (u32, u32);
}

/// Face landmark detection. `Ok(None)` means the detector ran and found no face.
#[async_trait]
pub trait FaceDetector<I>: Send + Sync
where
    I: Send + Sync + 'static,
{
    fn is_available(&self) -> bool;

    /// Landmarks normalized to `image`.
    async fn detect_face(&self, image: &I) -> Result<Option<FaceLandmarks>, DetectorError>;
}

/// Body pose detection. `Ok(None)` means the detector ran and found no body.
#[async_trait]
pub trait BodyPoseDetector<I>: Send + Sync
where
    I: Send + Sync + 'static,
{
    fn is_available(&self) -> bool;

    /// Keypoints normalized to `image`.
    async fn detect_body(&self, image: &I) -> Result<Option<BodyLandmarks>, DetectorError>;
}

/// Keypoint extraction for the landscape path.
#[async_trait]
pub trait FeatureExtractor<I>: Send + Sync
where
    I: Send + Sync + 'static,
{
    /// Keypoints in pixel coordinates of `image`, strongest first, at most
    /// `max_keypoints`.
    async fn detect_features(
        &self,
        image: &I,
        max_keypoints: usize,
    ) -> Result<FeatureSet, MatcherError>;
}

/// Descriptor matching and robust homography estimation.
#[async_trait]
pub trait FeatureMatcher: Send + Sync {
    fn is_available(&self) -> bool;

    async fn match_features(
        &self,
        source: &FeatureSet,
        reference: &FeatureSet,
        ratio_threshold: f32,
    ) -> Result<Vec<FeatureMatch>, MatcherError>;

    /// RANSAC homography mapping `source` keypoints onto `reference` keypoints.
    async fn compute_homography(
        &self,
        source: &[FeatureKeypoint],
        reference: &[FeatureKeypoint],
        matches: &[FeatureMatch],
        ransac_threshold: f64,
    ) -> Result<HomographyEstimate, MatcherError>;

    /// Reprojection error of `estimate` over its inliers.
    ///
    /// Backends that cannot measure it keep the default, and the engine falls back to
    /// an estimate derived from the RANSAC threshold.
    async fn reprojection_error(
        &self,
        _source: &[FeatureKeypoint],
        _reference: &[FeatureKeypoint],
        _matches: &[FeatureMatch],
        _estimate: &HomographyEstimate,
    ) -> Result<ReprojectionStats, MatcherError> {
        Err(MatcherError::Unsupported("reprojection_error"))
    }
}
