use serde::{Deserialize, Serialize};

use super::{FeatureKeypoint, FeatureMatch};
use crate::capability::FeatureMatcher;
use crate::config::LandscapeConfig;
use crate::error::{EngineResult, KeypointSide, MatcherError, StabilizationError};
use crate::geometry::HomographyMatrix;

/// Outcome of one [`HomographyRefiner::refine`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementPass {
    pub homography: HomographyMatrix,
    /// RANSAC threshold this pass used; feed it back as the next `previous_threshold`.
    pub threshold: f64,
    pub inlier_count: usize,
    pub inlier_ratio: f64,
    pub mean_reprojection_error: f64,
    pub error_estimated: bool,
    /// Error below target, or the threshold is already at its floor.
    pub converged: bool,
}

impl RefinementPass {
    pub fn reached_target(&self, target: f64) -> bool {
        self.mean_reprojection_error < target
    }
}

/// Tightens a homography estimate one RANSAC threshold step at a time.
///
/// Holds no pass state; the caller threads the threshold through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomographyRefiner {
    pub reduction_factor: f64,
    pub min_threshold: f64,
    pub target_reprojection_error: f64,
    pub min_matches: usize,
}

impl Default for HomographyRefiner {
    fn default() -> Self {
        Self::new(&LandscapeConfig::default())
    }
}

impl HomographyRefiner {
    pub fn new(config: &LandscapeConfig) -> Self {
        Self {
            reduction_factor: config.reduction_factor,
            min_threshold: config.min_threshold,
            target_reprojection_error: config.target_reprojection_error,
            min_matches: config.min_matches.max(4),
        }
    }

    /// `max(previous * reduction_factor, min_threshold)`.
    pub fn next_threshold(&self, previous: f64) -> f64 {
        (previous * self.reduction_factor).max(self.min_threshold)
    }

    /// Rejects inputs a homography cannot be estimated from.
    pub fn check_inputs(
        &self,
        source: &[FeatureKeypoint],
        reference: &[FeatureKeypoint],
        matches: &[FeatureMatch],
    ) -> EngineResult<()> {
        if source.is_empty() {
            return Err(StabilizationError::EmptyKeypoints(KeypointSide::Source));
        }
        if reference.is_empty() {
            return Err(StabilizationError::EmptyKeypoints(KeypointSide::Reference));
        }
        if matches.len() < self.min_matches {
            return Err(StabilizationError::InsufficientCorrespondences {
                found: matches.len(),
                required: self.min_matches,
            });
        }
        Ok(())
    }

    /// Re-estimates the homography with the next, tighter threshold.
    pub async fn refine<M>(
        &self,
        matcher: &M,
        source: &[FeatureKeypoint],
        reference: &[FeatureKeypoint],
        matches: &[FeatureMatch],
        previous_threshold: f64,
    ) -> EngineResult<RefinementPass>
    where
        M: FeatureMatcher + ?Sized,
    {
        self.check_inputs(source, reference, matches)?;

        let threshold = self.next_threshold(previous_threshold);

        let estimate = matcher
            .compute_homography(source, reference, matches, threshold)
            .await
            .map_err(StabilizationError::from_matcher)?;
        if !estimate.matrix.is_finite() || estimate.matrix.normalized().is_none() {
            return Err(StabilizationError::Matcher(MatcherError::Backend(
                anyhow::anyhow!("degenerate homography estimate: {:?}", estimate.matrix),
            )));
        }

        let (mean_reprojection_error, error_estimated) = match matcher
            .reprojection_error(source, reference, matches, &estimate)
            .await
        {
            Ok(stats) => (stats.mean_error, false),
            Err(MatcherError::Unsupported(_)) => (threshold / 2.0, true),
            Err(err) => return Err(StabilizationError::from_matcher(err)),
        };

        let inlier_ratio = estimate.inlier_count as f64 / matches.len() as f64;
        let converged = mean_reprojection_error < self.target_reprojection_error
            || threshold <= self.min_threshold;

        Ok(RefinementPass {
            homography: estimate.matrix,
            threshold,
            inlier_count: estimate.inlier_count,
            inlier_ratio,
            mean_reprojection_error,
            error_estimated,
            converged,
        })
    }
}
