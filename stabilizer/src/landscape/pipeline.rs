use std::path::Path;
use std::time::Instant;

use common::CancelToken;

use super::{FeatureMatch, FeatureSet, HomographyRefiner, LandscapeResult, LandscapeStopReason};
use crate::capability::{FeatureExtractor, FeatureMatcher, ImageProcessor};
use crate::config::LandscapeConfig;
use crate::confidence::{estimate_overlap, landscape_quality};
use crate::error::{
    check_cancelled, Capability, ConfigError, EngineResult, KeypointSide, StabilizationError,
};
use crate::stabilization::{ProgressSink, StabilizationProgress, StabilizationStage};

/// Per-call inputs to [`LandscapeStabilizer::align`].
#[derive(Default, Clone, Copy)]
pub struct LandscapeOptions<'a> {
    pub progress: Option<&'a dyn ProgressSink>,
    /// Checked at the start of every pass.
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> LandscapeOptions<'a> {
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Registers a source frame against a reference frame of the same static scene.
#[derive(Debug)]
pub struct LandscapeStabilizer<M, P> {
    matcher: M,
    processor: P,
    config: LandscapeConfig,
    refiner: HomographyRefiner,
}

impl<M, P> LandscapeStabilizer<M, P>
where
    P: ImageProcessor,
    M: FeatureMatcher + FeatureExtractor<P::Image>,
{
    pub fn new(matcher: M, processor: P, config: LandscapeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            refiner: HomographyRefiner::new(&config),
            matcher,
            processor,
            config,
        })
    }

    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }

    pub fn refiner(&self) -> &HomographyRefiner {
        &self.refiner
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Detects and matches features on both frames, then refines the homography.
    pub async fn align(
        &self,
        source: &P::Image,
        reference: &P::Image,
        options: LandscapeOptions<'_>,
    ) -> EngineResult<LandscapeResult> {
        self.ensure_available()?;
        check_cancelled(options.cancel)?;

        let max_keypoints = self.config.max_keypoints;
        let source_features = self
            .matcher
            .detect_features(source, max_keypoints)
            .await
            .map_err(StabilizationError::from_matcher)?;
        if source_features.is_empty() {
            return Err(StabilizationError::EmptyKeypoints(KeypointSide::Source));
        }
        let reference_features = self
            .matcher
            .detect_features(reference, max_keypoints)
            .await
            .map_err(StabilizationError::from_matcher)?;
        if reference_features.is_empty() {
            return Err(StabilizationError::EmptyKeypoints(KeypointSide::Reference));
        }

        let matches = self
            .matcher
            .match_features(
                &source_features,
                &reference_features,
                self.config.ratio_threshold,
            )
            .await
            .map_err(StabilizationError::from_matcher)?;

        log::debug!(
            "landscape features: {} source, {} reference, {} matches",
            source_features.len(),
            reference_features.len(),
            matches.len()
        );

        self.align_features(&source_features, &reference_features, &matches, options)
            .await
    }

    /// Runs the refinement loop on already extracted features and matches.
    pub async fn align_features(
        &self,
        source: &FeatureSet,
        reference: &FeatureSet,
        matches: &[FeatureMatch],
        options: LandscapeOptions<'_>,
    ) -> EngineResult<LandscapeResult> {
        self.ensure_available()?;
        self.refiner
            .check_inputs(&source.keypoints, &reference.keypoints, matches)?;

        let start = Instant::now();
        let max_passes = self.config.max_passes;
        let mut threshold = self.config.initial_threshold;
        let mut error_history = Vec::new();
        let mut pass = 0;

        loop {
            pass += 1;
            check_cancelled(options.cancel)?;

            let refined = self
                .refiner
                .refine(
                    &self.matcher,
                    &source.keypoints,
                    &reference.keypoints,
                    matches,
                    threshold,
                )
                .await?;
            error_history.push(refined.mean_reprojection_error);

            log::debug!(
                "landscape pass {}: threshold {:.3}, inliers {}/{}, error {:.3}{}",
                pass,
                refined.threshold,
                refined.inlier_count,
                matches.len(),
                refined.mean_reprojection_error,
                if refined.error_estimated { " (estimated)" } else { "" }
            );

            let reason = if refined.reached_target(self.config.target_reprojection_error) {
                Some(LandscapeStopReason::ReprojectionConverged)
            } else if refined.converged {
                Some(LandscapeStopReason::ThresholdFloorReached)
            } else if pass >= max_passes {
                Some(LandscapeStopReason::MaxPassesReached)
            } else {
                None
            };

            let stage = if reason.is_some() {
                StabilizationStage::Complete
            } else {
                StabilizationStage::HomographyRefinement
            };
            if let Some(sink) = options.progress {
                sink.report(StabilizationProgress::new(
                    pass,
                    max_passes,
                    stage,
                    Some(refined.mean_reprojection_error),
                    None,
                ));
            }

            let Some(reason) = reason else {
                threshold = refined.threshold;
                continue;
            };

            let overlap = estimate_overlap(
                self.config.canvas_width as f64,
                self.config.canvas_height as f64,
                &refined.homography,
            );
            let confidence = landscape_quality(
                refined.mean_reprojection_error,
                refined.inlier_count,
                matches.len(),
                overlap,
            );

            log::info!(
                "landscape alignment finished: {} after {}/{} pass(es), error {:.3}, \
                 confidence {:.3}, {:.1} ms",
                reason,
                pass,
                max_passes,
                refined.mean_reprojection_error,
                confidence,
                start.elapsed().as_secs_f64() * 1000.0
            );

            return Ok(LandscapeResult {
                homography: refined.homography,
                reason,
                passes: pass,
                max_passes,
                final_threshold: refined.threshold,
                mean_reprojection_error: refined.mean_reprojection_error,
                reprojection_error_estimated: refined.error_estimated,
                inlier_count: refined.inlier_count,
                match_count: matches.len(),
                inlier_ratio: refined.inlier_ratio,
                error_history,
                confidence,
            });
        }
    }

    /// Loads both frames, aligns them and, when `output` is given, writes the source
    /// warped onto the configured canvas there.
    pub async fn align_file(
        &self,
        source: &Path,
        reference: &Path,
        output: Option<&Path>,
        options: LandscapeOptions<'_>,
    ) -> EngineResult<LandscapeResult> {
        let source_image = self
            .processor
            .load_image(source)
            .await
            .map_err(StabilizationError::Image)?;
        let reference_image = self
            .processor
            .load_image(reference)
            .await
            .map_err(StabilizationError::Image)?;

        let result = self.align(&source_image, &reference_image, options).await?;

        if let Some(output) = output {
            let warped = self
                .processor
                .warp_perspective(
                    &source_image,
                    &result.homography,
                    self.config.canvas_width,
                    self.config.canvas_height,
                )
                .await
                .map_err(StabilizationError::Image)?;
            self.processor
                .save_image(&warped, output)
                .await
                .map_err(StabilizationError::Image)?;
        }

        Ok(result)
    }

    fn ensure_available(&self) -> EngineResult<()> {
        if self.matcher.is_available() {
            Ok(())
        } else {
            Err(StabilizationError::Unavailable(Capability::FeatureMatcher))
        }
    }
}
