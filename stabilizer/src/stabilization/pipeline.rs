use std::path::Path;
use std::time::Instant;

use common::CancelToken;
use glam::DVec2;

use super::{
    refine_rotation_scale, refine_translation, AnchorDetection, BodySubject, EarlyStopCriteria,
    EarlyStopReason, FaceSubject, OvershootCorrection, PassMetrics, ProgressSink,
    RotationScaleParams, StabilizationDiagnostics, StabilizationProgress, StabilizationResult,
    StabilizationStage, Subject,
};
use crate::capability::{BodyPoseDetector, FaceDetector, ImageProcessor};
use crate::confidence::ConfidenceCalculator;
use crate::config::{StabilizationConfig, StabilizationMode};
use crate::error::{check_cancelled, ConfigError, EngineResult, StabilizationError};
use crate::geometry::AlignmentMatrix;
use crate::landmarks::AnchorPair;

pub type FaceStabilizer<D, P> = Stabilizer<FaceSubject<D>, P>;
pub type BodyStabilizer<D, P> = Stabilizer<BodySubject<D>, P>;

/// Per-call inputs to [`Stabilizer::stabilize`].
#[derive(Default, Clone, Copy)]
pub struct StabilizeOptions<'a> {
    /// Goal anchor pair normalized to the canvas. Defaults to the configured goal
    /// for the subject.
    pub goal: Option<AnchorPair>,
    /// Starting transform. Defaults to identity.
    pub initial_matrix: Option<AlignmentMatrix>,
    pub progress: Option<&'a dyn ProgressSink>,
    /// Checked at the start of every pass.
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> StabilizeOptions<'a> {
    pub fn with_goal(mut self, goal: AnchorPair) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_initial_matrix(mut self, matrix: AlignmentMatrix) -> Self {
        self.initial_matrix = Some(matrix);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A candidate matrix together with what was measured on it.
#[derive(Debug, Clone, Copy)]
struct Measured {
    matrix: AlignmentMatrix,
    score: f64,
    detection: AnchorDetection,
    metrics: PassMetrics,
}

/// Multi-pass landmark stabilizer.
///
/// Holds no per-run state: one instance can serve any number of concurrent
/// `stabilize` calls.
#[derive(Debug)]
pub struct Stabilizer<S, P> {
    subject: S,
    processor: P,
    config: StabilizationConfig,
    criteria: EarlyStopCriteria,
    rotation_scale: RotationScaleParams,
    confidence: ConfidenceCalculator,
}

impl<D, P> Stabilizer<FaceSubject<D>, P>
where
    P: ImageProcessor,
    D: FaceDetector<P::Image>,
{
    pub fn face(
        detector: D,
        processor: P,
        config: StabilizationConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(FaceSubject::new(detector), processor, config)
    }
}

impl<D, P> Stabilizer<BodySubject<D>, P>
where
    P: ImageProcessor,
    D: BodyPoseDetector<P::Image>,
{
    pub fn body(
        detector: D,
        processor: P,
        config: StabilizationConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(BodySubject::new(detector), processor, config)
    }
}

impl<S, P> Stabilizer<S, P>
where
    P: ImageProcessor,
    S: Subject<P::Image>,
{
    pub fn new(subject: S, processor: P, config: StabilizationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            criteria: EarlyStopCriteria::from_config(&config),
            rotation_scale: RotationScaleParams::from_config(&config),
            confidence: ConfidenceCalculator::new(config.confidence.clone()),
            subject,
            processor,
            config,
        })
    }

    pub fn config(&self) -> &StabilizationConfig {
        &self.config
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Aligns `image` to the goal geometry.
    ///
    /// Detection failure, lack of improvement and an exhausted pass budget all end
    /// the run with `Ok` and the matching [`EarlyStopReason`]. `Err` is reserved for
    /// an unavailable detector, backend failures, image failures and cancellation.
    pub async fn stabilize(
        &self,
        image: &P::Image,
        options: StabilizeOptions<'_>,
    ) -> EngineResult<StabilizationResult> {
        let kind = self.subject.kind();
        if !self.subject.is_available() {
            return Err(StabilizationError::Unavailable(kind.capability()));
        }

        let start = Instant::now();
        let (width, height) = self.config.canvas_size();
        let goal = options
            .goal
            .unwrap_or_else(|| kind.default_goal(&self.config));
        let goal_px = goal.to_pixels(width, height);
        let initial = options.initial_matrix.unwrap_or_default();

        log::debug!(
            "{} stabilization started: mode {}, max passes {}, canvas {}x{}",
            kind,
            self.config.mode,
            self.criteria.max_passes,
            self.config.canvas_width,
            self.config.canvas_height
        );

        let result = match self.config.mode {
            StabilizationMode::Fast => {
                self.run_fast(image, &goal, &goal_px, initial, &options)
                    .await?
            }
            StabilizationMode::Slow => {
                self.run_slow(image, &goal, &goal_px, initial, &options)
                    .await?
            }
        };

        log::info!(
            "{} stabilization finished: {} after {}/{} pass(es), score {:.3?}, \
             confidence {:.3}, {:.1} ms",
            kind,
            result.reason,
            result.passes,
            result.max_passes,
            result.final_score,
            result.confidence,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
    }

    /// Loads `source`, stabilizes it and, when `output` is given, writes the aligned
    /// canvas there.
    pub async fn stabilize_file(
        &self,
        source: &Path,
        output: Option<&Path>,
        options: StabilizeOptions<'_>,
    ) -> EngineResult<StabilizationResult> {
        let image = self
            .processor
            .load_image(source)
            .await
            .map_err(StabilizationError::Image)?;

        let result = self.stabilize(&image, options).await?;

        if let Some(output) = output {
            let aligned = self.warp(&image, &result.matrix).await?;
            self.processor
                .save_image(&aligned, output)
                .await
                .map_err(StabilizationError::Image)?;
        }

        Ok(result)
    }

    /// Normalized anchor pair detected on an already aligned reference frame, for use
    /// as [`StabilizeOptions::goal`]. `None` when the reference has no usable subject.
    pub async fn goal_from_reference(
        &self,
        reference: &P::Image,
    ) -> EngineResult<Option<AnchorPair>> {
        let kind = self.subject.kind();
        if !self.subject.is_available() {
            return Err(StabilizationError::Unavailable(kind.capability()));
        }
        let detection = self
            .subject
            .detect_anchors(reference)
            .await
            .map_err(|err| StabilizationError::from_detector(kind.capability(), err))?;

        Ok(detection
            .map(|d| d.anchors)
            .filter(|anchors| anchors.is_finite() && anchors.distance() > 0.0))
    }

    async fn run_fast(
        &self,
        image: &P::Image,
        goal: &AnchorPair,
        goal_px: &AnchorPair,
        initial: AlignmentMatrix,
        options: &StabilizeOptions<'_>,
    ) -> EngineResult<StabilizationResult> {
        let mut diagnostics = StabilizationDiagnostics {
            goal: Some(*goal_px),
            ..Default::default()
        };

        check_cancelled(options.cancel)?;
        let Some(detection) = self.detect(image, &initial).await? else {
            return Ok(self.detection_failed(1, None, initial, goal, diagnostics, options));
        };

        let noop = self.config.translation_noop_px;
        let overshoot = OvershootCorrection::measure(&detection.anchors, goal_px, noop);
        let score = overshoot.current_score;
        diagnostics.initial_score = Some(score);
        diagnostics.score_history.push(score);

        let measured = Measured {
            matrix: initial,
            score,
            detection,
            metrics: PassMetrics::measure(1, &overshoot, None, &detection.anchors, goal_px),
        };
        if score < self.config.score_threshold {
            self.report(options, 1, StabilizationStage::Complete, Some(score));
            return Ok(self.finish(&measured, EarlyStopReason::ScoreBelowThreshold, 1, diagnostics));
        }

        let translation = refine_translation(&initial, &overshoot);
        let shift = DVec2::new(translation.correction_x, translation.correction_y);
        let anchors = detection
            .anchors
            .transformed(&AlignmentMatrix::translation(shift));
        let predicted = overshoot.residual_score_after_translation();
        let residual = OvershootCorrection::measure(&anchors, goal_px, noop);

        log::debug!(
            "fast pass: score {:.3} -> {:.3}, correction ({:.2}, {:.2})",
            score,
            predicted,
            translation.correction_x,
            translation.correction_y
        );

        let translated = Measured {
            matrix: translation.matrix,
            score: predicted,
            detection: AnchorDetection { anchors, ..detection },
            metrics: PassMetrics::measure(1, &residual, Some(score), &anchors, goal_px),
        };
        self.report(options, 1, StabilizationStage::Translation, Some(predicted));
        Ok(self.finish(&translated, EarlyStopReason::TranslationConverged, 1, diagnostics))
    }

    async fn run_slow(
        &self,
        image: &P::Image,
        goal: &AnchorPair,
        goal_px: &AnchorPair,
        initial: AlignmentMatrix,
        options: &StabilizeOptions<'_>,
    ) -> EngineResult<StabilizationResult> {
        let mut diagnostics = StabilizationDiagnostics {
            goal: Some(*goal_px),
            ..Default::default()
        };
        let mut current = initial;
        let mut best: Option<Measured> = None;
        let mut pass = 0;

        loop {
            pass += 1;
            check_cancelled(options.cancel)?;

            let Some(detection) = self.detect(image, &current).await? else {
                return Ok(self.detection_failed(pass, best, initial, goal, diagnostics, options));
            };

            let overshoot = OvershootCorrection::measure(
                &detection.anchors,
                goal_px,
                self.config.translation_noop_px,
            );
            let score = overshoot.current_score;
            diagnostics.initial_score.get_or_insert(score);
            diagnostics.score_history.push(score);

            let metrics = PassMetrics::measure(
                pass,
                &overshoot,
                best.map(|b| b.score),
                &detection.anchors,
                goal_px,
            );
            let measured = Measured {
                matrix: current,
                score,
                detection,
                metrics,
            };

            if let Some(reason) = self.criteria.evaluate(&metrics) {
                let kept = match (reason, best) {
                    (EarlyStopReason::NoImprovement, Some(previous)) => {
                        log::debug!(
                            "pass {} did not improve ({:.3} >= {:.3}), reverting",
                            pass,
                            score,
                            previous.score
                        );
                        diagnostics.discarded_passes += 1;
                        previous
                    }
                    _ => measured,
                };
                self.report(options, pass, StabilizationStage::Complete, Some(kept.score));
                return Ok(self.finish(&kept, reason, pass, diagnostics));
            }
            best = Some(measured);

            let translation = refine_translation(&current, &overshoot);
            let shift = DVec2::new(translation.correction_x, translation.correction_y);
            let translated = detection
                .anchors
                .transformed(&AlignmentMatrix::translation(shift));
            let refined = refine_rotation_scale(
                &translation.matrix,
                &translated,
                goal_px,
                &self.rotation_scale,
            );

            log::debug!(
                "pass {}: score {:.3}, dy {:.3}, dist err {:.3}, shift ({:.2}, {:.2}), \
                 rot {:.4} rad, scale {:.4}",
                pass,
                score,
                metrics.rotation_delta_y,
                metrics.distance_error,
                shift.x,
                shift.y,
                refined.rotation_applied,
                refined.scale_applied
            );

            current = refined.matrix;
            self.report(options, pass, StabilizationStage::RotationScale, Some(score));
        }
    }

    async fn warp(&self, image: &P::Image, matrix: &AlignmentMatrix) -> EngineResult<P::Image> {
        self.processor
            .warp_affine(
                image,
                matrix,
                self.config.canvas_width,
                self.config.canvas_height,
            )
            .await
            .map_err(StabilizationError::Image)
    }

    /// Warps with `matrix` and detects; anchors come back in canvas pixels.
    async fn detect(
        &self,
        image: &P::Image,
        matrix: &AlignmentMatrix,
    ) -> EngineResult<Option<AnchorDetection>> {
        let warped = self.warp(image, matrix).await?;
        let detection = self
            .subject
            .detect_anchors(&warped)
            .await
            .map_err(|err| {
                StabilizationError::from_detector(self.subject.kind().capability(), err)
            })?;

        let (width, height) = self.config.canvas_size();
        Ok(detection
            .filter(|d| d.anchors.is_finite())
            .map(|d| AnchorDetection {
                anchors: d.anchors.to_pixels(width, height),
                ..d
            }))
    }

    fn detection_failed(
        &self,
        pass: u32,
        best: Option<Measured>,
        initial: AlignmentMatrix,
        goal: &AnchorPair,
        mut diagnostics: StabilizationDiagnostics,
        options: &StabilizeOptions<'_>,
    ) -> StabilizationResult {
        let kind = self.subject.kind();
        log::warn!("{} detection failed on pass {}", kind, pass);

        if self
            .config
            .fallback_landmarks
            .resolve(kind.synthesizes_fallback())
        {
            diagnostics.fallback_landmarks = Some(*goal);
        }
        self.report(options, pass, StabilizationStage::Complete, None);

        match best {
            Some(best) => self.finish(&best, kind.failure_reason(), pass, diagnostics),
            None => {
                let mut result = StabilizationResult {
                    matrix: initial,
                    reason: kind.failure_reason(),
                    mode: self.config.mode,
                    passes: pass,
                    max_passes: self.criteria.max_passes,
                    final_score: None,
                    confidence: 0.0,
                    diagnostics,
                };
                result.confidence = self.confidence.calculate(&result);
                result
            }
        }
    }

    fn finish(
        &self,
        kept: &Measured,
        reason: EarlyStopReason,
        passes: u32,
        mut diagnostics: StabilizationDiagnostics,
    ) -> StabilizationResult {
        diagnostics.detected = Some(kept.detection.anchors);
        diagnostics.detector_confidence = kept.detection.confidence;
        diagnostics.rotation_delta_y = Some(kept.metrics.rotation_delta_y);
        diagnostics.distance_error = Some(kept.metrics.distance_error);

        let mut result = StabilizationResult {
            matrix: kept.matrix,
            reason,
            mode: self.config.mode,
            passes,
            max_passes: self.criteria.max_passes,
            final_score: Some(kept.score),
            confidence: 0.0,
            diagnostics,
        };
        result.confidence = self.confidence.calculate(&result);
        result
    }

    fn report(
        &self,
        options: &StabilizeOptions<'_>,
        pass: u32,
        stage: StabilizationStage,
        score: Option<f64>,
    ) {
        if let Some(sink) = options.progress {
            sink.report(StabilizationProgress::new(
                pass,
                self.criteria.max_passes,
                stage,
                score,
                Some(self.config.mode),
            ));
        }
    }
}
