//! Configuration types for the alignment engine.
//!
//! All tunables live here. Every struct deserializes with `#[serde(default)]`, so a
//! YAML/JSON file only needs the fields it changes (see [`common::load_config`]).
//! Engines call `validate()` on construction.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::ConfigError;
use crate::geometry::LandmarkPoint;
use crate::landmarks::AnchorPair;

// =============================================================================
// Face / body stabilization
// =============================================================================

/// Selects which refiners run and how many passes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StabilizationMode {
    /// Single translation-only pass.
    Fast,
    /// Bounded multi-pass translation + rotation + scale refinement.
    #[default]
    Slow,
}

/// What to do when the detector finds nothing mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Faces synthesize fallback landmarks, bodies do not.
    #[default]
    SubjectDefault,
    /// Always synthesize landmarks at the goal position.
    Synthesize,
    /// Never synthesize; the result carries no landmarks.
    Skip,
}

impl FallbackPolicy {
    pub fn resolve(self, subject_default: bool) -> bool {
        match self {
            FallbackPolicy::SubjectDefault => subject_default,
            FallbackPolicy::Synthesize => true,
            FallbackPolicy::Skip => false,
        }
    }
}

/// Default goal eyes on the output canvas, normalized.
pub const DEFAULT_FACE_GOAL: AnchorPair = AnchorPair::new(
    LandmarkPoint::new(0.35, 0.5),
    LandmarkPoint::new(0.65, 0.5),
);

/// Default goal shoulders on the output canvas, normalized.
pub const DEFAULT_BODY_GOAL: AnchorPair = AnchorPair::new(
    LandmarkPoint::new(0.35, 0.35),
    LandmarkPoint::new(0.65, 0.35),
);

/// Multi-pass face/body stabilization configuration.
///
/// The convergence thresholds were tuned empirically on phone timelapses; they are
/// starting points, not optima.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    pub mode: StabilizationMode,
    /// Pass budget for SLOW mode. FAST mode always runs exactly one pass.
    pub max_passes: u32,
    /// Output canvas size in pixels. Goal landmarks are normalized to it.
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Mean landmark error (pixels) below which a frame needs no further work.
    pub score_threshold: f64,
    /// Anchor pair delta-Y (pixels) at or below which rotation counts as converged.
    pub rotation_convergence_px: f64,
    /// Anchor distance error (pixels) at or below which scale counts as converged.
    pub scale_convergence_px: f64,
    /// Score improvement between passes below which translation counts as converged.
    pub min_score_improvement: f64,
    /// Average overshoot (pixels, per axis) below which translation is skipped.
    pub translation_noop_px: f64,
    /// Fraction of the measured rotation error applied per pass, `(0, 1]`.
    pub rotation_damping: f64,
    /// Fraction of the measured scale error applied per pass, `(0, 1]`.
    pub scale_damping: f64,
    /// Per-pass scale ratios outside this range are treated as bad detections and clamped.
    pub min_scale_ratio: f64,
    pub max_scale_ratio: f64,
    pub fallback_landmarks: FallbackPolicy,
    pub face_goal: AnchorPair,
    pub body_goal: AnchorPair,
    pub confidence: ConfidenceConfig,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::Slow,
            max_passes: 5,
            canvas_width: 512,
            canvas_height: 512,
            score_threshold: 0.5,
            rotation_convergence_px: 0.1,
            scale_convergence_px: 1.0,
            min_score_improvement: 0.05,
            translation_noop_px: 0.1,
            rotation_damping: 1.0,
            scale_damping: 0.5,
            min_scale_ratio: 0.5,
            max_scale_ratio: 2.0,
            fallback_landmarks: FallbackPolicy::SubjectDefault,
            face_goal: DEFAULT_FACE_GOAL,
            body_goal: DEFAULT_BODY_GOAL,
            confidence: ConfidenceConfig::default(),
        }
    }
}

impl StabilizationConfig {
    pub fn fast() -> Self {
        Self {
            mode: StabilizationMode::Fast,
            ..Self::default()
        }
    }

    pub fn slow() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Pass budget after applying the mode.
    pub fn effective_max_passes(&self) -> u32 {
        match self.mode {
            StabilizationMode::Fast => 1,
            StabilizationMode::Slow => self.max_passes,
        }
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.canvas_width as f64, self.canvas_height as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_passes == 0 {
            return Err(ConfigError::new("max_passes", "must be at least 1"));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::new(
                "canvas",
                format!(
                    "must be non-empty, got {}x{}",
                    self.canvas_width, self.canvas_height
                ),
            ));
        }
        require_non_negative("score_threshold", self.score_threshold)?;
        require_non_negative("rotation_convergence_px", self.rotation_convergence_px)?;
        require_non_negative("scale_convergence_px", self.scale_convergence_px)?;
        require_non_negative("min_score_improvement", self.min_score_improvement)?;
        require_non_negative("translation_noop_px", self.translation_noop_px)?;
        require_unit_fraction("rotation_damping", self.rotation_damping)?;
        require_unit_fraction("scale_damping", self.scale_damping)?;
        if !(self.min_scale_ratio > 0.0 && self.max_scale_ratio > self.min_scale_ratio) {
            return Err(ConfigError::new(
                "scale_ratio",
                format!(
                    "must satisfy 0 < min < max, got ({}, {})",
                    self.min_scale_ratio, self.max_scale_ratio
                ),
            ));
        }
        require_goal("face_goal", &self.face_goal)?;
        require_goal("body_goal", &self.body_goal)?;
        self.confidence.validate()
    }
}

// =============================================================================
// Confidence scoring
// =============================================================================

/// Weights for [`ConfidenceCalculator`](crate::confidence::ConfidenceCalculator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Used when the detector does not report its own confidence.
    pub unreported_detector_confidence: f64,
    /// Largest bonus for finishing in one pass; shrinks linearly to 0 at `max_passes`.
    pub pass_reward: f64,
    /// Mean landmark error (pixels) at which the error factor falls to `1/e`.
    pub score_falloff_px: f64,
    /// Confidence ceiling for runs that ended in a detection failure.
    pub detection_failure_cap: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            unreported_detector_confidence: 0.8,
            pass_reward: 0.1,
            score_falloff_px: 20.0,
            detection_failure_cap: 0.3,
        }
    }
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_probability(
            "confidence.unreported_detector_confidence",
            self.unreported_detector_confidence,
        )?;
        require_probability("confidence.pass_reward", self.pass_reward)?;
        require_probability("confidence.detection_failure_cap", self.detection_failure_cap)?;
        if !(self.score_falloff_px > 0.0) {
            return Err(ConfigError::new(
                "confidence.score_falloff_px",
                format!("must be positive, got {}", self.score_falloff_px),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Landscape (homography) refinement
// =============================================================================

/// Progressive-RANSAC landscape alignment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    /// RANSAC reprojection threshold (pixels) the first pass tightens from.
    pub initial_threshold: f64,
    /// Multiplier applied to the threshold each pass, `(0, 1)`.
    pub reduction_factor: f64,
    /// Floor the threshold never drops below.
    pub min_threshold: f64,
    /// Mean inlier reprojection error (pixels) that counts as converged.
    pub target_reprojection_error: f64,
    pub max_passes: u32,
    /// Minimum correspondences for homography estimation.
    pub min_matches: usize,
    /// Lowe ratio test threshold used when matching descriptors.
    pub ratio_threshold: f32,
    pub max_keypoints: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 5.0,
            reduction_factor: 0.6,
            min_threshold: 1.0,
            target_reprojection_error: 0.5,
            max_passes: 6,
            min_matches: 4,
            ratio_threshold: 0.75,
            max_keypoints: 2000,
            canvas_width: 1920,
            canvas_height: 1080,
        }
    }
}

impl LandscapeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_threshold > 0.0) {
            return Err(ConfigError::new(
                "min_threshold",
                format!("must be positive, got {}", self.min_threshold),
            ));
        }
        if !(self.initial_threshold >= self.min_threshold) {
            return Err(ConfigError::new(
                "initial_threshold",
                format!(
                    "must be >= min_threshold ({}), got {}",
                    self.min_threshold, self.initial_threshold
                ),
            ));
        }
        if !(self.reduction_factor > 0.0 && self.reduction_factor < 1.0) {
            return Err(ConfigError::new(
                "reduction_factor",
                format!("must be in (0, 1), got {}", self.reduction_factor),
            ));
        }
        require_non_negative("target_reprojection_error", self.target_reprojection_error)?;
        if self.max_passes == 0 {
            return Err(ConfigError::new("max_passes", "must be at least 1"));
        }
        if self.min_matches < 4 {
            return Err(ConfigError::new(
                "min_matches",
                format!("a homography needs at least 4, got {}", self.min_matches),
            ));
        }
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(ConfigError::new(
                "ratio_threshold",
                format!("must be in (0, 1], got {}", self.ratio_threshold),
            ));
        }
        if self.max_keypoints == 0 {
            return Err(ConfigError::new("max_keypoints", "must be at least 1"));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::new("canvas", "must be non-empty"));
        }
        Ok(())
    }
}

// Checks are written as negated comparisons so NaN is rejected too.

fn require_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) {
        return Err(ConfigError::new(
            field,
            format!("must be non-negative, got {}", value),
        ));
    }
    Ok(())
}

fn require_unit_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::new(
            field,
            format!("must be in (0, 1], got {}", value),
        ));
    }
    Ok(())
}

fn require_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::new(
            field,
            format!("must be in [0, 1], got {}", value),
        ));
    }
    Ok(())
}

fn require_goal(field: &'static str, goal: &AnchorPair) -> Result<(), ConfigError> {
    if !goal.is_finite() || goal.distance() <= 0.0 {
        return Err(ConfigError::new(
            field,
            "landmarks must be finite and distinct",
        ));
    }
    Ok(())
}
