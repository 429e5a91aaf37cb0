//! Stabilizer - multi-pass alignment engine for timelapse photos.
//!
//! Aligns each frame of a timelapse to a common goal geometry:
//! - Face and body frames: landmark-driven affine refinement (translation, then
//!   rotation and scale) over a bounded number of detect/correct passes
//! - Landscape frames: feature matching and progressive-RANSAC homography refinement
//! - Muscle-group crops: square regions computed from body landmarks
//!
//! Detection, matching and pixel work are injected through [`ImageProcessor`],
//! [`FaceDetector`], [`BodyPoseDetector`], [`FeatureExtractor`] and [`FeatureMatcher`];
//! the engine only does geometry.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stabilizer::prelude::*;
//!
//! let stabilizer = Stabilizer::face(my_detector, my_processor, StabilizationConfig::slow())?;
//! let output = Path::new("out/day_042.jpg");
//! let result = stabilizer
//!     .stabilize_file(Path::new("day_042.jpg"), Some(output), StabilizeOptions::default())
//!     .await?;
//!
//! println!("{} after {} passes", result.reason, result.passes);
//! ```

pub(crate) mod capability;
pub(crate) mod confidence;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod geometry;
pub(crate) mod landmarks;
pub(crate) mod landscape;
pub(crate) mod muscle;
pub(crate) mod stabilization;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude;

// ============================================================================
// Capabilities and errors
// ============================================================================

pub use capability::{
    BodyPoseDetector, FaceDetector, FeatureExtractor, FeatureMatcher, ImageProcessor,
};
pub use error::{
    Capability, ConfigError, DetectorError, EngineResult, KeypointSide, MatcherError,
    StabilizationError,
};

// ============================================================================
// Geometry and landmarks
// ============================================================================

pub use geometry::{AlignmentMatrix, Bounds, HomographyMatrix, LandmarkPoint, PixelBounds};
pub use landmarks::{
    AnchorPair, BodyKeypoint, BodyLandmarks, FaceLandmarks, KeypointObservation,
    MIN_KEYPOINT_VISIBILITY,
};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    ConfidenceConfig, FallbackPolicy, LandscapeConfig, StabilizationConfig, StabilizationMode,
    DEFAULT_BODY_GOAL, DEFAULT_FACE_GOAL,
};

// ============================================================================
// Face / body stabilization
// ============================================================================

pub use stabilization::{
    progress_channel, refine_rotation_scale, refine_translation, AnchorDetection,
    BodyStabilizer, BodySubject, EarlyStopCriteria, EarlyStopReason, FaceStabilizer,
    FaceSubject, OvershootCorrection, PassMetrics, ProgressReceiver, ProgressSink,
    RotationScaleParams, RotationScaleRefinement, StabilizationDiagnostics,
    StabilizationProgress, StabilizationResult, StabilizationStage, StabilizeOptions,
    Stabilizer, Subject, SubjectKind, TranslationRefinement,
};

// ============================================================================
// Landscape alignment
// ============================================================================

pub use landscape::{
    FeatureKeypoint, FeatureMatch, FeatureSet, HomographyEstimate, HomographyRefiner,
    LandscapeOptions, LandscapeResult, LandscapeStabilizer, LandscapeStopReason,
    RefinementPass, ReprojectionStats,
};

// ============================================================================
// Confidence and crops
// ============================================================================

pub use confidence::{estimate_overlap, landscape_quality, ConfidenceCalculator};
pub use muscle::{
    calculate_region_bounds, crop_region, MuscleRegion, MuscleRegionBounds, RegionMargins,
    REGION_PADDING,
};
