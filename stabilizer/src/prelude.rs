//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stabilizer::prelude::*;
//! ```

// Capabilities
pub use crate::{BodyPoseDetector, FaceDetector, FeatureExtractor, FeatureMatcher, ImageProcessor};

// Errors
pub use crate::{DetectorError, EngineResult, MatcherError, StabilizationError};

// Geometry
pub use crate::{AlignmentMatrix, AnchorPair, BodyLandmarks, FaceLandmarks, HomographyMatrix};

// Face / body stabilization - main API
pub use crate::{
    EarlyStopReason, StabilizationConfig, StabilizationMode, StabilizationProgress,
    StabilizationResult, StabilizeOptions, Stabilizer,
};

// Landscape - main API
pub use crate::{LandscapeConfig, LandscapeOptions, LandscapeResult, LandscapeStabilizer};

// Crops
pub use crate::{MuscleRegion, calculate_region_bounds, crop_region};
