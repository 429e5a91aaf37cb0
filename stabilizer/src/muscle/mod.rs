//! Square crop regions for muscle-group timelapses.
//!
//! Runs after alignment on the aligned frame's body landmarks. Keypoints the pose
//! detector missed are estimated from the torso: the shoulder-to-hip distance sets
//! the scale for limb and head offsets.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::capability::ImageProcessor;
use crate::error::{EngineResult, StabilizationError};
use crate::geometry::{Bounds, PixelBounds};
use crate::landmarks::{BodyKeypoint, BodyLandmarks};


/// Fraction of the region size added on every side after margins.
pub const REGION_PADDING: f64 = 0.05;

/// Torso length assumed when only a single anchor point is known.
const DEFAULT_TORSO: f64 = 0.25;

// Limb offsets in torso lengths, straight down from the parent joint.
const UPPER_ARM: f64 = 0.6;
const FOREARM: f64 = 0.55;
const THIGH: f64 = 1.0;
const SHIN: f64 = 1.0;
const HEAD_ABOVE_NOSE: f64 = 0.3;
const HEAD_ABOVE_SHOULDERS: f64 = 0.75;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MuscleRegion {
    FullBody,
    UpperBody,
    LowerBody,
    Arms,
    Back,
}

/// Fixed margins around a region's keypoints, normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionMargins {
    pub horizontal: f64,
    pub top: f64,
    pub bottom: f64,
}

impl MuscleRegion {
    pub fn margins(self) -> RegionMargins {
        let (horizontal, top, bottom) = match self {
            MuscleRegion::FullBody => (0.05, 0.03, 0.03),
            MuscleRegion::UpperBody => (0.06, 0.08, 0.03),
            MuscleRegion::LowerBody => (0.05, 0.03, 0.03),
            MuscleRegion::Arms => (0.06, 0.04, 0.04),
            MuscleRegion::Back => (0.08, 0.06, 0.02),
        };
        RegionMargins {
            horizontal,
            top,
            bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuscleRegionBounds {
    pub region: MuscleRegion,
    pub bounds: Bounds,
}

impl MuscleRegionBounds {
    pub fn to_square_bounds(&self) -> Self {
        Self {
            region: self.region,
            bounds: self.bounds.to_square_bounds(),
        }
    }

    /// Square pixel crop for an image of the given size.
    pub fn crop_rect(&self, width: u32, height: u32) -> PixelBounds {
        self.bounds
            .to_pixel_bounds(width, height)
            .to_square(width, height)
    }
}

/// Square crop for `region` on an aligned frame.
///
/// `None` when the body has neither shoulders nor hips, or when every relevant
/// point lies outside the frame.
pub fn calculate_region_bounds(
    body: &BodyLandmarks,
    region: MuscleRegion,
) -> Option<MuscleRegionBounds> {
    let skeleton = Skeleton::estimate(body)?;
    let raw = Bounds::enclosing(skeleton.points(region))?;

    let m = region.margins();
    let bounds = Bounds::new(
        raw.left - m.horizontal,
        raw.top - m.top,
        raw.right + m.horizontal,
        raw.bottom + m.bottom,
    )
    .padded(REGION_PADDING)
    .clamped();

    if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
        return None;
    }

    Some(MuscleRegionBounds {
        region,
        bounds: bounds.to_square_bounds(),
    })
}

/// Crops `region` out of an aligned frame, resized to `size x size` when given.
///
/// `Ok(None)` when the region cannot be located on this body.
pub async fn crop_region<P: ImageProcessor>(
    processor: &P,
    image: &P::Image,
    body: &BodyLandmarks,
    region: MuscleRegion,
    size: Option<u32>,
) -> EngineResult<Option<P::Image>> {
    let Some(bounds) = calculate_region_bounds(body, region) else {
        log::debug!("{} region not found", region);
        return Ok(None);
    };

    let (width, height) = processor.dimensions(image);
    let rect = bounds.crop_rect(width, height);
    if rect.width == 0 || rect.height == 0 {
        return Ok(None);
    }

    let cropped = processor
        .crop_image(image, rect)
        .await
        .map_err(StabilizationError::Image)?;
    let Some(size) = size else {
        return Ok(Some(cropped));
    };

    processor
        .resize_image(&cropped, size, size, true)
        .await
        .map(Some)
        .map_err(StabilizationError::Image)
}

/// Every joint a region may need, detected or estimated.
#[derive(Debug, Clone, Copy)]
struct Skeleton {
    head_top: DVec2,
    shoulders: [DVec2; 2],
    elbows: [DVec2; 2],
    wrists: [DVec2; 2],
    hips: [DVec2; 2],
    knees: [DVec2; 2],
    ankles: [DVec2; 2],
}

impl Skeleton {
    fn estimate(body: &BodyLandmarks) -> Option<Self> {
        use BodyKeypoint::*;

        let get = |kp: BodyKeypoint| body.get(kp).map(|p| p.xy());
        let width_of = |a, b| match (get(a), get(b)) {
            (Some(a), Some(b)) => Some(a.distance(b)),
            _ => None,
        };

        let shoulder_center = body.center_of(LeftShoulder, RightShoulder);
        let hip_center = body.center_of(LeftHip, RightHip);
        let shoulder_width = width_of(LeftShoulder, RightShoulder);
        let hip_width = width_of(LeftHip, RightHip);

        let torso = match (shoulder_center, hip_center) {
            (Some(s), Some(h)) if s.distance(h) > f64::EPSILON => s.distance(h),
            _ => shoulder_width
                .map(|w| w * 1.2)
                .or(hip_width.map(|w| w * 1.6))
                .filter(|t| *t > f64::EPSILON)
                .unwrap_or(DEFAULT_TORSO),
        };
        let down = DVec2::new(0.0, torso);

        let (shoulder_center, hip_center) = match (shoulder_center, hip_center) {
            (Some(s), Some(h)) => (s, h),
            (Some(s), None) => (s, s + down),
            (None, Some(h)) => (h - down, h),
            (None, None) => return None,
        };

        let shoulder_half = DVec2::new(shoulder_width.unwrap_or(torso * 0.8) * 0.5, 0.0);
        let hip_half = DVec2::new(hip_width.unwrap_or(torso * 0.6) * 0.5, 0.0);

        let shoulders = [
            get(LeftShoulder).unwrap_or(shoulder_center - shoulder_half),
            get(RightShoulder).unwrap_or(shoulder_center + shoulder_half),
        ];
        let hips = [
            get(LeftHip).unwrap_or(hip_center - hip_half),
            get(RightHip).unwrap_or(hip_center + hip_half),
        ];
        let elbows = [
            get(LeftElbow).unwrap_or(shoulders[0] + down * UPPER_ARM),
            get(RightElbow).unwrap_or(shoulders[1] + down * UPPER_ARM),
        ];
        let wrists = [
            get(LeftWrist).unwrap_or(elbows[0] + down * FOREARM),
            get(RightWrist).unwrap_or(elbows[1] + down * FOREARM),
        ];
        let knees = [
            get(LeftKnee).unwrap_or(hips[0] + down * THIGH),
            get(RightKnee).unwrap_or(hips[1] + down * THIGH),
        ];
        let ankles = [
            get(LeftAnkle).unwrap_or(knees[0] + down * SHIN),
            get(RightAnkle).unwrap_or(knees[1] + down * SHIN),
        ];
        let head_top = get(Nose)
            .map(|nose| nose - down * HEAD_ABOVE_NOSE)
            .unwrap_or(shoulder_center - down * HEAD_ABOVE_SHOULDERS);

        Some(Self {
            head_top,
            shoulders,
            elbows,
            wrists,
            hips,
            knees,
            ankles,
        })
    }

    fn points(&self, region: MuscleRegion) -> Vec<DVec2> {
        let mut points = Vec::with_capacity(13);
        match region {
            MuscleRegion::FullBody => {
                points.push(self.head_top);
                points.extend(self.shoulders);
                points.extend(self.elbows);
                points.extend(self.wrists);
                points.extend(self.hips);
                points.extend(self.knees);
                points.extend(self.ankles);
            }
            MuscleRegion::UpperBody => {
                points.extend(self.shoulders);
                points.extend(self.elbows);
                points.extend(self.hips);
            }
            MuscleRegion::LowerBody => {
                points.extend(self.hips);
                points.extend(self.knees);
                points.extend(self.ankles);
            }
            MuscleRegion::Arms => {
                points.extend(self.shoulders);
                points.extend(self.elbows);
                points.extend(self.wrists);
            }
            MuscleRegion::Back => {
                points.extend(self.shoulders);
                points.extend(self.hips);
            }
        }
        points
    }
}
