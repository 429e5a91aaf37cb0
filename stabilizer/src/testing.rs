//! Deterministic collaborators for engine tests.
//!
//! Images are [`SyntheticFrame`]s: no pixels, just the projective map from scene
//! space (source pixels of the original photo) into the frame. Warping composes the
//! map, detectors push known scene landmarks through it, so a warp/detect round trip
//! behaves exactly like a real one without any image data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use glam::DVec2;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capability::{
    BodyPoseDetector, FaceDetector, FeatureExtractor, FeatureMatcher, ImageProcessor,
};
use crate::error::{DetectorError, MatcherError};
use crate::geometry::{AlignmentMatrix, HomographyMatrix, LandmarkPoint, PixelBounds};
use crate::landmarks::{AnchorPair, BodyKeypoint, BodyLandmarks, FaceLandmarks};
use crate::landscape::{
    FeatureKeypoint, FeatureMatch, FeatureSet, HomographyEstimate, ReprojectionStats,
};
use crate::stabilization::StabilizationProgress;

// =============================================================================
// Images
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFrame {
    pub width: u32,
    pub height: u32,
    /// Scene space to frame pixels.
    pub to_frame: HomographyMatrix,
}

impl SyntheticFrame {
    /// An original photo: scene space is its own pixel space.
    pub fn source(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            to_frame: HomographyMatrix::identity(),
        }
    }

    pub fn with_transform(width: u32, height: u32, to_frame: HomographyMatrix) -> Self {
        Self {
            width,
            height,
            to_frame,
        }
    }

    /// Scene point in this frame's pixels, `None` if it falls outside.
    pub fn project(&self, scene: DVec2) -> Option<DVec2> {
        let p = self.to_frame.apply(scene)?;
        let inside = (0.0..=self.width as f64).contains(&p.x)
            && (0.0..=self.height as f64).contains(&p.y);
        inside.then_some(p)
    }

    pub fn normalize(&self, p: DVec2) -> LandmarkPoint {
        LandmarkPoint::new(p.x / self.width as f64, p.y / self.height as f64)
    }
}

#[derive(Debug, Default)]
pub struct SyntheticProcessor {
    files: Mutex<HashMap<PathBuf, SyntheticFrame>>,
    saved: Mutex<Vec<(PathBuf, SyntheticFrame)>>,
    warps: AtomicUsize,
    fail_warps: bool,
}

impl SyntheticProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_warps() -> Self {
        Self {
            fail_warps: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>, frame: SyntheticFrame) -> Self {
        self.files.lock().insert(path.into(), frame);
        self
    }

    pub fn saved(&self) -> Vec<(PathBuf, SyntheticFrame)> {
        self.saved.lock().clone()
    }

    pub fn warp_count(&self) -> usize {
        self.warps.load(Ordering::SeqCst)
    }

    fn warp(
        &self,
        image: &SyntheticFrame,
        matrix: HomographyMatrix,
        width: u32,
        height: u32,
    ) -> anyhow::Result<SyntheticFrame> {
        self.warps.fetch_add(1, Ordering::SeqCst);
        if self.fail_warps {
            return Err(anyhow!("warp failed: out of memory"));
        }
        Ok(SyntheticFrame::with_transform(
            width,
            height,
            matrix.compose(&image.to_frame),
        ))
    }
}

#[async_trait]
impl ImageProcessor for SyntheticProcessor {
    type Image = SyntheticFrame;

    async fn load_image(&self, path: &Path) -> anyhow::Result<SyntheticFrame> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    async fn save_image(&self, image: &SyntheticFrame, path: &Path) -> anyhow::Result<()> {
        self.saved.lock().push((path.to_path_buf(), image.clone()));
        Ok(())
    }

    async fn crop_image(
        &self,
        image: &SyntheticFrame,
        bounds: PixelBounds,
    ) -> anyhow::Result<SyntheticFrame> {
        let offset = DVec2::new(-(bounds.x as f64), -(bounds.y as f64));
        let shift = AlignmentMatrix::translation(offset);
        self.warp(image, shift.to_homography(), bounds.width, bounds.height)
    }

    async fn resize_image(
        &self,
        image: &SyntheticFrame,
        width: u32,
        height: u32,
        maintain_aspect_ratio: bool,
    ) -> anyhow::Result<SyntheticFrame> {
        let mut sx = width as f64 / image.width as f64;
        let mut sy = height as f64 / image.height as f64;
        if maintain_aspect_ratio {
            sx = sx.min(sy);
            sy = sx;
        }
        let scale = AlignmentMatrix::from_array([sx, 0.0, 0.0, 0.0, sy, 0.0]);
        self.warp(
            image,
            scale.to_homography(),
            (image.width as f64 * sx).round() as u32,
            (image.height as f64 * sy).round() as u32,
        )
    }

    async fn warp_affine(
        &self,
        image: &SyntheticFrame,
        matrix: &AlignmentMatrix,
        width: u32,
        height: u32,
    ) -> anyhow::Result<SyntheticFrame> {
        self.warp(image, matrix.to_homography(), width, height)
    }

    async fn warp_perspective(
        &self,
        image: &SyntheticFrame,
        matrix: &HomographyMatrix,
        width: u32,
        height: u32,
    ) -> anyhow::Result<SyntheticFrame> {
        self.warp(image, *matrix, width, height)
    }

    fn dimensions(&self, image: &SyntheticFrame) -> (u32, u32) {
        (image.width, image.height)
    }
}

// =============================================================================
// Landmark detectors
// =============================================================================

/// Seeded landmark jitter, pixels.
#[derive(Debug)]
pub struct Jitter {
    rng: Mutex<StdRng>,
    amplitude: f64,
}

impl Jitter {
    pub fn new(seed: u64, amplitude: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            amplitude,
        }
    }

    fn offset(&self) -> DVec2 {
        let mut rng = self.rng.lock();
        DVec2::new(
            rng.random_range(-self.amplitude..=self.amplitude),
            rng.random_range(-self.amplitude..=self.amplitude),
        )
    }
}

/// Face detector that reports where the scene's eyes actually land in the frame.
#[derive(Debug)]
pub struct GeometryFaceDetector {
    /// Eyes in scene space.
    pub eyes: AnchorPair,
    pub confidence: Option<f32>,
    pub available: bool,
    jitter: Option<Jitter>,
    calls: AtomicUsize,
}

impl GeometryFaceDetector {
    pub fn new(left_eye: DVec2, right_eye: DVec2) -> Self {
        Self {
            eyes: AnchorPair::new(left_eye.into(), right_eye.into()),
            confidence: Some(0.95),
            available: true,
            jitter: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector<SyntheticFrame> for GeometryFaceDetector {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn detect_face(
        &self,
        image: &SyntheticFrame,
    ) -> Result<Option<FaceLandmarks>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let project = |p: LandmarkPoint| {
            let offset = self.jitter.as_ref().map(Jitter::offset).unwrap_or_default();
            image.project(p.xy()).map(|q| image.normalize(q + offset))
        };
        let (Some(left), Some(right)) = (project(self.eyes.left), project(self.eyes.right)) else {
            return Ok(None);
        };

        let mut face = FaceLandmarks::from_eyes(left, right);
        face.confidence = self.confidence;
        Ok(Some(face))
    }
}

/// One scripted detector response.
#[derive(Debug, Clone)]
pub enum Step {
    /// Eyes in normalized canvas coordinates.
    Face(AnchorPair),
    Nothing,
    Fail(&'static str),
    Unavailable,
}

/// Face detector that replays a fixed script, ignoring the image. The last step
/// repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedFaceDetector {
    steps: Vec<Step>,
    calls: AtomicUsize,
}

impl ScriptedFaceDetector {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
        }
    }

    /// Eyes given in canvas pixels, normalized against `canvas`.
    pub fn from_pixels(canvas: (f64, f64), pairs: &[AnchorPair]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|p| Step::Face(p.to_normalized(canvas.0, canvas.1)))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector<SyntheticFrame> for ScriptedFaceDetector {
    fn is_available(&self) -> bool {
        true
    }

    async fn detect_face(
        &self,
        _image: &SyntheticFrame,
    ) -> Result<Option<FaceLandmarks>, DetectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .get(call)
            .or(self.steps.last())
            .cloned()
            .unwrap_or(Step::Nothing);

        match step {
            Step::Face(eyes) => Ok(Some(FaceLandmarks::from_eyes(eyes.left, eyes.right))),
            Step::Nothing => Ok(None),
            Step::Fail(msg) => Err(DetectorError::Backend(anyhow!(msg))),
            Step::Unavailable => Err(DetectorError::Unavailable),
        }
    }
}

/// Body detector reporting scene keypoints projected into the frame.
#[derive(Debug)]
pub struct GeometryBodyDetector {
    pub keypoints: Vec<(BodyKeypoint, DVec2, f32)>,
    pub confidence: Option<f32>,
}

impl GeometryBodyDetector {
    pub fn new(left_shoulder: DVec2, right_shoulder: DVec2) -> Self {
        Self {
            keypoints: vec![
                (BodyKeypoint::LeftShoulder, left_shoulder, 0.9),
                (BodyKeypoint::RightShoulder, right_shoulder, 0.9),
            ],
            confidence: Some(0.85),
        }
    }
}

#[async_trait]
impl BodyPoseDetector<SyntheticFrame> for GeometryBodyDetector {
    fn is_available(&self) -> bool {
        true
    }

    async fn detect_body(
        &self,
        image: &SyntheticFrame,
    ) -> Result<Option<BodyLandmarks>, DetectorError> {
        let mut body = BodyLandmarks::new();
        for (keypoint, scene, visibility) in &self.keypoints {
            if let Some(p) = image.project(*scene) {
                body.insert(*keypoint, image.normalize(p), *visibility);
            }
        }
        if body.is_empty() {
            return Ok(None);
        }
        body.confidence = self.confidence;
        Ok(Some(body))
    }
}

// =============================================================================
// Feature matcher
// =============================================================================

/// Feature backend over a fixed set of scene points.
///
/// Keypoint descriptors are the scene point id, so matching is exact. Homographies
/// come from a normalized least-squares DLT, re-fit once on the inliers.
#[derive(Debug)]
pub struct DltMatcher {
    pub scene: Vec<DVec2>,
    pub available: bool,
    pub reports_reprojection: bool,
    noise: Option<Jitter>,
    thresholds: Mutex<Vec<f64>>,
}

impl DltMatcher {
    pub fn new(scene: Vec<DVec2>) -> Self {
        Self {
            scene,
            available: true,
            reports_reprojection: true,
            noise: None,
            thresholds: Mutex::new(Vec::new()),
        }
    }

    /// `cols x rows` grid of scene points covering `width x height`.
    pub fn grid(width: f64, height: f64, cols: usize, rows: usize) -> Self {
        let mut scene = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                scene.push(DVec2::new(
                    width * (c as f64 + 0.5) / cols as f64,
                    height * (r as f64 + 0.5) / rows as f64,
                ));
            }
        }
        Self::new(scene)
    }

    pub fn with_noise(mut self, noise: Jitter) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn without_reprojection(mut self) -> Self {
        self.reports_reprojection = false;
        self
    }

    /// RANSAC thresholds passed to `compute_homography`, in call order.
    pub fn thresholds(&self) -> Vec<f64> {
        self.thresholds.lock().clone()
    }

    /// Features of `frame` as plain data, for tests that skip detection.
    pub fn features_of(&self, frame: &SyntheticFrame) -> FeatureSet {
        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        for (id, scene) in self.scene.iter().enumerate() {
            if let Some(p) = frame.project(*scene) {
                let offset = self.noise.as_ref().map(Jitter::offset).unwrap_or_default();
                keypoints.push(FeatureKeypoint::new(p.x + offset.x, p.y + offset.y));
                descriptors.extend_from_slice(&(id as u32).to_le_bytes());
            }
        }
        FeatureSet::new(keypoints, descriptors, 4)
    }
}

#[async_trait]
impl FeatureExtractor<SyntheticFrame> for DltMatcher {
    async fn detect_features(
        &self,
        image: &SyntheticFrame,
        max_keypoints: usize,
    ) -> Result<FeatureSet, MatcherError> {
        let mut set = self.features_of(image);
        set.keypoints.truncate(max_keypoints);
        set.descriptors.truncate(max_keypoints * set.descriptor_len);
        Ok(set)
    }
}

#[async_trait]
impl FeatureMatcher for DltMatcher {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn match_features(
        &self,
        source: &FeatureSet,
        reference: &FeatureSet,
        _ratio_threshold: f32,
    ) -> Result<Vec<FeatureMatch>, MatcherError> {
        let reference_ids: HashMap<&[u8], usize> = (0..reference.len())
            .filter_map(|i| reference.descriptor(i).map(|d| (d, i)))
            .collect();

        Ok((0..source.len())
            .filter_map(|i| {
                let d = source.descriptor(i)?;
                reference_ids.get(d).map(|&j| FeatureMatch::new(i, j, 0.0))
            })
            .collect())
    }

    async fn compute_homography(
        &self,
        source: &[FeatureKeypoint],
        reference: &[FeatureKeypoint],
        matches: &[FeatureMatch],
        ransac_threshold: f64,
    ) -> Result<HomographyEstimate, MatcherError> {
        self.thresholds.lock().push(ransac_threshold);

        let (src, dst) = correspondences(source, reference, matches)?;
        let initial = estimate_homography(&src, &dst)
            .ok_or_else(|| MatcherError::Backend(anyhow!("degenerate point configuration")))?;

        let mask = inlier_mask(&initial, &src, &dst, ransac_threshold);
        let (inlier_src, inlier_dst): (Vec<DVec2>, Vec<DVec2>) = src
            .iter()
            .zip(&dst)
            .zip(&mask)
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| (*s, *d))
            .unzip();

        let matrix = estimate_homography(&inlier_src, &inlier_dst).unwrap_or(initial);
        let inlier_mask = inlier_mask(&matrix, &src, &dst, ransac_threshold);
        Ok(HomographyEstimate {
            matrix,
            inlier_count: inlier_mask.iter().filter(|i| **i).count(),
            inlier_mask,
        })
    }

    async fn reprojection_error(
        &self,
        source: &[FeatureKeypoint],
        reference: &[FeatureKeypoint],
        matches: &[FeatureMatch],
        estimate: &HomographyEstimate,
    ) -> Result<ReprojectionStats, MatcherError> {
        if !self.reports_reprojection {
            return Err(MatcherError::Unsupported("reprojection_error"));
        }
        let (src, dst) = correspondences(source, reference, matches)?;
        let errors: Vec<f64> = src
            .iter()
            .zip(&dst)
            .zip(&estimate.inlier_mask)
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| {
                estimate
                    .matrix
                    .apply(*s)
                    .map_or(f64::INFINITY, |p| p.distance(*d))
            })
            .collect();
        if errors.is_empty() {
            return Err(MatcherError::Backend(anyhow!("no inliers")));
        }
        Ok(ReprojectionStats {
            mean_error: errors.iter().sum::<f64>() / errors.len() as f64,
            max_error: errors.iter().copied().fold(0.0, f64::max),
            inlier_count: errors.len(),
        })
    }
}

fn correspondences(
    source: &[FeatureKeypoint],
    reference: &[FeatureKeypoint],
    matches: &[FeatureMatch],
) -> Result<(Vec<DVec2>, Vec<DVec2>), MatcherError> {
    matches
        .iter()
        .map(|m| {
            let s = source.get(m.source_index);
            let r = reference.get(m.reference_index);
            match (s, r) {
                (Some(s), Some(r)) => Ok((s.pos(), r.pos())),
                _ => Err(MatcherError::Backend(anyhow!("match index out of range"))),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|pairs| pairs.into_iter().unzip())
}

fn inlier_mask(h: &HomographyMatrix, src: &[DVec2], dst: &[DVec2], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| h.apply(*s).is_some_and(|p| p.distance(*d) <= threshold))
        .collect()
}

/// Least-squares DLT with `h[8] = 1`, on Hartley-normalized points.
pub fn estimate_homography(src: &[DVec2], dst: &[DVec2]) -> Option<HomographyMatrix> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }

    let (src_n, src_t) = normalize_points(src)?;
    let (dst_n, dst_t) = normalize_points(dst)?;

    // Each correspondence contributes two rows:
    // [x y 1 0 0 0 -x*u -y*u] h = u
    // [0 0 0 x y 1 -x*v -y*v] h = v
    let mut ata = [[0.0f64; 8]; 8];
    let mut atb = [0.0f64; 8];
    for (s, d) in src_n.iter().zip(&dst_n) {
        let rows = [
            ([s.x, s.y, 1.0, 0.0, 0.0, 0.0, -s.x * d.x, -s.y * d.x], d.x),
            ([0.0, 0.0, 0.0, s.x, s.y, 1.0, -s.x * d.y, -s.y * d.y], d.y),
        ];
        for (row, rhs) in rows {
            for j in 0..8 {
                atb[j] += row[j] * rhs;
                for k in 0..8 {
                    ata[j][k] += row[j] * row[k];
                }
            }
        }
    }

    let h = solve_8x8(ata, atb)?;
    let h_norm =
        HomographyMatrix::from_array([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]);

    // H = T_dst^-1 * H_norm * T_src
    dst_t.inverse()?.compose(&h_norm).compose(&src_t).normalized()
}

/// Centroid at the origin, mean distance sqrt(2). `None` when all points coincide.
fn normalize_points(points: &[DVec2]) -> Option<(Vec<DVec2>, HomographyMatrix)> {
    let n = points.len() as f64;
    let centroid = points.iter().copied().sum::<DVec2>() / n;
    let mean_dist = points.iter().map(|p| p.distance(centroid)).sum::<f64>() / n;
    if mean_dist < 1e-10 {
        return None;
    }

    let scale = std::f64::consts::SQRT_2 / mean_dist;
    let normalized = points.iter().map(|p| (*p - centroid) * scale).collect();
    let t = HomographyMatrix::from_array([
        scale,
        0.0,
        -centroid.x * scale,
        0.0,
        scale,
        -centroid.y * scale,
        0.0,
        0.0,
        1.0,
    ]);
    Some((normalized, t))
}

/// Gaussian elimination with partial pivoting.
fn solve_8x8(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..8 {
            let factor = a[row][col] / a[col][col];
            for k in col..8 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 8];
    for row in (0..8).rev() {
        let tail: f64 = (row + 1..8).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

// =============================================================================
// Progress
// =============================================================================

/// Collects every progress update, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<StabilizationProgress>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<StabilizationProgress> {
        self.updates.lock().clone()
    }
}

impl crate::stabilization::ProgressSink for RecordingSink {
    fn report(&self, progress: StabilizationProgress) {
        self.updates.lock().push(progress);
    }
}
