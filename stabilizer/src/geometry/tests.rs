use super::*;
use glam::DVec2;
use std::f64::consts::PI;

const EPS: f64 = 1e-9;

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

fn vec_approx_eq(a: DVec2, b: DVec2, eps: f64) -> bool {
    approx_eq(a.x, b.x, eps) && approx_eq(a.y, b.y, eps)
}

// ── LandmarkPoint ───────────────────────────────────────────────────

#[test]
fn test_landmark_pixel_round_trip() {
    let p = LandmarkPoint::with_z(0.35, 0.5, 0.2);
    let px = p.to_pixels(512.0, 512.0);

    assert!(approx_eq(px.x, 179.2, EPS));
    assert!(approx_eq(px.y, 256.0, EPS));
    assert_eq!(px.z, 0.2, "z is carried through untouched");

    let back = px.to_normalized(512.0, 512.0);
    assert!(approx_eq(back.x, 0.35, EPS));
}

// ── AlignmentMatrix ─────────────────────────────────────────────────

#[test]
fn test_identity_apply() {
    let p = DVec2::new(12.5, -3.0);
    assert_eq!(AlignmentMatrix::identity().apply(p), p);
}

#[test]
fn test_translation_apply() {
    let m = AlignmentMatrix::translation(DVec2::new(25.6, -10.24));
    let p = m.apply(DVec2::new(153.6, 266.24));
    assert!(vec_approx_eq(p, DVec2::new(179.2, 256.0), EPS));
}

#[test]
fn test_compose_order() {
    let translate = AlignmentMatrix::translation(DVec2::new(10.0, 0.0));
    let rotate = AlignmentMatrix::similarity_about(DVec2::ZERO, PI / 2.0, 1.0);
    let p = DVec2::new(1.0, 0.0);

    // rotate first, then translate
    let rt = translate.compose(&rotate);
    assert!(vec_approx_eq(rt.apply(p), DVec2::new(10.0, 1.0), EPS));

    // translate first, then rotate
    let tr = rotate.compose(&translate);
    assert!(vec_approx_eq(tr.apply(p), DVec2::new(0.0, 11.0), EPS));

    // `then` reads in pipeline order
    assert_eq!(rotate.then(&translate), rt);
}

#[test]
fn test_compose_is_associative() {
    let a = AlignmentMatrix::from_array([1.1, 0.2, 3.0, -0.1, 0.9, -2.0]);
    let b = AlignmentMatrix::similarity_about(DVec2::new(50.0, 40.0), 0.3, 1.2);
    let c = AlignmentMatrix::translation(DVec2::new(-7.0, 4.5));

    let left = a.compose(&b).compose(&c);
    let right = a.compose(&b.compose(&c));

    for (l, r) in left.to_array().iter().zip(right.to_array().iter()) {
        assert!(approx_eq(*l, *r, 1e-9));
    }
}

#[test]
fn test_similarity_about_keeps_center_fixed() {
    let center = DVec2::new(256.0, 180.0);
    let m = AlignmentMatrix::similarity_about(center, 5.0_f64.to_radians(), 1.1);

    assert!(vec_approx_eq(m.apply(center), center, EPS));
    assert!(approx_eq(m.rotation_angle(), 5.0_f64.to_radians(), EPS));
    assert!(approx_eq(m.scale_factor(), 1.1, EPS));
}

#[test]
fn test_inverse_round_trip() {
    let m = AlignmentMatrix::similarity_about(DVec2::new(100.0, 50.0), 0.4, 0.8)
        .with_translation_delta(DVec2::new(12.0, -30.0));
    let inv = m.inverse().unwrap();
    let p = DVec2::new(321.0, 77.0);

    assert!(vec_approx_eq(inv.apply(m.apply(p)), p, 1e-9));
}

#[test]
fn test_inverse_singular() {
    let m = AlignmentMatrix::from_array([1.0, 2.0, 0.0, 2.0, 4.0, 0.0]);
    assert!(m.inverse().is_none());
}

#[test]
fn test_with_translation_delta_touches_translation_only() {
    let m = AlignmentMatrix::from_array([1.1, 0.2, 3.0, -0.1, 0.9, -2.0]);
    let shifted = m.with_translation_delta(DVec2::new(5.0, -1.0));

    assert_eq!(shifted.scale_x, m.scale_x);
    assert_eq!(shifted.skew_x, m.skew_x);
    assert_eq!(shifted.skew_y, m.skew_y);
    assert_eq!(shifted.scale_y, m.scale_y);
    assert!(approx_eq(shifted.translate_x, 8.0, EPS));
    assert!(approx_eq(shifted.translate_y, -3.0, EPS));
}

#[test]
fn test_affine_to_homography_agrees() {
    let m = AlignmentMatrix::from_array([1.1, 0.2, 3.0, -0.1, 0.9, -2.0]);
    let h = m.to_homography();
    let p = DVec2::new(40.0, -12.0);

    assert!(vec_approx_eq(h.apply(p).unwrap(), m.apply(p), EPS));
}

// ── HomographyMatrix ────────────────────────────────────────────────

#[test]
fn test_homography_perspective_divide() {
    let h = HomographyMatrix::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0]);
    let p = h.apply(DVec2::new(100.0, 50.0)).unwrap();

    // w = 1.1
    assert!(vec_approx_eq(p, DVec2::new(100.0 / 1.1, 50.0 / 1.1), EPS));
}

#[test]
fn test_homography_point_at_infinity() {
    let h = HomographyMatrix::from_array([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]);
    assert!(h.apply(DVec2::new(0.0, 5.0)).is_none());
}

#[test]
fn test_homography_inverse_round_trip() {
    let h = HomographyMatrix::from_array([1.02, 0.01, 5.0, -0.02, 0.98, -3.0, 1e-5, -2e-5, 1.0]);
    let inv = h.inverse().unwrap();
    let p = DVec2::new(320.0, 240.0);

    let back = inv.apply(h.apply(p).unwrap()).unwrap();
    assert!(vec_approx_eq(back, p, 1e-8));
    assert!(h.compose(&inv).is_near_identity(1e-9));
}

#[test]
fn test_homography_normalized() {
    let h = HomographyMatrix::from_array([2.0, 0.0, 4.0, 0.0, 2.0, 6.0, 0.0, 0.0, 2.0]);
    let n = h.normalized().unwrap();

    assert_eq!(n[8], 1.0);
    assert_eq!(n[2], 2.0);
    assert!(HomographyMatrix::from_array([0.0; 9]).normalized().is_none());
}

#[test]
fn test_homography_reprojection_error() {
    let h = HomographyMatrix::identity();
    let src = vec![DVec2::new(0.0, 0.0), DVec2::new(10.0, 0.0)];
    let dst = vec![DVec2::new(3.0, 4.0), DVec2::new(10.0, 0.0)];

    assert!(approx_eq(h.reprojection_error(&src, &dst).unwrap(), 2.5, EPS));
    assert!(h.reprojection_error(&[], &[]).is_none());
    assert!(h.reprojection_error(&src, &dst[..1]).is_none());
}

// ── Bounds ──────────────────────────────────────────────────────────

#[test]
fn test_bounds_enclosing_and_padding() {
    let b = Bounds::enclosing([
        DVec2::new(0.4, 0.2),
        DVec2::new(0.6, 0.3),
        DVec2::new(0.5, 0.6),
    ])
    .unwrap();

    assert!(approx_eq(b.width(), 0.2, EPS));
    assert!(approx_eq(b.height(), 0.4, EPS));

    let padded = b.padded(0.1);
    assert!(approx_eq(padded.left, 0.38, EPS));
    assert!(approx_eq(padded.bottom, 0.64, EPS));
    assert!(Bounds::enclosing(Vec::<DVec2>::new()).is_none());
}

#[test]
fn test_square_bounds_preserves_center() {
    let b = Bounds::new(0.4, 0.2, 0.6, 0.6);
    let sq = b.to_square_bounds();

    assert!(approx_eq(sq.width(), sq.height(), EPS));
    assert!(approx_eq(sq.width(), 0.4, EPS));
    assert!(vec_approx_eq(sq.center(), b.center(), EPS));
}

#[test]
fn test_square_bounds_shifted_inside_at_edge() {
    let b = Bounds::new(0.0, 0.1, 0.1, 0.7);
    let sq = b.to_square_bounds();

    assert!(approx_eq(sq.width(), sq.height(), EPS));
    assert!(approx_eq(sq.left, 0.0, EPS));
    assert!(approx_eq(sq.right, 0.6, EPS));
    // vertical center untouched
    assert!(approx_eq(sq.center().y, b.center().y, EPS));
}

#[test]
fn test_square_bounds_capped_at_frame() {
    let b = Bounds::new(0.0, 0.0, 1.0, 0.3);
    let sq = b.to_square_bounds();

    assert_eq!(sq, Bounds::FULL);
}

#[test]
fn test_pixel_bounds_round_outward() {
    let b = Bounds::new(0.101, 0.2, 0.499, 0.6);
    let px = b.to_pixel_bounds(100, 50);

    assert_eq!(px, PixelBounds { x: 10, y: 10, width: 40, height: 20 });
}

#[test]
fn test_pixel_bounds_square_and_clamp() {
    let px = PixelBounds { x: 80, y: 10, width: 30, height: 60 };

    let sq = px.to_square(100, 100);
    assert_eq!(sq.width, 60);
    assert_eq!(sq.height, 60);
    assert_eq!(sq.right(), 100, "shifted back inside the image");

    let clipped = px.clamp_to(100, 50);
    assert_eq!(clipped, PixelBounds { x: 80, y: 10, width: 20, height: 40 });
}
