use crate::sample_bilinear_rgb_u8;
use image::RgbImage;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Planar projective transform acting on pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Hartley conditioning: move the centroid to the origin and scale so the mean
/// distance from it is sqrt(2).
fn condition_points(pts: &[Point2<f32>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len().max(1) as f64;
    let (sx, sy) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Undo conditioning (`T_dst^-1 * Hn * T_src`) and fix the scale so `h33 = 1`.
fn uncondition(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Homography> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / s))
}

/// Least-squares homography with `dst ~ H * src` from N >= 4 correspondences
/// (normalized DLT). Exactly four points are solved directly.
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if src.len() == 4 {
        let s: &[Point2<f32>; 4] = src.try_into().ok()?;
        let d: &[Point2<f32>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (s, ts) = condition_points(src);
    let (d, td) = condition_points(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (s[k].x, s[k].y);
        let (u, v) = (d[k].x, d[k].y);
        let r0 = 2 * k;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    // Null vector of A: last row of V^T.
    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let h = vt.row(vt.nrows().checked_sub(1)?);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    uncondition(hn, ts, td)
}

/// Exact homography with `dst ~ H * src` from four correspondences, listed in
/// the same corner order on both sides.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // h33 = 1, eight unknowns, two equations per point:
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (s, ts) = condition_points(src);
    let (d, td) = condition_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let (x, y) = (s[k].x, s[k].y);
        let (u, v) = (d[k].x, d[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = r0 + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    uncondition(hn, ts, td)
}

/// Inverse-map warp: every output pixel `(x, y)` is pulled from the source at
/// `h_src_from_dst * (x, y)` with bilinear sampling. Integer pixel coordinates
/// are used on both sides, so the identity transform reproduces the input.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    h_src_from_dst: &Homography,
    out_w: u32,
    out_h: u32,
) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let p = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
        if p.x.is_finite() && p.y.is_finite() {
            *px = sample_bilinear_rgb_u8(src, p.x, p.y);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.4},{:.4}) ~ ({:.4},{:.4}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn keystone() -> Homography {
        Homography::new(Matrix3::new(
            0.9, 0.08, 40.0, //
            -0.03, 1.15, 25.0, //
            0.0007, -0.0003, 1.0,
        ))
    }

    #[test]
    fn four_points_recover_keystone() {
        let gt = keystone();
        let quad = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(200.0, 0.0),
            Point2::new(200.0, 300.0),
            Point2::new(0.0, 300.0),
        ];
        let img = quad.map(|p| gt.apply(p));
        let h = homography_from_4pt(&quad, &img).expect("solvable");
        for p in [Point2::new(10.0_f32, 20.0), Point2::new(150.0, 260.0)] {
            assert_close(h.apply(p), gt.apply(p), 1e-3);
        }
    }

    #[test]
    fn overdetermined_fit_matches_ground_truth() {
        let gt = keystone();
        let src: Vec<Point2<f32>> = (0..4)
            .flat_map(|j| (0..5).map(move |i| Point2::new(i as f32 * 30.0, j as f32 * 30.0)))
            .collect();
        let dst: Vec<Point2<f32>> = src.iter().map(|&p| gt.apply(p)).collect();
        let h = estimate_homography(&src, &dst).expect("estimate");
        assert_close(h.apply(Point2::new(75.0, 45.0)), gt.apply(Point2::new(75.0, 45.0)), 1e-3);
        let back = h.inverse().expect("invertible");
        assert_close(back.apply(gt.apply(Point2::new(5.0, 80.0))), Point2::new(5.0, 80.0), 1e-2);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let src = [Point2::new(0.0_f32, 0.0); 4];
        let dst = [Point2::new(1.0_f32, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
        let collapsed = [Point2::new(3.0_f32, 3.0); 4];
        let square = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(homography_from_4pt(&square, &collapsed).is_none());
    }

    #[test]
    fn identity_warp_reproduces_image() {
        let mut src = RgbImage::new(6, 4);
        for (x, y, p) in src.enumerate_pixels_mut() {
            *p = Rgb([(x * 40) as u8, (y * 60) as u8, 7]);
        }
        let out = warp_perspective_rgb(&src, &Homography::identity(), 6, 4);
        assert_eq!(out, src);
    }

    #[test]
    fn translation_warp_shifts_content() {
        let mut src = RgbImage::new(8, 8);
        src.put_pixel(5, 6, Rgb([255, 0, 0]));
        let shift = Homography::new(Matrix3::new(1.0, 0.0, 3.0, 0.0, 1.0, 4.0, 0.0, 0.0, 1.0));
        let out = warp_perspective_rgb(&src, &shift, 4, 4);
        assert_eq!(*out.get_pixel(2, 2), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}
