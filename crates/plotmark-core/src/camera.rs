//! Pinhole camera with Brown-Conrady lens distortion.

use crate::sample_bilinear_rgb_u8;
use image::RgbImage;
use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CameraIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Pinhole intrinsics in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    #[serde(default)]
    pub skew: f64,
}

impl CameraIntrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            skew: k[(0, 1)],
        }
    }

    /// Pixel -> normalized image plane.
    #[inline]
    pub fn unproject(&self, p: Point2<f64>) -> Point2<f64> {
        let y = (p.y - self.cy) / self.fy;
        let x = (p.x - self.cx - self.skew * y) / self.fx;
        Point2::new(x, y)
    }

    /// Normalized image plane -> pixel.
    #[inline]
    pub fn project(&self, n: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * n.x + self.skew * n.y + self.cx,
            self.fy * n.y + self.cy,
        )
    }
}

/// Brown-Conrady coefficients in the usual `k1, k2, p1, p2, k3` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_coeffs(c: &[f64]) -> Self {
        let at = |i: usize| c.get(i).copied().unwrap_or(0.0);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        }
    }

    pub fn coeffs(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to a normalized point.
    #[inline]
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: Point2<f64>, iterations: usize) -> Point2<f64> {
        let mut x = d.x;
        let mut y = d.y;
        for _ in 0..iterations {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            if radial.abs() < 1e-12 {
                break;
            }
            x = (d.x - dx) / radial;
            y = (d.y - dy) / radial;
        }
        Point2::new(x, y)
    }
}

/// Camera matrix plus distortion coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    #[serde(default)]
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(intrinsics: CameraIntrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Build from a row-major 3x3 camera matrix and an OpenCV-style coefficient list.
    pub fn from_parts(matrix: [[f64; 3]; 3], coeffs: &[f64]) -> Self {
        let k = Matrix3::from_row_slice(&matrix.concat());
        Self::new(CameraIntrinsics::from_matrix(&k), Distortion::from_coeffs(coeffs))
    }

    /// Distortion-free camera centered on an image of the given size.
    pub fn ideal(width: u32, height: u32) -> Self {
        let f = width.max(height) as f64;
        Self::new(
            CameraIntrinsics {
                fx: f,
                fy: f,
                cx: (width as f64 - 1.0) * 0.5,
                cy: (height as f64 - 1.0) * 0.5,
                skew: 0.0,
            },
            Distortion::default(),
        )
    }

    /// Undistorted pixel -> observed (distorted) pixel.
    pub fn distort_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let n = self.intrinsics.unproject(p);
        self.intrinsics.project(self.distortion.distort(n))
    }

    /// Observed (distorted) pixel -> undistorted pixel.
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let n = self.intrinsics.unproject(p);
        self.intrinsics.project(self.distortion.undistort(n, 20))
    }

    /// Remove lens distortion, keeping the same camera matrix and image size.
    /// Pixels that map outside the source are black.
    pub fn undistort_image(&self, src: &RgbImage) -> RgbImage {
        if self.distortion.is_zero() {
            return src.clone();
        }
        let mut out = RgbImage::new(src.width(), src.height());
        for (x, y, px) in out.enumerate_pixels_mut() {
            let d = self.distort_pixel(Point2::new(x as f64, y as f64));
            *px = sample_bilinear_rgb_u8(src, d.x as f32, d.y as f32);
        }
        out
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CameraIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CameraIoError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
