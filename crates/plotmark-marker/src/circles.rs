//! Gradient-voting circle detector.
//!
//! Every pixel with a strong gradient votes along its gradient line at all
//! radii of the search range, in both directions. Disk boundaries make the
//! votes converge on the disk center. Accumulator peaks are taken strongest
//! first with a minimum spacing between accepted centers, and each survivor
//! gets its radius from the radial gradient profile around it.

use crate::CircleDetectorParams;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f32::consts::PI;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2<f32>,
    pub radius: f32,
    /// Smoothed accumulator value at the center.
    pub votes: f32,
}

/// Edge pixels and their gradients, ready for voting.
struct EdgeMap {
    width: usize,
    height: usize,
    gx: Vec<f32>,
    gy: Vec<f32>,
    threshold_sq: f32,
}

impl EdgeMap {
    fn new(gray: &GrayImage, grad_threshold: f32) -> Option<Self> {
        let (w, h) = gray.dimensions();
        let gx: Vec<f32> = horizontal_scharr(gray).as_raw().iter().map(|&v| v as f32).collect();
        let gy: Vec<f32> = vertical_scharr(gray).as_raw().iter().map(|&v| v as f32).collect();
        let max_sq = gx
            .iter()
            .zip(&gy)
            .map(|(a, b)| a * a + b * b)
            .fold(0.0f32, f32::max);
        if max_sq < 1e-12 {
            return None;
        }
        let threshold = grad_threshold * max_sq.sqrt();
        Some(Self {
            width: w as usize,
            height: h as usize,
            gx,
            gy,
            threshold_sq: threshold * threshold,
        })
    }

    fn edge(&self, idx: usize) -> Option<(f32, f32, f32)> {
        let (gx, gy) = (self.gx[idx], self.gy[idx]);
        let mag_sq = gx * gx + gy * gy;
        (mag_sq >= self.threshold_sq).then(|| {
            let mag = mag_sq.sqrt();
            (gx / mag, gy / mag, mag)
        })
    }
}

/// Spread `weight` over the four pixels around `(x, y)`.
#[inline]
fn splat(accum: &mut [f32], stride: usize, x: f32, y: f32, weight: f32) {
    let x0 = x as usize;
    let y0 = y as usize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let base = y0 * stride + x0;
    accum[base] += weight * (1.0 - fx) * (1.0 - fy);
    accum[base + 1] += weight * fx * (1.0 - fy);
    accum[base + stride] += weight * (1.0 - fx) * fy;
    accum[base + stride + 1] += weight * fx * fy;
}

fn vote(edges: &EdgeMap, r_min: f32, r_max: f32) -> Vec<f32> {
    let (w, h) = (edges.width, edges.height);
    let mut accum = vec![0.0f32; w * h];
    let x_limit = (w - 1) as f32;
    let y_limit = (h - 1) as f32;
    let radii: Vec<f32> = (0..)
        .map(|k| r_min + k as f32)
        .take_while(|&r| r <= r_max)
        .collect();

    for y in 0..h {
        for x in 0..w {
            let Some((dx, dy, mag)) = edges.edge(y * w + x) else {
                continue;
            };
            let (xf, yf) = (x as f32, y as f32);
            for &r in &radii {
                for s in [r, -r] {
                    let vx = xf + dx * s;
                    let vy = yf + dy * s;
                    if vx >= 0.0 && vx < x_limit && vy >= 0.0 && vy < y_limit {
                        splat(&mut accum, w, vx, vy, mag);
                    }
                }
            }
        }
    }
    accum
}

/// Local maxima of the 3x3 neighborhood above `threshold`, strongest first.
fn peaks(acc: &[f32], w: usize, h: usize, threshold: f32) -> Vec<(usize, usize, f32)> {
    let mut out = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let v = acc[y * w + x];
            if v < threshold {
                continue;
            }
            let mut is_max = true;
            'nbhd: for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if n != y * w + x && (acc[n] > v || (acc[n] == v && n < y * w + x)) {
                        is_max = false;
                        break 'nbhd;
                    }
                }
            }
            if is_max {
                out.push((x, y, v));
            }
        }
    }
    out.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
    out
}

/// Radius with the strongest inward-or-outward gradient ring around `center`,
/// provided enough of that ring carries edge pixels.
fn fit_radius(
    edges: &EdgeMap,
    center: Point2<f32>,
    r_min: f32,
    r_max: f32,
    min_support: f32,
) -> Option<f32> {
    let bins = r_max.ceil() as usize + 2;
    let mut strength = vec![0.0f32; bins];
    let mut hits = vec![0u32; bins];
    let reach = r_max.ceil() as i64 + 1;
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);

    for y in (cy - reach).max(0)..=(cy + reach).min(edges.height as i64 - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(edges.width as i64 - 1) {
            let Some((dx, dy, mag)) = edges.edge(y as usize * edges.width + x as usize) else {
                continue;
            };
            let (ox, oy) = (x as f32 - center.x, y as f32 - center.y);
            let d = (ox * ox + oy * oy).sqrt();
            let bin = d.round() as usize;
            if d < 1.0 || bin >= bins {
                continue;
            }
            let radial = ((dx * ox + dy * oy) / d).abs();
            strength[bin] += radial * mag;
            hits[bin] += 1;
        }
    }

    let lo = r_min.floor().max(1.0) as usize;
    let hi = (r_max.ceil() as usize).min(bins - 1);
    let mut best: Option<(usize, f32)> = None;
    for r in lo..=hi {
        let score = strength[r] / (2.0 * PI * r as f32);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((r, score));
        }
    }
    let (r, _) = best?;
    let support = hits[r] as f32 / (2.0 * PI * r as f32);
    (support >= min_support).then_some(r as f32)
}

/// Circles in `gray` with radii in `[min_radius_ratio, max_radius_ratio] * diameter`,
/// no two centers closer than `min_dist`. Sorted by vote strength.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(gray, params), fields(w = gray.width(), h = gray.height()))
)]
pub fn detect_circles(
    gray: &GrayImage,
    diameter: f32,
    min_dist: f32,
    params: &CircleDetectorParams,
) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 4 || h < 4 || diameter.is_nan() || diameter <= 0.0 {
        return Vec::new();
    }
    let r_min = (params.min_radius_ratio * diameter).max(1.0);
    let r_max = params.max_radius_ratio * diameter;
    if r_max < r_min {
        return Vec::new();
    }
    let Some(edges) = EdgeMap::new(gray, params.grad_threshold) else {
        return Vec::new();
    };

    let accum = vote(&edges, r_min, r_max);
    let Some(accum_img) = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w, h, accum) else {
        return Vec::new();
    };
    let smoothed = if params.accum_sigma > 0.0 {
        gaussian_blur_f32(&accum_img, params.accum_sigma)
    } else {
        accum_img
    };
    let acc = smoothed.as_raw();
    let max_val = acc.iter().copied().fold(0.0f32, f32::max);
    if max_val < 1e-6 {
        return Vec::new();
    }

    let candidates = peaks(acc, w as usize, h as usize, params.min_vote_frac * max_val);
    log::debug!("{} accumulator peaks", candidates.len());

    let min_dist_sq = min_dist * min_dist;
    let mut circles: Vec<Circle> = Vec::new();
    for (x, y, votes) in candidates.into_iter().take(params.max_candidates) {
        let center = Point2::new(x as f32, y as f32);
        if circles
            .iter()
            .any(|c| (c.center - center).norm_squared() < min_dist_sq)
        {
            continue;
        }
        if let Some(radius) = fit_radius(&edges, center, r_min, r_max, params.min_edge_support) {
            circles.push(Circle {
                center,
                radius,
                votes,
            });
        }
    }
    circles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_image(w: u32, h: u32, disks: &[(f32, f32, f32)]) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = disks.iter().any(|&(cx, cy, r)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= r * r
            });
            Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn finds_single_disk() {
        let img = gaussian_blur_f32(&disk_image(100, 100, &[(50.0, 45.0, 15.0)]), 1.5);
        let circles = detect_circles(&img, 30.0, 45.0, &CircleDetectorParams::default());
        assert_eq!(circles.len(), 1, "{:?}", circles);
        let c = circles[0];
        assert!((c.center.x - 50.0).abs() <= 2.0 && (c.center.y - 45.0).abs() <= 2.0);
        assert!((c.radius - 15.0).abs() <= 2.0, "radius {}", c.radius);
    }

    #[test]
    fn separates_disks_and_measures_each() {
        let img = gaussian_blur_f32(
            &disk_image(220, 100, &[(40.0, 50.0, 18.0), (120.0, 50.0, 12.0), (185.0, 50.0, 9.0)]),
            1.5,
        );
        let mut circles = detect_circles(&img, 24.0, 36.0, &CircleDetectorParams::default());
        assert_eq!(circles.len(), 3, "{:?}", circles);
        circles.sort_by(|a, b| a.center.x.partial_cmp(&b.center.x).unwrap_or(Ordering::Equal));
        for (c, (x, r)) in circles.iter().zip([(40.0, 18.0), (120.0, 12.0), (185.0, 9.0)]) {
            assert!((c.center.x - x).abs() <= 2.0, "{:?}", c);
            assert!((c.radius - r).abs() <= 2.0, "{:?}", c);
        }
    }

    #[test]
    fn flat_image_has_no_circles() {
        let img = GrayImage::from_pixel(50, 50, Luma([128]));
        assert!(detect_circles(&img, 20.0, 30.0, &CircleDetectorParams::default()).is_empty());
    }
}
