//! Perspective normalization of a plot photograph.
//!
//! The plot is bounded by the chessboard centroid and the three sphere
//! centers. Their convex hull, started at the centroid, is mapped onto a
//! fixed-size rectangle: centroid to the top-left corner, then clockwise on
//! screen (top-right, bottom-right, bottom-left).

use crate::PlotError;
use image::RgbImage;
use log::debug;
use nalgebra::Point2;
use plotmark_core::{convex_hull, homography_from_4pt, rotate_to_front, warp_perspective_rgb};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Output frame of the normalized image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    /// Output width in pixels.
    pub width: u32,
    /// Height divided by width.
    pub aspect_ratio: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            width: 2000,
            aspect_ratio: 1.5,
        }
    }
}

impl NormalizeParams {
    pub fn height(&self) -> u32 {
        (self.width as f64 * self.aspect_ratio).round().max(1.0) as u32
    }

    fn target(&self) -> [Point2<f32>; 4] {
        let (w, h) = (self.width as f32, self.height() as f32);
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }
}

/// Chessboard centroid followed by the sphere centers in hull order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceQuad {
    pub points: [Point2<f32>; 4],
}

impl ReferenceQuad {
    pub fn new(centroid: Point2<f32>, spheres: [Point2<f32>; 3]) -> Result<Self, PlotError> {
        let mut hull = convex_hull(&[centroid, spheres[0], spheres[1], spheres[2]]);
        if hull.len() != 4 || !rotate_to_front(&mut hull, &centroid) {
            debug!("reference hull has {} vertices: {:?}", hull.len(), hull);
            return Err(PlotError::DegenerateReferenceQuad);
        }
        Ok(Self {
            points: [hull[0], hull[1], hull[2], hull[3]],
        })
    }

    pub fn centroid(&self) -> Point2<f32> {
        self.points[0]
    }
}

/// Warp `src` so the reference quad fills the output frame.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, quad), fields(width = params.width, height = params.height()))
)]
pub fn normalize_image(
    src: &RgbImage,
    quad: &ReferenceQuad,
    params: &NormalizeParams,
) -> Result<RgbImage, PlotError> {
    let h_src_from_out =
        homography_from_4pt(&params.target(), &quad.points).ok_or(PlotError::DegenerateReferenceQuad)?;
    Ok(warp_perspective_rgb(
        src,
        &h_src_from_out,
        params.width,
        params.height(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn p(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    #[test]
    fn centroid_leads_regardless_of_sphere_order() {
        let c = p(10.0, 10.0);
        let spheres = [p(90.0, 140.0), p(90.0, 10.0), p(10.0, 140.0)];
        let quad = ReferenceQuad::new(c, spheres).expect("quad");
        assert_eq!(quad.centroid(), c);
        assert_eq!(
            quad.points,
            [c, p(90.0, 10.0), p(90.0, 140.0), p(10.0, 140.0)]
        );

        let shuffled = ReferenceQuad::new(c, [spheres[2], spheres[0], spheres[1]]).expect("quad");
        assert_eq!(shuffled, quad);
    }

    #[test]
    fn centroid_inside_sphere_triangle_is_degenerate() {
        let err = ReferenceQuad::new(
            p(50.0, 50.0),
            [p(0.0, 0.0), p(100.0, 0.0), p(50.0, 100.0)],
        )
        .unwrap_err();
        assert!(matches!(err, PlotError::DegenerateReferenceQuad));
    }

    #[test]
    fn output_has_fixed_frame_for_any_input_size() {
        let params = NormalizeParams {
            width: 40,
            aspect_ratio: 1.5,
        };
        for (w, h) in [(120u32, 90u32), (300, 500)] {
            let src = RgbImage::from_pixel(w, h, Rgb([9, 99, 199]));
            let quad = ReferenceQuad::new(
                p(5.0, 5.0),
                [
                    p(w as f32 - 5.0, 8.0),
                    p(w as f32 - 9.0, h as f32 - 5.0),
                    p(7.0, h as f32 - 6.0),
                ],
            )
            .expect("quad");
            let out = normalize_image(&src, &quad, &params).expect("warp");
            assert_eq!(out.dimensions(), (40, 60));
            assert_eq!(*out.get_pixel(20, 30), Rgb([9, 99, 199]));
        }
    }

    #[test]
    fn axis_aligned_quad_is_a_scaled_crop() {
        let src = RgbImage::from_fn(200, 300, |x, y| Rgb([(x / 2) as u8, (y / 3) as u8, 0]));
        let quad = ReferenceQuad::new(
            p(0.0, 0.0),
            [p(200.0, 0.0), p(200.0, 300.0), p(0.0, 300.0)],
        )
        .expect("quad");
        let params = NormalizeParams {
            width: 100,
            aspect_ratio: 1.5,
        };
        let out = normalize_image(&src, &quad, &params).expect("warp");
        assert_eq!(out.dimensions(), (100, 150));
        assert_eq!(*out.get_pixel(10, 20), *src.get_pixel(20, 40));
    }
}
