use crate::ChessboardError;
use image::RgbImage;
use nalgebra::Point2;
use plotmark_core::{
    homography_from_4pt, warp_perspective_rgb, HueHistogram, HueStats, Homography,
};

/// One rectified marker cell.
///
/// The four grid points (upper-left, upper-right, lower-right, lower-left) are
/// warped onto their own axis-aligned bounding box, so the buffer size matches
/// the cell's footprint in the source image. Color conversion is left to the
/// consumers.
#[derive(Clone, Debug)]
pub struct Square {
    image: RgbImage,
    corners: [Point2<f32>; 4],
    origin: [i64; 2],
}

impl Square {
    pub fn from_corners(src: &RgbImage, corners: [Point2<f32>; 4]) -> Result<Self, ChessboardError> {
        let degenerate = || ChessboardError::DegenerateSquare(corners.map(|p| [p.x, p.y]));

        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &corners {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(degenerate());
            }
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let x0 = min_x.floor();
        let y0 = min_y.floor();
        let w = ((max_x.ceil() - x0) as u32).max(1);
        let h = ((max_y.ceil() - y0) as u32).max(1);

        let local = corners.map(|p| Point2::new(p.x - x0, p.y - y0));
        let (wf, hf) = (w as f32, h as f32);
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(wf, 0.0),
            Point2::new(wf, hf),
            Point2::new(0.0, hf),
        ];

        // Pull every rectified pixel back into the bounding box, then into the image.
        let h_local_from_rect = homography_from_4pt(&rect, &local).ok_or_else(degenerate)?;
        let shift = Homography::new(nalgebra::Matrix3::new(
            1.0, 0.0, x0 as f64, //
            0.0, 1.0, y0 as f64, //
            0.0, 0.0, 1.0,
        ));
        let h_img_from_rect = Homography::new(shift.h * h_local_from_rect.h);
        let image = warp_perspective_rgb(src, &h_img_from_rect, w, h);

        Ok(Self {
            image,
            corners,
            origin: [x0 as i64, y0 as i64],
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Grid points in image coordinates: UL, UR, LR, LL.
    pub fn corners(&self) -> &[Point2<f32>; 4] {
        &self.corners
    }

    /// Top-left of the bounding box in image pixels.
    pub fn origin(&self) -> [i64; 2] {
        self.origin
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Mean of width and height.
    pub fn side_px(&self) -> f64 {
        (self.width() as f64 + self.height() as f64) * 0.5
    }

    pub fn hue_histogram(&self) -> HueHistogram {
        HueHistogram::from_rgb(&self.image)
    }

    pub fn median_hue(&self) -> u8 {
        self.hue_histogram().median()
    }

    pub fn hue_stats(&self) -> HueStats {
        self.hue_histogram().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn quad(x0: f32, y0: f32, x1: f32, y1: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[test]
    fn axis_aligned_cell_is_a_plain_crop() {
        let src = RgbImage::from_fn(40, 30, |x, y| {
            if (10..20).contains(&x) && (5..15).contains(&y) {
                Rgb([250, 10, 10])
            } else {
                Rgb([10, 10, 250])
            }
        });
        let sq = Square::from_corners(&src, quad(10.0, 5.0, 20.0, 15.0)).expect("square");
        assert_eq!((sq.width(), sq.height()), (10, 10));
        assert_eq!(sq.origin(), [10, 5]);
        assert_eq!(*sq.image().get_pixel(0, 0), Rgb([250, 10, 10]));
        assert_eq!(*sq.image().get_pixel(9, 9), Rgb([250, 10, 10]));
        assert_eq!(sq.median_hue(), 0);
        assert_eq!(sq.side_px(), 10.0);
    }

    #[test]
    fn skewed_cell_uses_its_bounding_box() {
        let src = RgbImage::from_pixel(64, 64, Rgb([0, 200, 0]));
        let corners = [
            Point2::new(12.3, 8.6),
            Point2::new(30.2, 10.1),
            Point2::new(28.7, 27.9),
            Point2::new(10.5, 25.4),
        ];
        let sq = Square::from_corners(&src, corners).expect("square");
        assert_eq!(sq.origin(), [10, 8]);
        assert_eq!((sq.width(), sq.height()), (21, 20));
        assert_eq!(sq.median_hue(), 85);
        assert_eq!(sq.corners(), &corners);
    }

    #[test]
    fn collapsed_corners_are_rejected() {
        let src = RgbImage::new(8, 8);
        let p = Point2::new(3.0, 3.0);
        assert!(matches!(
            Square::from_corners(&src, [p; 4]),
            Err(ChessboardError::DegenerateSquare(_))
        ));
    }
}
