//! Binary sphere mask: hue band, morphological cleanup, blur.

use crate::SphereFinderParams;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{dilate, open};

pub const FOREGROUND: u8 = 255;

/// 255 where `lo <= hue <= hi`, 0 elsewhere. An empty band (`lo > hi`) selects nothing.
pub fn hue_band_mask(hue: &GrayImage, (lo, hi): (u8, u8)) -> GrayImage {
    GrayImage::from_fn(hue.width(), hue.height(), |x, y| {
        let h = hue.get_pixel(x, y).0[0];
        Luma([if lo <= h && h <= hi { FOREGROUND } else { 0 }])
    })
}

/// Radius of a structuring element whose full size is `diameter * ratio`.
pub fn element_radius(diameter: f32, ratio: f32) -> u8 {
    let size = diameter * ratio;
    if !size.is_finite() {
        return 1;
    }
    (size * 0.5).round().clamp(1.0, u8::MAX as f32) as u8
}

/// Open away specks smaller than the opening element, then dilate so the
/// surviving blobs close up and round off.
pub fn clean_mask(mask: &GrayImage, diameter: f32, params: &SphereFinderParams) -> GrayImage {
    let k_open = element_radius(diameter, params.open_ratio);
    let k_dilate = element_radius(diameter, params.dilate_ratio);
    log::debug!("mask cleanup: open k={}, dilate k={}", k_open, k_dilate);
    let opened = open(mask, Norm::L2, k_open);
    dilate(&opened, Norm::L2, k_dilate)
}

pub fn blur_mask(mask: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 {
        gaussian_blur_f32(mask, sigma)
    } else {
        mask.clone()
    }
}
