//! Hue channel extraction and per-region hue statistics.
//!
//! Hue uses the full 8-bit range: 0..=255 covers the whole color circle
//! (`degrees * 256 / 360`), so red sits at both ends of the scale.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Number of distinct hue values.
pub const HUE_BINS: usize = 256;

/// Full-range hue of one RGB pixel. Achromatic pixels map to 0.
#[inline]
pub fn hue_full(r: u8, g: u8, b: u8) -> u8 {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;
    if diff <= 0.0 {
        return 0;
    }

    let mut deg = if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if deg < 0.0 {
        deg += 360.0;
    }
    ((deg * HUE_BINS as f32 / 360.0).round() as u32 % HUE_BINS as u32) as u8
}

/// Hue channel of an RGB image.
pub fn hue_channel(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        Luma([hue_full(r, g, b)])
    })
}

/// 256-bin histogram of hue values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HueHistogram {
    bins: [u32; HUE_BINS],
    total: u32,
}

impl HueHistogram {
    pub fn from_hue(hue: &GrayImage) -> Self {
        let mut bins = [0u32; HUE_BINS];
        for p in hue.pixels() {
            bins[p.0[0] as usize] += 1;
        }
        Self {
            bins,
            total: hue.width() * hue.height(),
        }
    }

    pub fn from_rgb(img: &RgbImage) -> Self {
        let mut bins = [0u32; HUE_BINS];
        for p in img.pixels() {
            let [r, g, b] = p.0;
            bins[hue_full(r, g, b) as usize] += 1;
        }
        Self {
            bins,
            total: img.width() * img.height(),
        }
    }

    pub fn bins(&self) -> &[u32; HUE_BINS] {
        &self.bins
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Exact median: the first bin at which the running count exceeds half
    /// of the population. An empty histogram reports 0.
    pub fn median(&self) -> u8 {
        let half = self.total / 2;
        let mut running = 0u32;
        for (bin, &count) in self.bins.iter().enumerate() {
            running += count;
            if running > half {
                return bin as u8;
            }
        }
        0
    }

    /// Mean and population standard deviation of the hue values.
    pub fn stats(&self) -> HueStats {
        if self.total == 0 {
            return HueStats::default();
        }
        let n = self.total as f64;
        let mean = self
            .bins
            .iter()
            .enumerate()
            .map(|(h, &c)| h as f64 * c as f64)
            .sum::<f64>()
            / n;
        let var = self
            .bins
            .iter()
            .enumerate()
            .map(|(h, &c)| (h as f64 - mean).powi(2) * c as f64)
            .sum::<f64>()
            / n;
        HueStats {
            mean,
            std_dev: var.sqrt(),
        }
    }
}

/// Mean / standard deviation of a region's hue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HueStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl HueStats {
    /// Inclusive `[mean - std_dev, mean + std_dev]` band, clamped to the hue range.
    pub fn band(&self) -> (u8, u8) {
        let lo = (self.mean - self.std_dev).ceil().clamp(0.0, 255.0) as u8;
        let hi = (self.mean + self.std_dev).floor().clamp(0.0, 255.0) as u8;
        (lo, hi)
    }
}

pub fn median_hue(img: &RgbImage) -> u8 {
    HueHistogram::from_rgb(img).median()
}

pub fn hue_stats(img: &RgbImage) -> HueStats {
    HueHistogram::from_rgb(img).stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn primaries_land_on_full_range_hues() {
        assert_eq!(hue_full(255, 0, 0), 0);
        assert_eq!(hue_full(255, 255, 0), 43);
        assert_eq!(hue_full(0, 255, 0), 85);
        assert_eq!(hue_full(0, 255, 255), 128);
        assert_eq!(hue_full(0, 0, 255), 171);
        assert_eq!(hue_full(255, 0, 255), 213);
        assert_eq!(hue_full(90, 90, 90), 0);
    }

    #[test]
    fn hue_just_below_red_wraps_high() {
        // 355 degrees
        let h = hue_full(255, 0, 21);
        assert!(h >= 250, "got {h}");
    }

    #[test]
    fn median_is_the_bin_crossing_half() {
        let mut img = GrayImage::new(10, 1);
        for x in 0..10 {
            let v = if x < 4 { 10 } else if x < 7 { 50 } else { 200 };
            img.put_pixel(x, 0, Luma([v]));
        }
        // counts: 4 at 10, 3 at 50, 3 at 200; half = 5, crossed at 50
        assert_eq!(HueHistogram::from_hue(&img).median(), 50);

        let uniform = GrayImage::from_pixel(5, 5, Luma([17]));
        assert_eq!(HueHistogram::from_hue(&uniform).median(), 17);
    }

    #[test]
    fn empty_region_has_neutral_statistics() {
        let hist = HueHistogram::from_hue(&GrayImage::new(0, 0));
        assert_eq!(hist.median(), 0);
        assert_eq!(hist.stats(), HueStats::default());
    }

    #[test]
    fn stats_match_hand_computation() {
        let mut img = GrayImage::new(4, 1);
        for (x, v) in [10u8, 20, 30, 40].into_iter().enumerate() {
            img.put_pixel(x as u32, 0, Luma([v]));
        }
        let s = HueHistogram::from_hue(&img).stats();
        approx::assert_abs_diff_eq!(s.mean, 25.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(s.std_dev, 125.0_f64.sqrt(), epsilon = 1e-9);
        assert_eq!(s.band(), (14, 36));
    }

    #[test]
    fn rgb_helpers_agree_with_channel() {
        let img = RgbImage::from_pixel(3, 3, Rgb([0, 0, 255]));
        assert_eq!(median_hue(&img), 171);
        assert_eq!(hue_channel(&img).get_pixel(1, 1).0[0], 171);
        assert_eq!(hue_stats(&img).std_dev, 0.0);
    }
}
