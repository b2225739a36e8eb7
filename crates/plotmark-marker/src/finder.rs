use crate::circles::detect_circles;
use crate::mask::{blur_mask, clean_mask, hue_band_mask};
use crate::SphereFinderParams;
use image::RgbImage;
use log::{debug, info};
use nalgebra::Point2;
use plotmark_core::{hue_channel, HueHistogram, HueStats};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of reference spheres around a plot.
pub const SPHERE_COUNT: usize = 3;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SphereError {
    #[error("fewer than three spheres found ({found})")]
    InsufficientSpheres { found: usize },

    #[error("expected sphere diameter must be positive, got {0}")]
    InvalidDiameter(f32),
}

/// A reference sphere in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Point2<f32>,
    pub radius: f32,
}

/// Finds the reference spheres whose paint matches one reference region.
#[derive(Clone, Debug, Default)]
pub struct SphereFinder {
    params: SphereFinderParams,
}

impl SphereFinder {
    pub fn new(params: SphereFinderParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SphereFinderParams {
        &self.params
    }

    /// The three largest circles whose hue lies within one standard deviation
    /// of `reference`'s mean hue, largest radius first.
    ///
    /// `diameter` is the expected sphere diameter in pixels of `image`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, reference, image),
            fields(w = image.width(), h = image.height())
        )
    )]
    pub fn find(
        &self,
        reference: &RgbImage,
        image: &RgbImage,
        diameter: f32,
    ) -> Result<Vec<Sphere>, SphereError> {
        if diameter.is_nan() || diameter <= 0.0 {
            return Err(SphereError::InvalidDiameter(diameter));
        }
        let stats = HueHistogram::from_rgb(reference).stats();
        self.find_with_stats(stats, image, diameter)
    }

    pub fn find_with_stats(
        &self,
        stats: HueStats,
        image: &RgbImage,
        diameter: f32,
    ) -> Result<Vec<Sphere>, SphereError> {
        let band = stats.band();
        debug!(
            "sphere hue mean {:.1} sd {:.1}, band {:?}",
            stats.mean, stats.std_dev, band
        );

        let mask = hue_band_mask(&hue_channel(image), band);
        let mask = clean_mask(&mask, diameter, &self.params);
        let mask = blur_mask(&mask, self.params.blur_sigma);

        let min_dist = self.params.min_dist_ratio * diameter;
        let circles = detect_circles(&mask, diameter, min_dist, &self.params.circles);
        debug!("{} circle(s) in sphere mask", circles.len());

        let mut spheres: Vec<Sphere> = circles
            .into_iter()
            .map(|c| Sphere {
                center: c.center,
                radius: c.radius,
            })
            .collect();
        sort_by_radius_desc(&mut spheres);
        if spheres.len() < SPHERE_COUNT {
            return Err(SphereError::InsufficientSpheres {
                found: spheres.len(),
            });
        }
        spheres.truncate(SPHERE_COUNT);
        info!(
            "spheres at {:?}",
            spheres
                .iter()
                .map(|s| [s.center.x, s.center.y])
                .collect::<Vec<_>>()
        );
        Ok(spheres)
    }
}

/// Equal radii keep detection order.
fn sort_by_radius_desc(spheres: &mut [Sphere]) {
    spheres.sort_by(|a, b| b.radius.partial_cmp(&a.radius).unwrap_or(Ordering::Equal));
}
