//! Core primitives for plot marker decoding.
//!
//! Everything here is independent of the marker layout: projective warps,
//! full-range hue statistics, convex hulls, the pinhole/Brown-Conrady camera
//! model and its planar calibration, and a tiny logger.

mod calibration;
mod camera;
mod geometry;
mod homography;
mod hue;
mod logger;
mod sampling;

pub use calibration::{calibrate_planar, planar_object_points, CalibrationError};
pub use camera::{CameraIntrinsics, CameraIoError, CameraModel, Distortion};
pub use geometry::{centroid, convex_hull, rotate_to_front, signed_area};
pub use homography::{
    estimate_homography, homography_from_4pt, warp_perspective_rgb, Homography,
};
pub use hue::{
    hue_channel, hue_full, hue_stats, median_hue, HueHistogram, HueStats, HUE_BINS,
};
pub use sampling::{sample_bilinear_rgb, sample_bilinear_rgb_u8};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{default_directive, init_with_level, init_with_verbosity, level_for_verbosity};
