use serde::{Deserialize, Serialize};

/// Gradient-voting circle search. Radii are fractions of the expected sphere
/// diameter so one set of values works at any image scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleDetectorParams {
    /// Smallest radius searched, relative to the expected diameter.
    pub min_radius_ratio: f32,
    /// Largest radius searched, relative to the expected diameter.
    pub max_radius_ratio: f32,
    /// Gradient magnitude threshold (fraction of the strongest gradient).
    pub grad_threshold: f32,
    /// Minimum accumulator peak (fraction of the strongest peak).
    pub min_vote_frac: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
    /// Fraction of the circumference that must carry edge pixels.
    pub min_edge_support: f32,
    /// Cap on accumulator peaks examined, strongest first.
    pub max_candidates: usize,
}

impl Default for CircleDetectorParams {
    fn default() -> Self {
        Self {
            min_radius_ratio: 0.2,
            max_radius_ratio: 1.2,
            grad_threshold: 0.1,
            min_vote_frac: 0.2,
            accum_sigma: 2.0,
            min_edge_support: 0.35,
            max_candidates: 32,
        }
    }
}

/// Mask cleanup and circle search around the expected sphere size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereFinderParams {
    /// Opening element size, relative to the expected diameter.
    pub open_ratio: f32,
    /// Dilation element size, relative to the expected diameter.
    pub dilate_ratio: f32,
    /// Gaussian sigma applied to the cleaned mask. Zero disables the blur.
    pub blur_sigma: f32,
    /// Minimal distance between two circle centers, relative to the expected diameter.
    pub min_dist_ratio: f32,
    pub circles: CircleDetectorParams,
}

impl Default for SphereFinderParams {
    fn default() -> Self {
        Self {
            open_ratio: 0.25,
            dilate_ratio: 0.5,
            blur_sigma: 2.0,
            min_dist_ratio: 1.5,
            circles: CircleDetectorParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let p: SphereFinderParams =
            serde_json::from_str(r#"{ "open_ratio": 0.1, "circles": { "max_candidates": 8 } }"#)
                .expect("parse");
        assert_relative_eq!(p.open_ratio, 0.1);
        assert_relative_eq!(p.dilate_ratio, 0.5);
        assert_eq!(p.circles.max_candidates, 8);
        assert_relative_eq!(p.circles.min_edge_support, 0.35);
    }
}
