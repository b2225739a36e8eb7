//! ChESS-based [`PatternDetector`].

use plotmark_chessboard::GridSearchParams;
use serde::{Deserialize, Serialize};

#[cfg(feature = "chess")]
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
#[cfg(feature = "chess")]
use image::GrayImage;
#[cfg(feature = "chess")]
use log::debug;
#[cfg(feature = "chess")]
use nalgebra::Point2;
#[cfg(feature = "chess")]
use std::f32::consts::PI;
#[cfg(feature = "chess")]
use plotmark_chessboard::{
    assemble_grid, BoardDims, ChessboardError, Corner, PatternDetector,
};

#[cfg(all(feature = "chess", feature = "tracing"))]
use tracing::instrument;

/// Corner detector and grid search settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessPatternParams {
    /// ChESS response threshold relative to the strongest response.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: u32,
    pub grid: GridSearchParams,
}

impl Default for ChessPatternParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            grid: GridSearchParams::default(),
        }
    }
}

/// Finds the marker grid with the ChESS X-junction detector.
#[cfg(feature = "chess")]
#[derive(Clone, Debug, Default)]
pub struct ChessPatternDetector {
    params: ChessPatternParams,
}

#[cfg(feature = "chess")]
impl ChessPatternDetector {
    pub fn new(params: ChessPatternParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChessPatternParams {
        &self.params
    }

    fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.threshold_mode = ThresholdMode::Relative;
        cfg.threshold_value = self.params.threshold_rel;
        cfg.nms_radius = self.params.nms_radius;
        cfg
    }

    /// Raw junctions, before any grid search.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, gray), fields(width = gray.width(), height = gray.height()))
    )]
    pub fn corners(&self, gray: &GrayImage) -> Result<Vec<Corner>, ChessboardError> {
        let raw = find_chess_corners_image(gray, &self.chess_config())
            .map_err(|e| ChessboardError::PatternNotFound(format!("corner detector: {e}")))?;
        Ok(raw.iter().map(adapt_chess_corner).collect())
    }
}

#[cfg(feature = "chess")]
impl PatternDetector for ChessPatternDetector {
    fn detect(
        &self,
        gray: &GrayImage,
        dims: BoardDims,
    ) -> Result<Vec<Point2<f32>>, ChessboardError> {
        let corners = self.corners(gray)?;
        debug!("{} ChESS junctions", corners.len());
        assemble_grid(&corners, dims, gray, &self.params.grid)
    }
}

#[cfg(feature = "chess")]
fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    // Sweeping from axis 0 to axis 1 crosses a dark sector; the bright
    // diagonal bisects the next one.
    let (a0, a1) = (c.axes[0].angle, c.axes[1].angle);
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: ((a0 + a1 + PI) * 0.5).rem_euclid(PI),
        strength: c.response,
    }
}
