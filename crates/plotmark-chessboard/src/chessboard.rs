use crate::{
    BoardDims, ChessboardError, ClassifierMode, ColorClassifier, MedianClassifier, SampleColor,
    SampleSet, Square,
};
use image::RgbImage;
use log::{debug, info};
use nalgebra::Point2;
use plotmark_core::centroid;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of sample squares at the head of the colored sequence.
pub const SAMPLE_COUNT: usize = 6;

/// Which roles the first colored squares play.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardLayout {
    /// Six samples, everything after them is data.
    SamplesOnly,
    /// Six samples, then the sphere-reference square, then data.
    #[default]
    SamplesAndSphere,
}

impl BoardLayout {
    pub fn reserved(self) -> usize {
        match self {
            BoardLayout::SamplesOnly => SAMPLE_COUNT,
            BoardLayout::SamplesAndSphere => SAMPLE_COUNT + 1,
        }
    }
}

/// The decoded color chessboard of one image.
#[derive(Clone, Debug)]
pub struct Chessboard {
    dims: BoardDims,
    layout: BoardLayout,
    points: Vec<Point2<f32>>,
    squares: Vec<Square>,
    association: Vec<SampleColor>,
}

impl Chessboard {
    /// Rectify the colored cells of a row-major `width x height` corner grid and
    /// classify the data squares.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(image, points),
            fields(width = dims.width(), height = dims.height(), points = points.len())
        )
    )]
    pub fn new(
        image: &RgbImage,
        dims: BoardDims,
        points: Vec<Point2<f32>>,
        layout: BoardLayout,
        mode: ClassifierMode,
    ) -> Result<Self, ChessboardError> {
        if mode != ClassifierMode::Median {
            return Err(ChessboardError::UnsupportedClassifierMode(mode));
        }
        if points.len() != dims.corner_count() {
            return Err(ChessboardError::PatternNotFound(format!(
                "grid has {} points, a {}x{} board needs {}",
                points.len(),
                dims.width(),
                dims.height(),
                dims.corner_count()
            )));
        }

        let squares = build_squares(image, dims, &points)?;
        let reserved = layout.reserved();
        if squares.len() <= reserved {
            return Err(ChessboardError::ChessboardTooSmall {
                kept: squares.len(),
                reserved,
            });
        }

        let samples = SampleSet::from_canonical_order(&squares[..SAMPLE_COUNT])?;
        let classifier = MedianClassifier::from_samples(&samples);
        let association = classifier.classify(&squares[reserved..]);
        info!(
            "chessboard {}x{}: {} colored squares, {} data",
            dims.width(),
            dims.height(),
            squares.len(),
            association.len()
        );
        debug!("association: {:?}", association);

        Ok(Self {
            dims,
            layout,
            points,
            squares,
            association,
        })
    }

    pub fn dims(&self) -> BoardDims {
        self.dims
    }

    pub fn layout(&self) -> BoardLayout {
        self.layout
    }

    /// Grid points, row-major.
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Every colored square in traversal order.
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn samples(&self) -> &[Square] {
        &self.squares[..SAMPLE_COUNT]
    }

    pub fn sphere_square(&self) -> Option<&Square> {
        match self.layout {
            BoardLayout::SamplesOnly => None,
            BoardLayout::SamplesAndSphere => self.squares.get(SAMPLE_COUNT),
        }
    }

    pub fn data_squares(&self) -> &[Square] {
        &self.squares[self.layout.reserved()..]
    }

    /// One color per data square, in traversal order.
    pub fn association(&self) -> &[SampleColor] {
        &self.association
    }

    /// Mean of all grid points.
    pub fn centroid(&self) -> Option<Point2<f32>> {
        centroid(&self.points)
    }

    /// Average data-square side in pixels divided by the real side length.
    pub fn pixels_per_unit(&self, square_side: f64) -> f64 {
        let data = self.data_squares();
        if data.is_empty() || square_side <= 0.0 {
            return 0.0;
        }
        let mean_side = data.iter().map(Square::side_px).sum::<f64>() / data.len() as f64;
        mean_side / square_side
    }
}

/// Colored cells in row-major order; cell `(c, r)` is kept when `c + r` is odd,
/// so the top-left cell of the board is never one of them.
fn build_squares(
    image: &RgbImage,
    dims: BoardDims,
    points: &[Point2<f32>],
) -> Result<Vec<Square>, ChessboardError> {
    let w = dims.width() as usize;
    let (cols, rows) = dims.cells();
    let mut squares = Vec::new();
    for r in 0..rows as usize {
        for c in 0..cols as usize {
            if (r + c) % 2 == 0 {
                continue;
            }
            let ul = points[r * w + c];
            let ur = points[r * w + c + 1];
            let lr = points[(r + 1) * w + c + 1];
            let ll = points[(r + 1) * w + c];
            squares.push(Square::from_corners(image, [ul, ur, lr, ll])?);
        }
    }
    Ok(squares)
}
