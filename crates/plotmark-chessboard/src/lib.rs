//! Color-coded chessboard marker.
//!
//! The marker is an asymmetric chessboard whose non-black cells are painted.
//! Traversing the colored cells row by row yields, in order:
//!
//! 1. six sample squares (red, yellow, green, cyan, blue, magenta) that
//!    calibrate the hue classifier for the image at hand,
//! 2. optionally one square that holds the reference-sphere color,
//! 3. the data squares, whose colors encode the plot identifier.
//!
//! ## Quickstart
//!
//! ```no_run
//! use plotmark_chessboard::{BoardDims, BoardLayout, Chessboard, ClassifierMode};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("plot.jpg")?.to_rgb8();
//! let dims = BoardDims::new(5, 8)?;
//! let points: Vec<Point2<f32>> = Vec::new(); // from a PatternDetector
//! let board = Chessboard::new(&img, dims, points, BoardLayout::default(), ClassifierMode::Median)?;
//! println!("{:?}", board.association());
//! # Ok(())
//! # }
//! ```

mod board;
mod chessboard;
mod classifier;
mod error;
mod gridgraph;
mod params;
mod pattern;
mod square;

pub use board::BoardDims;
pub use chessboard::{BoardLayout, Chessboard, SAMPLE_COUNT};
pub use classifier::{
    ClassifierMode, ColorClassifier, HueRangeTable, MedianClassifier, SampleColor, SampleSet,
};
pub use error::ChessboardError;
pub use params::{GridGraphParams, GridSearchParams};
pub use pattern::{assemble_grid, Corner, PatternDetector};
pub use square::Square;
