use crate::{ClassifierMode, SampleColor};

/// Failures while assembling or decoding the color chessboard.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ChessboardError {
    #[error("calibration pattern not found: {0}")]
    PatternNotFound(String),

    #[error("board {width}x{height} needs one odd and one even dimension")]
    AsymmetricBoardRequired { width: u32, height: u32 },

    #[error("chessboard too small: {kept} colored squares leave no data squares after {reserved} reserved")]
    ChessboardTooSmall { kept: usize, reserved: usize },

    #[error("expected 6 sample squares, got {0}")]
    InvalidSampleCount(usize),

    #[error("sample colors must each appear exactly once, got {0:?}")]
    InvalidSampleSet(Vec<SampleColor>),

    #[error("classifier mode {0:?} is not implemented")]
    UnsupportedClassifierMode(ClassifierMode),

    #[error("square corners {0:?} do not span a quadrilateral")]
    DegenerateSquare([[f32; 2]; 4]),
}
