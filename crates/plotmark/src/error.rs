use plotmark_chessboard::{ChessboardError, SampleColor};
use plotmark_core::{CalibrationError, CameraIoError};
use plotmark_marker::SphereError;
use std::path::{Path, PathBuf};

/// Everything that can stop a plot image from being decoded or normalized.
#[derive(thiserror::Error, Debug)]
pub enum PlotError {
    #[error(transparent)]
    Chessboard(#[from] ChessboardError),

    #[error(transparent)]
    Sphere(#[from] SphereError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("{}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("data square {index} reads as {color:?}, which is missing the red component")]
    InvalidSquareColor { index: usize, color: SampleColor },

    #[error("{squares} data squares do not fit a 64-bit identifier")]
    IdentifierTooWide { squares: usize },

    #[error("identifier {value} needs more than the {squares} data squares of this board")]
    IdentifierDoesNotFit { value: u64, squares: usize },

    #[error("identifier {value} would paint data square {index} white, which cannot be decoded")]
    WhiteDataSquare { value: u64, index: usize },

    #[error("chessboard centroid and sphere centers do not form a convex quadrilateral")]
    DegenerateReferenceQuad,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PlotError {
    pub(crate) fn file(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        PlotError::File {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl From<CameraIoError> for PlotError {
    fn from(e: CameraIoError) -> Self {
        match e {
            CameraIoError::Io(e) => PlotError::Io(e),
            CameraIoError::Json(e) => PlotError::Json(e),
        }
    }
}
