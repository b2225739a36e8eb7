use nalgebra::Point2;
use plotmark::chessboard::ChessboardError;
use plotmark::{
    marker_corners, render_marker, BoardDims, MarkerPrintParams, PatternDetector, PlotConfig,
    PlotIdentifier, PlotImage,
};

/// Hands back the grid points the marker was drawn with.
struct DrawnGrid(Vec<Point2<f32>>);

impl PatternDetector for DrawnGrid {
    fn detect(
        &self,
        _gray: &image::GrayImage,
        _dims: BoardDims,
    ) -> Result<Vec<Point2<f32>>, ChessboardError> {
        Ok(self.0.clone())
    }
}

fn decode(size1: u32, size2: u32, value: u64) -> u64 {
    let dims = BoardDims::new(size1, size2).expect("dims");
    let params = MarkerPrintParams {
        cell_px: 24,
        ..MarkerPrintParams::default()
    };
    let marker = render_marker(dims, value, &params).expect("render");
    let grid = DrawnGrid(marker_corners(dims, &params));
    let plot = PlotImage::from_image(marker, &PlotConfig::new(size1, size2), &grid).expect("plot");
    plot.compute_id().expect("id").value()
}

#[test]
fn printed_markers_decode_to_their_identifier() {
    for value in [0, 9, 22, 36] {
        assert_eq!(decode(5, 6, value), value);
    }
}

#[test]
fn larger_board_round_trips_every_square() {
    let value = PlotIdentifier::from_association(&{
        use plotmark::SampleColor::*;
        [Magenta, Red, Yellow, Yellow, Magenta, Red, Yellow]
    })
    .expect("valid")
    .value();
    assert_eq!(value, 4690);
    assert_eq!(decode(8, 5, value), value);
}
