//! Printable plot markers.
//!
//! The board is drawn with a ring of checkered cells around the decoded
//! region, so every grid point of a `width x height` board is an X-junction,
//! and a white quiet zone around the ring.

use crate::{PlotError, PlotIdentifier};
use image::{Rgb, RgbImage};
use log::debug;
use nalgebra::Point2;
use plotmark_chessboard::{BoardDims, BoardLayout, SampleColor};
use serde::{Deserialize, Serialize};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerPrintParams {
    /// Side of one board cell in pixels.
    pub cell_px: u32,
    /// White border around the board, in cells.
    pub margin_cells: u32,
    /// Share of the pure paint in a colored cell; the rest is paper white.
    pub tint: f32,
    /// Fill of the sphere-reference square, untinted.
    pub sphere_paint: [u8; 3],
}

impl Default for MarkerPrintParams {
    fn default() -> Self {
        Self {
            cell_px: 36,
            margin_cells: 1,
            tint: 0.5,
            sphere_paint: [255, 128, 0],
        }
    }
}

/// Data squares a board of `dims` carries after the samples and the
/// sphere-reference square.
pub fn data_square_count(dims: BoardDims) -> usize {
    let (cols, rows) = dims.cells();
    let colored = (cols as usize * rows as usize) / 2;
    colored.saturating_sub(BoardLayout::SamplesAndSphere.reserved())
}

/// Pixel positions of the grid points of a marker drawn with `params`, row-major.
pub fn marker_corners(dims: BoardDims, params: &MarkerPrintParams) -> Vec<Point2<f32>> {
    let cell = params.cell_px.max(1) as f32;
    let origin = (params.margin_cells + 1) as f32 * cell;
    (0..dims.height())
        .flat_map(|j| {
            (0..dims.width()).map(move |i| Point2::new(origin + i as f32 * cell, origin + j as f32 * cell))
        })
        .collect()
}

fn tinted(color: SampleColor, tint: f32) -> Rgb<u8> {
    let t = tint.clamp(0.0, 1.0);
    Rgb(color
        .rgb()
        .map(|on| if on { 255 } else { (255.0 * (1.0 - t)).round() as u8 }))
}

/// Fills of the colored cells in traversal order.
fn colored_fills(id: &PlotIdentifier, params: &MarkerPrintParams) -> Vec<Rgb<u8>> {
    SampleColor::ALL
        .iter()
        .map(|&c| tinted(c, params.tint))
        .chain(std::iter::once(Rgb(params.sphere_paint)))
        .chain(id.colors().into_iter().map(|c| tinted(c, params.tint)))
        .collect()
}

/// Draw the marker of plot `value` for a board of `dims`.
///
/// Fails when `value` needs more data squares than the board has, or when one
/// of its squares would have to be white.
pub fn render_marker(
    dims: BoardDims,
    value: u64,
    params: &MarkerPrintParams,
) -> Result<RgbImage, PlotError> {
    let id = PlotIdentifier::from_value(value, data_square_count(dims))?;
    let cell = params.cell_px.max(1);
    let (cols, rows) = dims.cells();
    let span = |n: u32| (n + 2 + 2 * params.margin_cells) * cell;
    let mut img = RgbImage::from_pixel(span(cols), span(rows), WHITE);

    let mut fills = colored_fills(&id, params).into_iter();
    for r in -1..=rows as i64 {
        for c in -1..=cols as i64 {
            let inside = c >= 0 && r >= 0 && c < cols as i64 && r < rows as i64;
            let fill = if (c + r).rem_euclid(2) == 0 {
                Some(BLACK)
            } else if inside {
                fills.next()
            } else {
                None
            };
            let Some(fill) = fill else {
                continue;
            };
            let x0 = (c + 1 + params.margin_cells as i64) as u32 * cell;
            let y0 = (r + 1 + params.margin_cells as i64) as u32 * cell;
            for y in y0..y0 + cell {
                for x in x0..x0 + cell {
                    img.put_pixel(x, y, fill);
                }
            }
        }
    }
    debug!(
        "marker {} on {}x{} board: {} data squares, {}x{} px",
        value,
        dims.width(),
        dims.height(),
        id.codes().len(),
        img.width(),
        img.height()
    );
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> BoardDims {
        BoardDims::new(5, 6).expect("dims")
    }

    #[test]
    fn capacity_follows_board_size() {
        assert_eq!(data_square_count(dims()), 3);
        assert_eq!(data_square_count(BoardDims::new(8, 5).expect("dims")), 7);
        assert_eq!(data_square_count(BoardDims::new(3, 4).expect("dims")), 0);
    }

    #[test]
    fn layout_has_ring_and_quiet_zone() {
        let params = MarkerPrintParams {
            cell_px: 10,
            ..MarkerPrintParams::default()
        };
        let img = render_marker(dims(), 36, &params).expect("render");
        // 5 x 4 cells, a ring cell on each side and one margin cell.
        assert_eq!(img.dimensions(), (90, 80));
        assert_eq!(*img.get_pixel(5, 5), WHITE);
        // Ring corner cell and first decoded cell are black.
        assert_eq!(*img.get_pixel(15, 15), BLACK);
        assert_eq!(*img.get_pixel(25, 25), BLACK);
        // First colored cell is the red sample, half tinted.
        assert_eq!(*img.get_pixel(35, 25), Rgb([255, 128, 128]));

        let corners = marker_corners(dims(), &params);
        assert_eq!(corners.len(), 30);
        assert_eq!(corners[0], Point2::new(20.0, 20.0));
        assert_eq!(corners[29], Point2::new(70.0, 60.0));
    }

    #[test]
    fn identifiers_that_do_not_fit_are_rejected() {
        let params = MarkerPrintParams::default();
        assert!(matches!(
            render_marker(dims(), 64, &params),
            Err(PlotError::IdentifierDoesNotFit { value: 64, squares: 3 })
        ));
        assert!(matches!(
            render_marker(dims(), 3, &params),
            Err(PlotError::WhiteDataSquare { index: 0, .. })
        ));
    }
}
