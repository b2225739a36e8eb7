//! From a cloud of X-junctions to the ordered inner-corner grid.
//!
//! Junctions are linked into a 4-connected graph, the largest component gets
//! integer coordinates, and the result is accepted only if it is a complete
//! `width x height` (or `height x width`) lattice. Of the four in-plane
//! rotations of that lattice, the one whose even cells are darkest is kept, so
//! cell `(0, 0)` of the returned grid is always a black cell.

use crate::gridgraph::GridGraph;
use crate::{BoardDims, ChessboardError, GridSearchParams};
use image::GrayImage;
use log::debug;
use nalgebra::Point2;
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A detected X-junction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    /// Subpixel position in image pixels.
    pub position: Point2<f32>,
    /// Direction of the bright diagonal, radians.
    pub orientation: f32,
    /// Detector response.
    pub strength: f32,
}

/// Finds the `width x height` inner-corner grid of the marker.
///
/// On success the points are row-major over `dims`: `width` points per row,
/// `height` rows.
pub trait PatternDetector {
    fn detect(
        &self,
        gray: &GrayImage,
        dims: BoardDims,
    ) -> Result<Vec<Point2<f32>>, ChessboardError>;
}

/// Board index to lattice index.
type Placement = Box<dyn Fn(i32, i32) -> (i32, i32)>;

#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(corners, gray, params),
        fields(corners = corners.len(), width = dims.width(), height = dims.height())
    )
)]
pub fn assemble_grid(
    corners: &[Corner],
    dims: BoardDims,
    gray: &GrayImage,
    params: &GridSearchParams,
) -> Result<Vec<Point2<f32>>, ChessboardError> {
    let strong: Vec<Corner> = corners
        .iter()
        .filter(|c| c.strength >= params.min_strength)
        .copied()
        .collect();
    let needed = dims.corner_count();
    if strong.len() < needed {
        return Err(ChessboardError::PatternNotFound(format!(
            "{} junctions, need {}",
            strong.len(),
            needed
        )));
    }

    let graph = GridGraph::new(&strong, &params.graph);
    let components = graph.components();
    let Some(largest) = components.first() else {
        return Err(ChessboardError::PatternNotFound("no junctions".into()));
    };
    debug!(
        "{} components, largest has {} nodes",
        components.len(),
        largest.len()
    );

    let coords = graph.coordinates(largest);
    let min_i = coords.iter().map(|c| c.1).min().unwrap_or(0);
    let min_j = coords.iter().map(|c| c.2).min().unwrap_or(0);
    let mut lattice: HashMap<(i32, i32), Point2<f32>> = HashMap::with_capacity(coords.len());
    for &(n, i, j) in &coords {
        if lattice.insert((i - min_i, j - min_j), strong[n].position).is_some() {
            return Err(ChessboardError::PatternNotFound(
                "inconsistent grid coordinates".into(),
            ));
        }
    }
    let ni = coords.iter().map(|c| c.1 - min_i).max().unwrap_or(0) + 1;
    let nj = coords.iter().map(|c| c.2 - min_j).max().unwrap_or(0) + 1;

    let (w, h) = (dims.width() as i32, dims.height() as i32);
    let placements: Vec<Placement> = if (ni, nj) == (w, h) {
        vec![
            Box::new(|i: i32, j: i32| (i, j)) as Placement,
            Box::new(move |i: i32, j: i32| (w - 1 - i, h - 1 - j)),
        ]
    } else if (ni, nj) == (h, w) {
        vec![
            Box::new(move |i: i32, j: i32| (j, w - 1 - i)) as Placement,
            Box::new(move |i: i32, j: i32| (h - 1 - j, i)),
        ]
    } else {
        return Err(ChessboardError::PatternNotFound(format!(
            "largest grid is {}x{}, expected {}x{}",
            ni, nj, w, h
        )));
    };
    if lattice.len() != needed {
        return Err(ChessboardError::PatternNotFound(format!(
            "grid is incomplete: {} of {} corners",
            lattice.len(),
            needed
        )));
    }

    let mut best: Option<(f32, Vec<Point2<f32>>)> = None;
    for place in &placements {
        let mut points = Vec::with_capacity(needed);
        for j in 0..h {
            for i in 0..w {
                let p = lattice.get(&place(i, j)).ok_or_else(|| {
                    ChessboardError::PatternNotFound("grid is incomplete".into())
                })?;
                points.push(*p);
            }
        }
        let contrast = parity_contrast(gray, dims, &points);
        debug!("placement contrast {:.1}", contrast);
        if best.as_ref().map_or(true, |(c, _)| contrast < *c) {
            best = Some((contrast, points));
        }
    }
    best.map(|(_, p)| p)
        .ok_or_else(|| ChessboardError::PatternNotFound("no placement".into()))
}

/// Mean gray of even cells minus mean gray of odd cells.
fn parity_contrast(gray: &GrayImage, dims: BoardDims, points: &[Point2<f32>]) -> f32 {
    let w = dims.width() as usize;
    let (cols, rows) = dims.cells();
    let mut sum = [0.0f32; 2];
    let mut count = [0u32; 2];
    for r in 0..rows as usize {
        for c in 0..cols as usize {
            let quad = [
                points[r * w + c],
                points[r * w + c + 1],
                points[(r + 1) * w + c + 1],
                points[(r + 1) * w + c],
            ];
            let cx = quad.iter().map(|p| p.x).sum::<f32>() / 4.0;
            let cy = quad.iter().map(|p| p.y).sum::<f32>() / 4.0;
            let k = (r + c) % 2;
            sum[k] += gray_at(gray, cx, cy);
            count[k] += 1;
        }
    }
    let mean = |k: usize| {
        if count[k] == 0 {
            0.0
        } else {
            sum[k] / count[k] as f32
        }
    };
    mean(0) - mean(1)
}

fn gray_at(gray: &GrayImage, x: f32, y: f32) -> f32 {
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }
    let xi = (x.round().max(0.0) as u32).min(gray.width() - 1);
    let yi = (y.round().max(0.0) as u32).min(gray.height() - 1);
    gray.get_pixel(xi, yi).0[0] as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::f32::consts::FRAC_PI_4;

    const SPACING: f32 = 10.0;
    const ORIGIN: f32 = 10.0;

    fn lattice(ni: usize, nj: usize) -> Vec<Corner> {
        let mut out = Vec::new();
        for j in 0..nj {
            for i in 0..ni {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                out.push(Corner {
                    position: Point2::new(ORIGIN + i as f32 * SPACING, ORIGIN + j as f32 * SPACING),
                    orientation,
                    strength: 1.0,
                });
            }
        }
        out
    }

    /// Lattice cells with parity `dark` painted black, the rest white.
    fn board_image(ni: usize, nj: usize, dark: usize) -> GrayImage {
        GrayImage::from_fn(80, 80, |x, y| {
            let fx = (x as f32 - ORIGIN) / SPACING;
            let fy = (y as f32 - ORIGIN) / SPACING;
            let inside = fx >= 0.0 && fy >= 0.0 && fx < (ni - 1) as f32 && fy < (nj - 1) as f32;
            if inside && (fx as usize + fy as usize) % 2 == dark {
                Luma([0])
            } else {
                Luma([230])
            }
        })
    }

    fn p(i: usize, j: usize) -> Point2<f32> {
        Point2::new(ORIGIN + i as f32 * SPACING, ORIGIN + j as f32 * SPACING)
    }

    #[test]
    fn upright_board_keeps_image_order() {
        let dims = BoardDims::new(6, 5).expect("dims");
        let gray = board_image(6, 5, 0);
        let pts = assemble_grid(&lattice(6, 5), dims, &gray, &GridSearchParams::default())
            .expect("grid");
        assert_eq!(pts.len(), 30);
        assert_eq!(pts[0], p(0, 0));
        assert_eq!(pts[1], p(1, 0));
        assert_eq!(pts[6], p(0, 1));
        assert_eq!(pts[29], p(5, 4));
    }

    #[test]
    fn upside_down_board_is_turned_back() {
        let dims = BoardDims::new(6, 5).expect("dims");
        let gray = board_image(6, 5, 1);
        let pts = assemble_grid(&lattice(6, 5), dims, &gray, &GridSearchParams::default())
            .expect("grid");
        assert_eq!(pts[0], p(5, 4));
        assert_eq!(pts[1], p(4, 4));
        assert_eq!(pts[29], p(0, 0));
    }

    #[test]
    fn quarter_turned_board_is_reordered() {
        let dims = BoardDims::new(6, 5).expect("dims");
        // 5 junctions across, 6 down.
        let gray = board_image(5, 6, 0);
        let pts = assemble_grid(&lattice(5, 6), dims, &gray, &GridSearchParams::default())
            .expect("grid");
        assert_eq!(pts.len(), 30);
        assert_eq!(pts[0], p(0, 5));
        assert_eq!(pts[1], p(0, 4));
        assert_eq!(pts[6], p(1, 5));
    }

    #[test]
    fn wrong_size_is_not_a_pattern() {
        let dims = BoardDims::new(8, 5).expect("dims");
        let gray = board_image(6, 5, 0);
        let err = assemble_grid(&lattice(6, 5), dims, &gray, &GridSearchParams::default())
            .unwrap_err();
        assert!(matches!(err, ChessboardError::PatternNotFound(_)));
    }

    #[test]
    fn weak_junctions_are_ignored() {
        let dims = BoardDims::new(6, 5).expect("dims");
        let gray = board_image(6, 5, 0);
        let mut corners = lattice(6, 5);
        corners[7].strength = 0.1;
        let params = GridSearchParams {
            min_strength: 0.5,
            ..Default::default()
        };
        assert!(assemble_grid(&corners, dims, &gray, &params).is_err());
    }
}
