//! High-level facade for decoding and normalizing field plot photographs.
//!
//! A plot is photographed together with a color-coded chessboard marker and
//! three painted reference spheres. This crate
//! - finds the marker grid (ChESS junctions, feature `chess`),
//! - decodes the plot identifier from the marker's data squares,
//! - locates the spheres by the color of the marker's sphere-reference square,
//! - warps the plot into a fixed output frame and writes a JSON report.
//!
//! ## Quickstart
//!
//! ```no_run
//! use plotmark::{ChessPatternDetector, PlotConfig, PlotImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PlotConfig::new(5, 8);
//! let detector = ChessPatternDetector::new(config.pattern.clone());
//! let plot = PlotImage::open("plot.jpg", &config, &detector)?;
//! println!("id {}", plot.compute_id()?);
//! plot.save_normalized("plot_normalized.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `plotmark::core`: hue statistics, homographies, camera model, calibration.
//! - `plotmark::chessboard`: marker grid, squares, color classification.
//! - `plotmark::marker`: reference sphere search.
//! - [`PlotImage`]: one photograph end to end.
//! - [`classify_dir`] / [`process_dir`]: batch sorting by identifier.
//! - [`render_marker`]: printable marker for a plot identifier.

pub use plotmark_chessboard as chessboard;
pub use plotmark_core as core;
pub use plotmark_marker as marker;

mod batch;
mod calibrate;
mod detect;
mod error;
mod id;
mod io;
mod normalize;
mod plot_image;
mod print;

pub use batch::{classify_dir_with, collect_files, process_dir_with, BatchSummary};
pub use calibrate::calibrate_with;
pub use detect::ChessPatternParams;
pub use error::PlotError;
pub use id::{square_code, square_color, PlotIdentifier, MAX_DATA_SQUARES, SQUARES_PER_WORD};
pub use io::{read_rgb, save_new_image, sidecar_path, IdentifierReport, PlotConfig, PlotReport};
pub use normalize::{normalize_image, NormalizeParams, ReferenceQuad};
pub use plot_image::{NormalizedPlot, PlotImage};
pub use print::{data_square_count, marker_corners, render_marker, MarkerPrintParams};

pub use plotmark_chessboard::{BoardDims, ClassifierMode, PatternDetector, SampleColor};
pub use plotmark_marker::{Sphere, SphereFinderParams};

#[cfg(feature = "chess")]
pub use batch::{classify_dir, process_dir};
#[cfg(feature = "chess")]
pub use calibrate::calibrate;
#[cfg(feature = "chess")]
pub use detect::ChessPatternDetector;
#[cfg(feature = "chess")]
pub use plot_image::{compute_id, normalize};
