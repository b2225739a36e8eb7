//! Reference sphere detection.
//!
//! Three painted spheres sit around each plot. Their paint matches the
//! sphere-reference square of the chessboard marker, so the square's hue
//! statistics select a band of the image's hue channel. That band mask is
//! opened, dilated and blurred before a gradient-voting circle search picks
//! out the spheres.
//!
//! ```no_run
//! use plotmark_marker::{SphereFinder, SphereFinderParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = image::open("plot.jpg")?.to_rgb8();
//! let reference = image::open("sphere_square.png")?.to_rgb8();
//! let finder = SphereFinder::new(SphereFinderParams::default());
//! for s in finder.find(&reference, &image, 120.0)? {
//!     println!("{:.1},{:.1} r={:.1}", s.center.x, s.center.y, s.radius);
//! }
//! # Ok(())
//! # }
//! ```

mod circles;
mod finder;
mod mask;
mod params;

pub use circles::{detect_circles, Circle};
pub use finder::{Sphere, SphereError, SphereFinder, SPHERE_COUNT};
pub use mask::{blur_mask, clean_mask, element_radius, hue_band_mask};
pub use params::{CircleDetectorParams, SphereFinderParams};
