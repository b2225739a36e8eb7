use crate::io::read_rgb;
use crate::PlotError;
use image::imageops;
use log::{info, warn};
use nalgebra::Point2;
use plotmark_chessboard::{BoardDims, ChessboardError, PatternDetector};
use plotmark_core::{calibrate_planar, planar_object_points, CameraModel};
use std::path::Path;

/// Estimate a camera from photographs of a plain `dims` chessboard.
///
/// Files that are missing or show no complete pattern are skipped.
pub fn calibrate_with<P: AsRef<Path>>(
    paths: &[P],
    dims: BoardDims,
    detector: &dyn PatternDetector,
) -> Result<CameraModel, PlotError> {
    let mut views: Vec<Vec<Point2<f32>>> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let image = match read_rgb(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match detector.detect(&imageops::grayscale(&image), dims) {
            Ok(points) => views.push(points),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    if views.is_empty() {
        return Err(ChessboardError::PatternNotFound(format!(
            "no usable calibration view among {} file(s)",
            paths.len()
        ))
        .into());
    }
    info!("calibrating from {} of {} view(s)", views.len(), paths.len());

    let object = planar_object_points(dims.width() as usize, dims.height() as usize, 1.0);
    Ok(calibrate_planar(&object, &views)?)
}

/// [`calibrate_with`] using the ChESS detector with default settings.
#[cfg(feature = "chess")]
pub fn calibrate<P: AsRef<Path>>(paths: &[P], dims: BoardDims) -> Result<CameraModel, PlotError> {
    calibrate_with(paths, dims, &crate::ChessPatternDetector::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};
    use nalgebra::{Rotation3, Vector3};
    use plotmark_core::CameraIntrinsics;

    /// Renders the board seen from a pose picked by the image width.
    struct PosedBoard;

    impl PatternDetector for PosedBoard {
        fn detect(
            &self,
            gray: &GrayImage,
            dims: BoardDims,
        ) -> Result<Vec<Point2<f32>>, ChessboardError> {
            let poses = [
                ((0.35, 0.0, 0.02), Vector3::new(-3.0, -2.0, 12.0)),
                ((0.0, 0.4, -0.05), Vector3::new(-3.5, -2.5, 13.0)),
                ((-0.25, -0.3, 0.1), Vector3::new(-2.5, -1.5, 11.0)),
                ((0.2, -0.35, 0.0), Vector3::new(-3.0, -2.0, 14.0)),
            ];
            let Some(&(a, t)) = poses.get(gray.width() as usize - 10) else {
                return Err(ChessboardError::PatternNotFound("blank".into()));
            };
            let intr = CameraIntrinsics {
                fx: 800.0,
                fy: 820.0,
                cx: 320.0,
                cy: 240.0,
                skew: 0.0,
            };
            let r = Rotation3::from_euler_angles(a.0, a.1, a.2);
            Ok(
                planar_object_points(dims.width() as usize, dims.height() as usize, 1.0)
                    .iter()
                    .map(|p| {
                        let pc = r * Vector3::new(p.x as f64, p.y as f64, 0.0) + t;
                        let px = intr.project(Point2::new(pc.x / pc.z, pc.y / pc.z));
                        Point2::new(px.x as f32, px.y as f32)
                    })
                    .collect(),
            )
        }
    }

    #[test]
    fn unusable_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut paths = vec![dir.path().join("missing.png")];
        for w in [10u32, 11, 12, 13, 30] {
            let path = dir.path().join(format!("view{w}.png"));
            RgbImage::new(w, 4).save(&path).expect("png");
            paths.push(path);
        }
        let dims = BoardDims::new(7, 6).expect("dims");
        let cam = calibrate_with(&paths, dims, &PosedBoard).expect("calibrate");
        assert!((cam.intrinsics.fx - 800.0).abs() < 8.0, "fx {}", cam.intrinsics.fx);
        assert!((cam.intrinsics.cy - 240.0).abs() < 4.0, "cy {}", cam.intrinsics.cy);
    }

    #[test]
    fn no_usable_view_is_pattern_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blank = dir.path().join("blank.png");
        RgbImage::new(40, 4).save(&blank).expect("png");
        let dims = BoardDims::new(7, 6).expect("dims");
        let err = calibrate_with(&[blank, dir.path().join("gone.png")], dims, &PosedBoard)
            .unwrap_err();
        assert!(matches!(
            err,
            PlotError::Chessboard(ChessboardError::PatternNotFound(_))
        ));
    }
}
