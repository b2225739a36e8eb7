//! One plot photograph: marker decoding, sphere search and normalization.

use crate::io::{read_rgb, refuse_existing, save_new_image, sidecar_path};
use crate::{
    normalize_image, IdentifierReport, PlotConfig, PlotError, PlotIdentifier, PlotReport,
    ReferenceQuad,
};
use chrono::Utc;
use image::{imageops, RgbImage};
use log::{debug, info};
use plotmark_chessboard::{BoardDims, BoardLayout, Chessboard, ChessboardError, PatternDetector};
use plotmark_marker::{Sphere, SphereFinder};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A source photograph whose marker grid has been found and decoded.
#[derive(Clone, Debug)]
pub struct PlotImage {
    source: Option<PathBuf>,
    image: RgbImage,
    chessboard: Chessboard,
    config: PlotConfig,
}

impl PlotImage {
    /// Load `path` and decode its marker.
    pub fn open(
        path: impl AsRef<Path>,
        config: &PlotConfig,
        detector: &dyn PatternDetector,
    ) -> Result<Self, PlotError> {
        let dims = config.board_dims()?;
        let path = path.as_ref();
        let image = read_rgb(path)?;
        debug!("loaded {} ({}x{})", path.display(), image.width(), image.height());
        let mut plot = Self::with_dims(image, config, detector, dims)?;
        plot.source = Some(path.to_path_buf());
        Ok(plot)
    }

    /// Decode the marker of an already loaded photograph.
    pub fn from_image(
        image: RgbImage,
        config: &PlotConfig,
        detector: &dyn PatternDetector,
    ) -> Result<Self, PlotError> {
        let dims = config.board_dims()?;
        Self::with_dims(image, config, detector, dims)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = image.width(), height = image.height()))
    )]
    fn with_dims(
        image: RgbImage,
        config: &PlotConfig,
        detector: &dyn PatternDetector,
        dims: BoardDims,
    ) -> Result<Self, PlotError> {
        let image = match &config.camera {
            Some(camera) => camera.undistort_image(&image),
            None => image,
        };
        let gray = imageops::grayscale(&image);
        let points = detector.detect(&gray, dims)?;
        let chessboard = Chessboard::new(
            &image,
            dims,
            points,
            BoardLayout::SamplesAndSphere,
            config.classifier,
        )?;
        Ok(Self {
            source: None,
            image,
            chessboard,
            config: config.clone(),
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The undistorted photograph.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn chessboard(&self) -> &Chessboard {
        &self.chessboard
    }

    pub fn compute_id(&self) -> Result<PlotIdentifier, PlotError> {
        let id = PlotIdentifier::from_association(self.chessboard.association())?;
        info!("plot identifier {} ({})", id, id.dir_name());
        Ok(id)
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.chessboard.pixels_per_unit(self.config.square_side)
    }

    /// Sphere diameter in pixels, scaled by the marker's apparent size.
    pub fn expected_sphere_diameter(&self) -> f32 {
        (self.config.sphere_diameter * self.pixels_per_unit()) as f32
    }

    /// The three reference spheres, largest first.
    pub fn find_spheres(&self) -> Result<Vec<Sphere>, PlotError> {
        let reference = self.chessboard.sphere_square().ok_or_else(|| {
            ChessboardError::ChessboardTooSmall {
                kept: self.chessboard.squares().len(),
                reserved: BoardLayout::SamplesAndSphere.reserved(),
            }
        })?;
        let finder = SphereFinder::new(self.config.spheres.clone());
        Ok(finder.find(
            reference.image(),
            &self.image,
            self.expected_sphere_diameter(),
        )?)
    }

    /// Chessboard centroid and the sphere centers as a convex quad.
    pub fn calc_ref_points(&self, spheres: &[Sphere]) -> Result<ReferenceQuad, PlotError> {
        let centroid = self
            .chessboard
            .centroid()
            .ok_or(PlotError::DegenerateReferenceQuad)?;
        match spheres {
            [a, b, c, ..] => ReferenceQuad::new(centroid, [a.center, b.center, c.center]),
            _ => Err(plotmark_marker::SphereError::InsufficientSpheres {
                found: spheres.len(),
            }
            .into()),
        }
    }

    /// Warp the plot into the configured output frame.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn normalize(&self) -> Result<NormalizedPlot, PlotError> {
        let id = self.compute_id()?;
        let spheres = self.find_spheres()?;
        let quad = self.calc_ref_points(&spheres)?;
        let image = normalize_image(&self.image, &quad, &self.config.normalize)?;
        let normalized_at = Utc::now();
        let report = PlotReport {
            comment: format!(
                "normalized {} id {}",
                normalized_at.to_rfc3339(),
                id.dir_name()
            ),
            normalized_at,
            source: self.source.as_ref().map(|p| p.display().to_string()),
            id: IdentifierReport::from(&id),
            quad,
            spheres,
            pixels_per_unit: self.pixels_per_unit(),
            output_size: [image.width(), image.height()],
        };
        Ok(NormalizedPlot { image, report })
    }

    /// Normalize and write the result plus its `<path>.json` report.
    pub fn save_normalized(&self, path: impl AsRef<Path>) -> Result<PlotReport, PlotError> {
        let path = path.as_ref();
        refuse_existing(path)?;
        let normalized = self.normalize()?;
        normalized.save(path)?;
        Ok(normalized.report)
    }
}

/// A normalized plot and its metadata.
#[derive(Clone, Debug)]
pub struct NormalizedPlot {
    pub image: RgbImage,
    pub report: PlotReport,
}

impl NormalizedPlot {
    /// Write the image and its sidecar report. Existing files are never replaced.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PlotError> {
        let path = path.as_ref();
        let sidecar = sidecar_path(path);
        refuse_existing(&sidecar)?;
        save_new_image(&self.image, path)?;
        self.report.write_json(&sidecar)?;
        info!("wrote {} and {}", path.display(), sidecar.display());
        Ok(())
    }
}

/// Decode the identifier of `config.image_path` with the ChESS detector.
#[cfg(feature = "chess")]
pub fn compute_id(config: &PlotConfig) -> Result<PlotIdentifier, PlotError> {
    let detector = crate::ChessPatternDetector::new(config.pattern.clone());
    PlotImage::open(config.image_path()?, config, &detector)?.compute_id()
}

/// Normalize `config.image_path` with the ChESS detector and save it to
/// `config.output_path`.
#[cfg(feature = "chess")]
pub fn normalize(config: &PlotConfig) -> Result<PlotReport, PlotError> {
    let detector = crate::ChessPatternDetector::new(config.pattern.clone());
    let plot = PlotImage::open(config.image_path()?, config, &detector)?;
    let output = config.output_path();
    let normalized = plot.normalize()?;
    match &config.report_path {
        Some(report_path) => {
            refuse_existing(Path::new(report_path))?;
            save_new_image(&normalized.image, &output)?;
            normalized.report.write_json(report_path)?;
        }
        None => normalized.save(&output)?,
    }
    Ok(normalized.report)
}
