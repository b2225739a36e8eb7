//! JSON configuration, normalization reports and file helpers.

use crate::{ChessPatternParams, NormalizeParams, PlotError, PlotIdentifier, ReferenceQuad};
use chrono::{DateTime, Utc};
use image::RgbImage;
use plotmark_chessboard::{BoardDims, ClassifierMode};
use plotmark_core::CameraModel;
use plotmark_marker::{Sphere, SphereFinderParams};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

fn default_sphere_diameter() -> f64 {
    40.0
}

fn default_square_side() -> f64 {
    10.0
}

/// One decoding / normalization job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Input photograph. Batch commands ignore it.
    #[serde(default)]
    pub image_path: Option<String>,
    /// Inner-corner counts of the marker, in either order.
    pub board: [u32; 2],
    /// Lens model; the image is used as-is without one.
    #[serde(default)]
    pub camera: Option<CameraModel>,
    /// Real sphere diameter, same unit as `square_side`.
    #[serde(default = "default_sphere_diameter")]
    pub sphere_diameter: f64,
    /// Real side of a marker square.
    #[serde(default = "default_square_side")]
    pub square_side: f64,
    #[serde(default)]
    pub classifier: ClassifierMode,
    #[serde(default)]
    pub pattern: ChessPatternParams,
    #[serde(default)]
    pub spheres: SphereFinderParams,
    #[serde(default)]
    pub normalize: NormalizeParams,
    /// Where `normalize` writes the output image.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Report location; defaults to the output path plus `.json`.
    #[serde(default)]
    pub report_path: Option<String>,
}

impl PlotConfig {
    pub fn new(size1: u32, size2: u32) -> Self {
        Self {
            image_path: None,
            board: [size1, size2],
            camera: None,
            sphere_diameter: default_sphere_diameter(),
            square_side: default_square_side(),
            classifier: ClassifierMode::default(),
            pattern: ChessPatternParams::default(),
            spheres: SphereFinderParams::default(),
            normalize: NormalizeParams::default(),
            output_path: None,
            report_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PlotError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| PlotError::file(path, format!("cannot read config: {e}")))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PlotError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn board_dims(&self) -> Result<BoardDims, PlotError> {
        Ok(BoardDims::new(self.board[0], self.board[1])?)
    }

    pub fn image_path(&self) -> Result<PathBuf, PlotError> {
        self.image_path
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| PlotError::file("<config>", "no image_path given"))
    }

    /// Resolve the normalized output path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("normalized.png"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierReport {
    pub value: u64,
    pub words: Vec<u16>,
    pub dir_name: String,
}

impl From<&PlotIdentifier> for IdentifierReport {
    fn from(id: &PlotIdentifier) -> Self {
        Self {
            value: id.value(),
            words: id.words(),
            dir_name: id.dir_name(),
        }
    }
}

/// Sidecar metadata of a normalized image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotReport {
    pub comment: String,
    pub normalized_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
    pub id: IdentifierReport,
    pub quad: ReferenceQuad,
    pub spheres: Vec<Sphere>,
    pub pixels_per_unit: f64,
    pub output_size: [u32; 2],
}

impl PlotReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PlotError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PlotError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Decode an image file to RGB.
pub fn read_rgb(path: impl AsRef<Path>) -> Result<RgbImage, PlotError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PlotError::file(path, "no such image file"));
    }
    Ok(image::open(path)?.to_rgb8())
}

/// `<path>.json`, keeping the original extension.
pub fn sidecar_path(path: impl AsRef<Path>) -> PathBuf {
    let mut s: OsString = path.as_ref().as_os_str().to_owned();
    s.push(".json");
    PathBuf::from(s)
}

pub(crate) fn refuse_existing(path: &Path) -> Result<(), PlotError> {
    if path.exists() {
        return Err(PlotError::file(path, "refusing to overwrite existing file"));
    }
    Ok(())
}

/// Write an image, failing if the file already exists.
pub fn save_new_image(image: &RgbImage, path: impl AsRef<Path>) -> Result<(), PlotError> {
    let path = path.as_ref();
    refuse_existing(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: PlotConfig = serde_json::from_str(r#"{ "board": [5, 8] }"#).expect("parse");
        assert_eq!(cfg, PlotConfig::new(5, 8));
        assert_eq!(cfg.sphere_diameter, 40.0);
        assert_eq!(cfg.square_side, 10.0);
        assert_eq!(cfg.normalize.width, 2000);
        let dims = cfg.board_dims().expect("dims");
        assert_eq!((dims.width(), dims.height()), (8, 5));
        assert!(cfg.image_path().is_err());
    }

    #[test]
    fn classifier_mode_uses_snake_case() {
        let cfg: PlotConfig =
            serde_json::from_str(r#"{ "board": [5, 8], "classifier": "max_likelihood" }"#)
                .expect("parse");
        assert_eq!(cfg.classifier, ClassifierMode::MaxLikelihood);
    }

    #[test]
    fn sidecar_keeps_extension() {
        assert_eq!(sidecar_path("out/a.png"), PathBuf::from("out/a.png.json"));
    }

    #[test]
    fn equal_parity_board_is_rejected() {
        assert!(matches!(
            PlotConfig::new(6, 8).board_dims(),
            Err(PlotError::Chessboard(_))
        ));
    }
}
