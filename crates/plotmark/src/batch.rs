//! Directory-level sorting and normalization.

use crate::io::refuse_existing;
use crate::{PlotConfig, PlotError, PlotImage};
use log::{error, info};
use plotmark_chessboard::PatternDetector;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of a batch run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// `(source, written)` pairs.
    pub done: Vec<(PathBuf, PathBuf)>,
    /// `(source, reason)` pairs of skipped files.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    fn record(&mut self, src: PathBuf, result: Result<PathBuf, PlotError>) {
        match result {
            Ok(dst) => {
                info!("{} -> {}", src.display(), dst.display());
                self.done.push((src, dst));
            }
            Err(e) => {
                error!("{}: {}", src.display(), e);
                self.failed.push((src, e.to_string()));
            }
        }
    }
}

/// Regular files under `root`, recursively, in file-name order.
pub fn collect_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, PlotError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(PlotError::file(root, "not a directory"));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| PlotError::file(root, e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn prepare(from: &Path, to: &Path, config: &PlotConfig) -> Result<Vec<PathBuf>, PlotError> {
    config.board_dims()?;
    if !to.is_dir() {
        return Err(PlotError::file(to, "not a directory"));
    }
    collect_files(from)
}

fn target(to: &Path, dir_name: &str, src: &Path) -> Result<PathBuf, PlotError> {
    let name = src
        .file_name()
        .ok_or_else(|| PlotError::file(src, "no file name"))?;
    let dir = to.join(dir_name);
    fs::create_dir_all(&dir)?;
    let dst = dir.join(name);
    refuse_existing(&dst)?;
    Ok(dst)
}

fn move_file(src: &Path, dst: &Path) -> Result<(), PlotError> {
    if fs::rename(src, dst).is_err() {
        fs::copy(src, dst)?;
        fs::remove_file(src)?;
    }
    Ok(())
}

/// Move every image under `from` into `to/<identifier>/`.
pub fn classify_dir_with(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    config: &PlotConfig,
    detector: &dyn PatternDetector,
) -> Result<BatchSummary, PlotError> {
    let to = to.as_ref();
    let files = prepare(from.as_ref(), to, config)?;
    let mut summary = BatchSummary::default();
    for src in files {
        let result = PlotImage::open(&src, config, detector)
            .and_then(|plot| plot.compute_id())
            .and_then(|id| {
                let dst = target(to, &id.dir_name(), &src)?;
                move_file(&src, &dst)?;
                Ok(dst)
            });
        summary.record(src, result);
    }
    Ok(summary)
}

/// Normalize every image under `from` into `to/<identifier>/<file name>`.
pub fn process_dir_with(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    config: &PlotConfig,
    detector: &dyn PatternDetector,
) -> Result<BatchSummary, PlotError> {
    let to = to.as_ref();
    let files = prepare(from.as_ref(), to, config)?;
    let mut summary = BatchSummary::default();
    for src in files {
        let result = PlotImage::open(&src, config, detector)
            .and_then(|plot| {
                let normalized = plot.normalize()?;
                let dst = target(to, &normalized.report.id.dir_name, &src)?;
                normalized.save(&dst)?;
                Ok(dst)
            });
        summary.record(src, result);
    }
    Ok(summary)
}

#[cfg(feature = "chess")]
pub fn classify_dir(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    config: &PlotConfig,
) -> Result<BatchSummary, PlotError> {
    let detector = crate::ChessPatternDetector::new(config.pattern.clone());
    classify_dir_with(from, to, config, &detector)
}

#[cfg(feature = "chess")]
pub fn process_dir(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
    config: &PlotConfig,
) -> Result<BatchSummary, PlotError> {
    let detector = crate::ChessPatternDetector::new(config.pattern.clone());
    process_dir_with(from, to, config, &detector)
}
