//! Per-category transformers
//!
//! Each category reads the files its source globs match, runs them through
//! a fixed chain of stages and writes the results under its destination.
//! A glob that matches nothing is not an error; failing to write is.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Settings;
use crate::error::{FrontpipeError, Result};
use crate::paths::{expand, AssetCategory, PathTable};

pub mod annotate;
pub mod bower;
pub mod cssmin;
pub mod sourcemap;

mod css;
mod dependencies;
mod images;
mod scripts;

pub use cssmin::CssOptions;
pub use dependencies::{LIB_CSS, LIB_JS};
pub use images::PngQuality;
pub use scripts::SCRIPTS_BUNDLE;

/// What one transformer run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Source files read
    pub read: usize,
    /// Files written, absolute
    pub written: Vec<PathBuf>,
}

impl TransformReport {
    fn merge(&mut self, other: TransformReport) {
        self.read += other.read;
        self.written.extend(other.written);
    }
}

/// Runs the transform chain of any category against a project root
#[derive(Debug, Clone)]
pub struct Transformer {
    root: PathBuf,
    paths: PathTable,
    css: CssOptions,
    png: PngQuality,
}

impl Transformer {
    pub fn new(root: impl Into<PathBuf>, paths: PathTable, settings: &Settings) -> Self {
        Self {
            root: root.into(),
            paths,
            css: CssOptions {
                keep_breaks: settings.keep_breaks,
            },
            png: PngQuality {
                min: settings.png_quality_min,
                max: settings.png_quality_max,
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// Run the transform chain for one category
    pub async fn run(&self, category: AssetCategory) -> Result<TransformReport> {
        match category {
            AssetCategory::Scripts => scripts::run(self).await,
            AssetCategory::Html | AssetCategory::Favicon => self.copy(category).await,
            AssetCategory::Css => css::run(self).await,
            AssetCategory::Images => images::run(self).await,
            AssetCategory::Dependencies => dependencies::run(self).await,
        }
    }

    /// Copy every group of a category verbatim
    async fn copy(&self, category: AssetCategory) -> Result<TransformReport> {
        let mut report = TransformReport::default();

        for group in &self.paths.resolve(category).groups {
            let dest = self.root.join(&group.dest);
            for file in expand(&self.root, &group.patterns)? {
                let bytes = read_bytes(&file.path).await?;
                let target = dest.join(&file.relative);
                write_output(&target, &bytes).await?;
                report.merge(TransformReport {
                    read: 1,
                    written: vec![target],
                });
            }
        }

        Ok(report)
    }
}

pub(crate) async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| FrontpipeError::fs(path, e))
}

pub(crate) async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FrontpipeError::fs(path, e))
}

/// Write a file, creating its parent directories
pub(crate) async fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FrontpipeError::fs(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| FrontpipeError::fs(path, e))?;
    debug!(path = %path.display(), "wrote");
    Ok(())
}

/// Source names in maps and logs always use forward slashes
pub(crate) fn display_relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
