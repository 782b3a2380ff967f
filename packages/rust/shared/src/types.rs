//! Core domain types: the three file trees and per-file output reports.

use std::path::{Path, PathBuf};

use crate::config::SiteConfig;

/// Subdirectory of the source, staging and output trees that holds stylesheets.
pub const CSS_DIR: &str = "css";

// ---------------------------------------------------------------------------
// ProjectLayout
// ---------------------------------------------------------------------------

/// Absolute locations of the source, staging and output trees for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Project root all relative config paths are resolved against.
    pub root: PathBuf,
    /// Author-provided input (never written).
    pub source: PathBuf,
    /// Transient intermediate tree.
    pub staging: PathBuf,
    /// Final deployable tree.
    pub output: PathBuf,
    /// Top-level output entries that survive `clean`.
    pub preserve: Vec<String>,
}

impl ProjectLayout {
    /// Resolve the configured paths against `root`.
    pub fn resolve(root: &Path, config: &SiteConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            source: root.join(&config.paths.source),
            staging: root.join(&config.paths.staging),
            output: root.join(&config.paths.output),
            preserve: config.paths.preserve.clone(),
        }
    }

    /// `src/css`
    pub fn source_css(&self) -> PathBuf {
        self.source.join(CSS_DIR)
    }

    /// `.tmp/css`
    pub fn staging_css(&self) -> PathBuf {
        self.staging.join(CSS_DIR)
    }

    /// `dist/css`
    pub fn output_css(&self) -> PathBuf {
        self.output.join(CSS_DIR)
    }
}

// ---------------------------------------------------------------------------
// FileReport
// ---------------------------------------------------------------------------

/// One file written by a task, used for size reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Destination path.
    pub path: PathBuf,
    /// Size in bytes of the written content.
    pub bytes: usize,
}

/// Sum of all reported sizes.
pub fn total_bytes(reports: &[FileReport]) -> usize {
    reports.iter().map(|r| r.bytes).sum()
}
