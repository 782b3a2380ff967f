//! Byte-for-byte copy steps.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, instrument};

use sitekiln_shared::{FileReport, ProjectLayout, Result, SiteKilnError, StaticFilesConfig, fs};

/// Copy every `src/**/*.html` into the staging tree, keeping relative paths.
#[instrument(skip_all, fields(source = %layout.source.display()))]
pub async fn copy_to_staging(layout: &ProjectLayout) -> Result<Vec<FileReport>> {
    let mut copied = Vec::new();
    for path in fs::collect_files(&layout.source, &["html"])? {
        let target = fs::rebase(&path, &layout.source, &layout.staging)?;
        copied.push(copy_file(&path, &target).await?);
    }
    info!(files = copied.len(), "copied to staging");
    Ok(copied)
}

/// Copy the configured top-level static files and the files directly inside
/// the image directory into the output tree. Missing sources are skipped.
#[instrument(skip_all, fields(source = %layout.source.display()))]
pub async fn copy_static(
    layout: &ProjectLayout,
    files: &StaticFilesConfig,
) -> Result<Vec<FileReport>> {
    let mut copied = Vec::new();

    for name in &files.files {
        let from = layout.source.join(name);
        if !exists(&from).await? {
            debug!(path = %from.display(), "static file absent, skipping");
            continue;
        }
        copied.push(copy_file(&from, &layout.output.join(name)).await?);
    }

    let image_src = layout.source.join(&files.image_dir);
    let image_dst = layout.output.join(&files.image_dir);
    match tokio::fs::read_dir(&image_src).await {
        Ok(mut entries) => {
            let mut images = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| SiteKilnError::io(&image_src, e))?
            {
                let kind = entry
                    .file_type()
                    .await
                    .map_err(|e| SiteKilnError::io(entry.path(), e))?;
                if kind.is_file() {
                    images.push(entry.path());
                }
            }
            images.sort();
            for path in images {
                let target = fs::rebase(&path, &image_src, &image_dst)?;
                copied.push(copy_file(&path, &target).await?);
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %image_src.display(), "image directory absent, skipping");
        }
        Err(e) => return Err(SiteKilnError::io(&image_src, e)),
    }

    info!(files = copied.len(), "copied static files");
    Ok(copied)
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| SiteKilnError::io(path, e))
}

async fn copy_file(from: &Path, to: &Path) -> Result<FileReport> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SiteKilnError::io(parent, e))?;
    }
    let bytes = tokio::fs::copy(from, to)
        .await
        .map_err(|e| SiteKilnError::io(from, e))?;
    debug!(from = %from.display(), to = %to.display(), bytes, "copied");
    Ok(FileReport {
        path: to.to_path_buf(),
        bytes: bytes as usize,
    })
}
