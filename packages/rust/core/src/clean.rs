//! Remove the staging tree and the contents of the output tree.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, instrument};

use sitekiln_shared::{ProjectLayout, Result, SiteKilnError};

/// Delete `.tmp/` and everything in `dist/` except preserved entries.
///
/// Returns the number of top-level entries removed. Missing trees are fine.
#[instrument(skip_all, fields(output = %layout.output.display()))]
pub async fn clean(layout: &ProjectLayout) -> Result<usize> {
    let mut removed = 0;

    if remove_path(&layout.staging).await? {
        removed += 1;
    }

    let mut entries = match tokio::fs::read_dir(&layout.output).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("output tree absent");
            info!(removed, "clean complete");
            return Ok(removed);
        }
        Err(e) => return Err(SiteKilnError::io(&layout.output, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SiteKilnError::io(&layout.output, e))?
    {
        let name = entry.file_name();
        if layout
            .preserve
            .iter()
            .any(|keep| name.to_str() == Some(keep.as_str()))
        {
            debug!(name = ?name, "preserved");
            continue;
        }
        if remove_path(&entry.path()).await? {
            removed += 1;
        }
    }

    info!(removed, "clean complete");
    Ok(removed)
}

/// Remove a file or directory tree. `false` if it did not exist.
async fn remove_path(path: &Path) -> Result<bool> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(SiteKilnError::io(path, e)),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| SiteKilnError::io(path, e))?;
    debug!(path = %path.display(), "removed");
    Ok(true)
}
