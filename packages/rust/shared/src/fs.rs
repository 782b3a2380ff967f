//! File-tree helpers shared by every task.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, SiteKilnError};

/// Files to ignore during directory traversal.
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect every file under `dir` (recursively) whose extension is one of `extensions`.
///
/// Returns an empty list if `dir` does not exist. Results are sorted so every
/// task processes files in a deterministic order.
pub fn collect_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            SiteKilnError::io(path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_str().unwrap_or_default();
        if IGNORED_FILES.contains(&name) {
            continue;
        }
        if has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Whether `path` has one of the given extensions (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

/// Map `path` from the `from` tree into the `to` tree.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> Result<PathBuf> {
    let rel = path.strip_prefix(from).map_err(|_| {
        SiteKilnError::validation(format!(
            "{} is not inside {}",
            path.display(),
            from.display()
        ))
    })?;
    Ok(to.join(rel))
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SiteKilnError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| SiteKilnError::io(path, e))
}

/// Read a UTF-8 file with the path attached to any error.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SiteKilnError::io(path, e))
}
