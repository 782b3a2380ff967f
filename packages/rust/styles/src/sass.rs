//! Sass → CSS compilation via `grass`.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use sitekiln_shared::{Result, SiteKilnError};

/// Compile one Sass entry point to expanded CSS.
///
/// `@use`/`@import` resolve relative to the file first, then through
/// `include_paths` in order.
#[instrument(skip(include_paths), fields(path = %path.display()))]
pub fn compile(path: &Path, include_paths: &[PathBuf]) -> Result<String> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    for include in include_paths {
        options = options.load_path(include);
    }

    let css = grass::from_path(path, &options)
        .map_err(|e| SiteKilnError::compile(path, e.to_string()))?;

    debug!(bytes = css.len(), "sass compiled");
    Ok(css)
}

/// Sass partials (`_name.scss`) are only compiled through the files that use them.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_nested_rules_and_variables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("main.scss");
        std::fs::write(&path, "$brand: #336699;\n.card { .title { color: $brand; } }\n").unwrap();

        let css = compile(&path, &[]).expect("compile");
        assert!(css.contains(".card .title"));
        assert!(css.contains("#336699"));
    }

    #[test]
    fn resolves_partials_through_include_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vendor = dir.path().join("vendor");
        std::fs::create_dir_all(&vendor).unwrap();
        std::fs::write(vendor.join("_grid.scss"), ".row { display: flex; }\n").unwrap();

        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let path = src.join("main.scss");
        std::fs::write(&path, "@import 'grid';\n").unwrap();

        let css = compile(&path, &[vendor]).expect("compile");
        assert!(css.contains(".row"));
    }

    #[test]
    fn syntax_error_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.scss");
        std::fs::write(&path, ".a { color: $undefined; }\n").unwrap();

        let err = compile(&path, &[]).unwrap_err();
        assert!(matches!(err, SiteKilnError::Compile { .. }));
        assert!(err.to_string().contains("broken.scss"));
    }

    #[test]
    fn detects_partials() {
        assert!(is_partial(Path::new("src/css/_variables.scss")));
        assert!(!is_partial(Path::new("src/css/main.scss")));
    }
}
