//! Stylesheet build: Sass → CSS → unused-rule removal → prefix/minify → AMP fixups.
//!
//! Each non-partial `src/css/**/*.scss` file is compiled on its own. The
//! compiled CSS is staged under `.tmp/css/`, pruned against the staged HTML,
//! minified for the configured browser matrix, and written to `dist/css/`
//! together with a source map.

mod browsers;
mod process;
mod sass;
mod unused;

use std::path::{Path, PathBuf};

use tracing::{error, info, instrument};

use sitekiln_shared::{FileReport, ProjectLayout, Result, SiteConfig, fs, total_bytes};

pub use browsers::parse_browsers;
pub use process::{AMP_DISALLOWED_VIEWPORT, ProcessedCss, process};
pub use sass::{compile, is_partial};
pub use unused::HtmlCorpus;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Inputs for a stylesheet build.
#[derive(Debug, Clone)]
pub struct StylesOptions {
    /// Project trees.
    pub layout: ProjectLayout,
    /// Absolute Sass load paths.
    pub include_paths: Vec<PathBuf>,
    /// Browser support matrix (`name >= version`).
    pub browsers: Vec<String>,
}

impl StylesOptions {
    /// Build options from the project config, resolving include paths against the root.
    pub fn from_config(layout: &ProjectLayout, config: &SiteConfig) -> Self {
        Self {
            layout: layout.clone(),
            include_paths: config
                .styles
                .include_paths
                .iter()
                .map(|p| layout.root.join(p))
                .collect(),
            browsers: config.styles.browsers.clone(),
        }
    }
}

/// Outcome of a stylesheet build.
#[derive(Debug, Clone, Default)]
pub struct StylesReport {
    /// Final CSS files written to the output tree.
    pub written: Vec<FileReport>,
    /// Sources whose output was skipped because compilation failed.
    pub failed: Vec<PathBuf>,
    /// Selectors removed as unused, across all files.
    pub removed_selectors: usize,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Build every stylesheet under `src/css`.
///
/// Compile errors are logged and the file is skipped; filesystem errors abort.
#[instrument(skip_all, fields(source = %opts.layout.source_css().display()))]
pub fn build_styles(opts: &StylesOptions) -> Result<StylesReport> {
    let layout = &opts.layout;
    let browsers = parse_browsers(&opts.browsers)?;

    let sources: Vec<PathBuf> = fs::collect_files(&layout.source_css(), &["scss"])?
        .into_iter()
        .filter(|p| !is_partial(p))
        .collect();

    let staged_html = fs::collect_files(&layout.staging, &["html"])?;
    let mut corpus = HtmlCorpus::from_files(&staged_html)?;
    info!(
        stylesheets = sources.len(),
        documents = corpus.len(),
        "building styles"
    );

    let mut report = StylesReport::default();

    for source in &sources {
        let css = match compile(source, &opts.include_paths) {
            Ok(css) => css,
            Err(e) => {
                error!(error = %e, "sass compilation failed, skipping file");
                report.failed.push(source.clone());
                continue;
            }
        };

        let rel = css_relative_path(source, &layout.source_css())?;
        fs::write_file(&layout.staging_css().join(&rel), &css)?;

        let filename = rel.to_string_lossy().replace('\\', "/");
        let processed = match process(&css, &filename, browsers, &mut corpus) {
            Ok(processed) => processed,
            Err(e) => {
                error!(error = %e, "css post-processing failed, skipping file");
                report.failed.push(source.clone());
                continue;
            }
        };

        let out_path = layout.output_css().join(&rel);
        let written = write_with_map(&out_path, &processed)?;
        report.removed_selectors += processed.removed_selectors;
        report.written.push(written);
    }

    info!(
        title = "css",
        files = report.written.len(),
        bytes = total_bytes(&report.written),
        failed = report.failed.len(),
        removed_selectors = report.removed_selectors,
        "styles complete"
    );

    Ok(report)
}

/// `src/css/pages/home.scss` → `pages/home.css`
fn css_relative_path(source: &Path, css_root: &Path) -> Result<PathBuf> {
    let rebased = fs::rebase(source, css_root, Path::new(""))?;
    Ok(rebased.with_extension("css"))
}

/// Write `<name>.css` with a trailing map reference, and `<name>.css.map` beside it.
fn write_with_map(out_path: &Path, processed: &ProcessedCss) -> Result<FileReport> {
    let file_name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map_name = format!("{file_name}.map");

    let code = format!(
        "{}\n/*# sourceMappingURL={map_name} */\n",
        processed.code
    );
    fs::write_file(out_path, &code)?;
    fs::write_file(&out_path.with_file_name(&map_name), &processed.map)?;

    Ok(FileReport {
        path: out_path.to_path_buf(),
        bytes: code.len(),
    })
}
