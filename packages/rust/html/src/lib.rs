//! HTML assembly: build blocks, CSS inlining, and minification.
//!
//! Reads the staged templates, rewrites build blocks, inlines every built
//! stylesheet as `<style amp-custom>`, minifies, and writes one file per input
//! into the output tree.

mod blocks;

use std::path::PathBuf;

use tracing::{debug, info, instrument};

use sitekiln_shared::{FileReport, ProjectLayout, Result, SiteKilnError, fs, total_bytes};

/// Outcome of an HTML assembly run.
#[derive(Debug, Clone, Default)]
pub struct HtmlReport {
    /// Minified documents written to the output tree.
    pub written: Vec<FileReport>,
}

/// Assemble every staged HTML file into the output tree.
#[instrument(skip_all, fields(staging = %layout.staging.display()))]
pub fn assemble_html(layout: &ProjectLayout) -> Result<HtmlReport> {
    let stylesheets = load_stylesheets(layout)?;
    let documents = fs::collect_files(&layout.staging, &["html"])?;

    info!(
        documents = documents.len(),
        stylesheets = stylesheets.len(),
        "assembling html"
    );

    let mut report = HtmlReport::default();
    for path in &documents {
        let source = fs::read_to_string(path)?;
        let assembled = assemble_document(&source, &stylesheets)?;

        let out_path = fs::rebase(path, &layout.staging, &layout.output)?;
        fs::write_file(&out_path, &assembled)?;

        info!(title = "html", path = %out_path.display(), bytes = assembled.len(), "wrote");
        report.written.push(FileReport {
            path: out_path,
            bytes: assembled.len(),
        });
    }

    info!(
        title = "html",
        files = report.written.len(),
        bytes = total_bytes(&report.written),
        "html complete"
    );
    Ok(report)
}

/// Transform one template: build blocks → CSS injection → minification.
pub fn assemble_document(source: &str, stylesheets: &[String]) -> Result<String> {
    let html = blocks::resolve_build_blocks(source);
    let html = blocks::inject_css(&html, stylesheets);
    minify(&html)
}

/// Minify markup: drop comments, collapse whitespace and boolean attributes,
/// unquote attributes where safe, omit optional tags. The doctype is kept verbatim.
pub fn minify(html: &str) -> Result<String> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_comments = false;
    cfg.do_not_minify_doctype = true;
    cfg.ensure_spec_compliant_unquoted_attribute_values = true;
    cfg.keep_spaces_between_attributes = true;
    // Inlined CSS is already minified; scripts are JSON or external.
    cfg.minify_css = false;
    cfg.minify_js = false;

    let bytes = minify_html::minify(html.as_bytes(), &cfg);
    debug!(before = html.len(), after = bytes.len(), "minified");

    String::from_utf8(bytes).map_err(|e| SiteKilnError::Html(format!("minifier output: {e}")))
}

/// Read every built `*.css` file in the output tree, sorted by path.
fn load_stylesheets(layout: &ProjectLayout) -> Result<Vec<String>> {
    let paths: Vec<PathBuf> = fs::collect_files(&layout.output, &["css"])?;
    paths
        .iter()
        .map(|p| fs::read_to_string(p).map(|css| css.trim_end().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Node};
    use sitekiln_shared::SiteConfig;

    const TEMPLATE: &str = r#"<!doctype html>
<html ⚡ lang="en">
  <head>
    <meta charset="utf-8">
    <title>Home</title>
    <!-- inject:css -->
    <!-- endinject -->
  </head>
  <body>
    <!-- hero section -->
    <div class="hero">
      <p>Hello</p>
      <p>World</p>
    </div>
    <section>
      <h2>More</h2>
    </section>
  </body>
</html>
"#;

    #[test]
    fn output_has_no_comments_or_blank_text_nodes() {
        let out = assemble_document(TEMPLATE, &[".hero{padding:0}".into()]).expect("assemble");
        let doc = Html::parse_document(&out);

        for node in doc.tree.nodes() {
            match node.value() {
                Node::Comment(c) => panic!("comment survived: {:?}", &**c),
                Node::Text(t) => assert!(
                    !t.trim().is_empty(),
                    "whitespace-only text node in {out}"
                ),
                _ => {}
            }
        }
    }

    #[test]
    fn css_is_inlined_as_amp_custom() {
        let out = assemble_document(TEMPLATE, &[".hero{padding:0}".into()]).expect("assemble");
        assert!(out.contains("<style amp-custom>.hero{padding:0}</style>"));
        assert!(!out.contains("inject:css"));
    }

    #[test]
    fn doctype_and_amp_attribute_survive() {
        let out = assemble_document(TEMPLATE, &[]).expect("assemble");
        assert!(out.to_ascii_lowercase().starts_with("<!doctype html>"));
        assert!(out.contains("⚡"));
    }

    #[test]
    fn boolean_attributes_are_collapsed() {
        let out = minify(r#"<script async="async" src="https://cdn.ampproject.org/v0.js"></script>"#)
            .expect("minify");
        assert!(!out.contains("async=\"async\""));
        assert!(out.contains("async"));
    }

    #[test]
    fn assembles_every_staged_file_into_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ProjectLayout::resolve(dir.path(), &SiteConfig::default());
        fs::write_file(&layout.staging.join("index.html"), TEMPLATE).unwrap();
        fs::write_file(&layout.staging.join("blog/post.html"), TEMPLATE).unwrap();
        fs::write_file(&layout.output_css().join("main.css"), ".hero{margin:0}\n").unwrap();

        let report = assemble_html(&layout).expect("assemble");
        assert_eq!(report.written.len(), 2);

        let post = std::fs::read_to_string(layout.output.join("blog/post.html")).unwrap();
        assert!(post.contains("<style amp-custom>.hero{margin:0}</style>"));
    }

    #[test]
    fn empty_staging_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ProjectLayout::resolve(dir.path(), &SiteConfig::default());
        let report = assemble_html(&layout).expect("assemble");
        assert!(report.written.is_empty());
        assert!(!layout.output.exists());
    }
}
