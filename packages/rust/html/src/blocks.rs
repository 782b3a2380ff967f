//! Comment-delimited blocks in HTML templates.
//!
//! - `<!-- build:<type>[(<alt>)] [<target>] --> … <!-- endbuild -->` collapses a
//!   group of asset references into a single reference to `<target>`.
//! - `<!-- inject:css --> … <!-- endinject -->` receives the built stylesheets
//!   as inline `<style amp-custom>` elements.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Replace every build block with a single reference to its target.
///
/// Only references are rewritten; the referenced assets are left untouched.
/// Blocks of an unknown type keep their inner markup.
pub(crate) fn resolve_build_blocks(html: &str) -> String {
    static BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?s)<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+(\S+?))?\s*-->(.*?)<!--\s*endbuild\s*-->",
        )
        .expect("valid regex")
    });

    BUILD_RE
        .replace_all(html, |caps: &Captures| {
            let kind = &caps[1];
            let target = caps.get(3).map(|m| m.as_str());
            let inner = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

            match (kind, target) {
                ("css", Some(target)) => format!(r#"<link rel="stylesheet" href="{target}">"#),
                ("js", Some(target)) => format!(r#"<script src="{target}"></script>"#),
                ("remove", _) => String::new(),
                _ => inner.to_string(),
            }
        })
        .into_owned()
}

/// Fill every `inject:css` region with one `<style amp-custom>` per stylesheet.
///
/// The marker comments are kept; minification removes them later.
pub(crate) fn inject_css(html: &str, stylesheets: &[String]) -> String {
    static INJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)(<!--\s*inject:css\s*-->)(.*?)(<!--\s*endinject\s*-->)")
            .expect("valid regex")
    });

    let styles: Vec<String> = stylesheets
        .iter()
        .map(|css| format!("<style amp-custom>{css}</style>"))
        .collect();
    let body = styles.join("\n");

    INJECT_RE
        .replace_all(html, |caps: &Captures| {
            format!("{}\n{body}\n{}", &caps[1], &caps[3])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_block_collapses_to_one_link() {
        let html = r#"<head>
<!-- build:css css/main.css -->
<link rel="stylesheet" href="css/a.css">
<link rel="stylesheet" href="css/b.css">
<!-- endbuild -->
</head>"#;
        let out = resolve_build_blocks(html);
        assert!(out.contains(r#"<link rel="stylesheet" href="css/main.css">"#));
        assert!(!out.contains("css/a.css"));
        assert!(!out.contains("build:css"));
    }

    #[test]
    fn js_block_and_alternate_search_path() {
        let html = "<!-- build:js(.tmp) js/app.js --><script src=\"a.js\"></script><!-- endbuild -->";
        let out = resolve_build_blocks(html);
        assert_eq!(out, r#"<script src="js/app.js"></script>"#);
    }

    #[test]
    fn remove_block_disappears() {
        let html = "<p>a</p><!-- build:remove --><script src=\"dev.js\"></script><!-- endbuild --><p>b</p>";
        assert_eq!(resolve_build_blocks(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn unknown_block_keeps_inner_markup() {
        let html = "<!-- build:svg sprite.svg --><i>keep</i><!-- endbuild -->";
        assert_eq!(resolve_build_blocks(html), "<i>keep</i>");
    }

    #[test]
    fn inject_inlines_each_stylesheet() {
        let html = "<head><!-- inject:css --><!-- endinject --></head>";
        let out = inject_css(html, &["a{color:red}".into(), "b{margin:0}".into()]);
        assert!(out.contains("<style amp-custom>a{color:red}</style>"));
        assert!(out.contains("<style amp-custom>b{margin:0}</style>"));
        assert!(out.contains("<!-- inject:css -->"));
    }

    #[test]
    fn inject_replaces_previous_content() {
        let html = "<!-- inject:css --><style amp-custom>old</style><!-- endinject -->";
        let out = inject_css(html, &["new{}".into()]);
        assert!(!out.contains("old"));
        assert!(out.contains("new{}"));
    }

    #[test]
    fn inject_does_not_expand_dollar_signs() {
        let html = "<!-- inject:css --><!-- endinject -->";
        let out = inject_css(html, &["a::after{content:\"$1\"}".into()]);
        assert!(out.contains("content:\"$1\""));
    }

    #[test]
    fn no_markers_no_change() {
        let html = "<head></head>";
        assert_eq!(inject_css(html, &["a{}".into()]), html);
    }
}
