//! CSS post-processing: unused-rule pruning, AMP fixups, prefixing, minification.

use lightningcss::rules::CssRule;
use lightningcss::selector::Selector;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use parcel_sourcemap::SourceMap;
use tracing::{debug, warn};

use sitekiln_shared::{Result, SiteKilnError};

use crate::unused::HtmlCorpus;

/// Viewport rule AMP rejects. Stripped from the printed output as a final guard.
pub const AMP_DISALLOWED_VIEWPORT: &str = "@-ms-viewport{width:device-width}";

/// Output of processing a single compiled stylesheet.
#[derive(Debug, Clone)]
pub struct ProcessedCss {
    /// Minified, prefixed, AMP-compatible CSS (without the source map comment).
    pub code: String,
    /// Source map JSON for `code`.
    pub map: String,
    /// Number of selectors removed as unused.
    pub removed_selectors: usize,
}

/// Run the post-compile chain over `css`.
///
/// `filename` is recorded as the source in the emitted map.
pub fn process(
    css: &str,
    filename: &str,
    browsers: Browsers,
    corpus: &mut HtmlCorpus,
) -> Result<ProcessedCss> {
    let css_error = |e: &dyn std::fmt::Display| SiteKilnError::Css(format!("{filename}: {e}"));

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| css_error(&e))?;

    let removed_selectors = prune_rules(&mut sheet.rules.0, corpus);
    debug!(filename, removed_selectors, "unused selectors removed");

    sheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..MinifyOptions::default()
        })
        .map_err(|e| css_error(&e))?;

    let mut source_map = SourceMap::new("/");
    let source_index = source_map.add_source(filename);
    source_map
        .set_source_content(source_index as usize, css)
        .map_err(|e| SiteKilnError::Css(format!("{filename}: source map: {e:?}")))?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets: Targets::from(browsers),
            source_map: Some(&mut source_map),
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(&e))?;

    let map = source_map
        .to_json(None)
        .map_err(|e| SiteKilnError::Css(format!("{filename}: source map: {e:?}")))?;

    Ok(ProcessedCss {
        code: printed.code.replace(AMP_DISALLOWED_VIEWPORT, ""),
        map,
        removed_selectors,
    })
}

/// Walk a rule list: drop unused selectors, empty blocks and viewport rules,
/// and demote `!important` declarations to normal ones.
fn prune_rules(rules: &mut Vec<CssRule<'_>>, corpus: &mut HtmlCorpus) -> usize {
    let mut removed = 0;

    rules.retain_mut(|rule| match rule {
        CssRule::Style(style) => {
            let before = style.selectors.0.len();
            style
                .selectors
                .0
                .retain(|selector| selector_is_used(selector, corpus));
            removed += before - style.selectors.0.len();

            let declarations = &mut style.declarations;
            declarations
                .declarations
                .append(&mut declarations.important_declarations);

            !style.selectors.0.is_empty()
        }
        CssRule::Media(media) => {
            removed += prune_rules(&mut media.rules.0, corpus);
            !media.rules.0.is_empty()
        }
        CssRule::Supports(supports) => {
            removed += prune_rules(&mut supports.rules.0, corpus);
            !supports.rules.0.is_empty()
        }
        CssRule::Viewport(_) => false,
        _ => true,
    });

    removed
}

fn selector_is_used(selector: &Selector<'_>, corpus: &mut HtmlCorpus) -> bool {
    match selector.to_css_string(PrinterOptions::default()) {
        Ok(text) => corpus.is_used(&text),
        Err(e) => {
            warn!(error = %e, "could not print selector, keeping it");
            true
        }
    }
}
