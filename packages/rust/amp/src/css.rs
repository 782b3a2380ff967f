//! Checks for the author stylesheet (`<style amp-custom>`).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::ErrorCode;

/// Maximum size of the author stylesheet in bytes.
pub const MAX_CUSTOM_CSS_BYTES: usize = 75_000;

/// At-rules allowed in the author stylesheet, without vendor prefix.
const ALLOWED_AT_RULES: &[&str] = &["font-face", "keyframes", "media", "page", "supports"];

static IMPORTANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([-\w]+)\s*:[^;{}]*?!\s*important").expect("valid regex")
});

static AT_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@(-[a-z]+-)?([a-z][a-z-]*)").expect("valid regex"));

/// A problem found in the author stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CssIssue {
    pub code: ErrorCode,
    pub message: String,
}

/// Check one author stylesheet.
pub(crate) fn check_custom_css(css: &str) -> Vec<CssIssue> {
    let mut issues = Vec::new();

    if css.len() > MAX_CUSTOM_CSS_BYTES {
        issues.push(CssIssue {
            code: ErrorCode::StylesheetTooLong,
            message: format!(
                "The author stylesheet specified in tag 'style amp-custom' is too long - document contains {} bytes whereas the limit is {MAX_CUSTOM_CSS_BYTES} bytes.",
                css.len()
            ),
        });
    }

    let css = strip_literals(css);

    for caps in IMPORTANT_RE.captures_iter(&css) {
        issues.push(CssIssue {
            code: ErrorCode::CssDisallowedImportant,
            message: format!(
                "CSS syntax error in tag 'style amp-custom' - the property '{}' is set to the disallowed value '!important'.",
                &caps[1]
            ),
        });
    }

    let mut seen = BTreeSet::new();
    for caps in AT_RULE_RE.captures_iter(&css) {
        let name = caps[2].to_ascii_lowercase();
        if ALLOWED_AT_RULES.contains(&name.as_str()) {
            continue;
        }
        let full = caps[0].to_ascii_lowercase();
        if seen.insert(full.clone()) {
            issues.push(CssIssue {
                code: ErrorCode::CssInvalidAtRule,
                message: format!(
                    "CSS syntax error in tag 'style amp-custom' - saw invalid at rule '{full}'."
                ),
            });
        }
    }

    issues
}

/// Blank out comments, quoted strings and `url(...)` bodies so only real
/// tokens reach the pattern checks.
fn strip_literals(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut out = String::with_capacity(css.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                Some(css[i + 2..].find("*/").map_or(css.len(), |p| i + 2 + p + 2))
            }
            quote @ (b'"' | b'\'') => Some(string_end(bytes, i + 1, quote)),
            b'(' if i >= 3 && bytes[i - 3..i].eq_ignore_ascii_case(b"url") => {
                Some(url_end(bytes, i + 1))
            }
            _ => None,
        };
        match end {
            Some(end) => {
                out.push_str(&css[start..i]);
                out.push(' ');
                i = end;
                start = end;
            }
            None => i += 1,
        }
    }

    out.push_str(&css[start..]);
    out
}

/// Index just past the closing `quote`, honouring backslash escapes.
fn string_end(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past the `)` closing a `url(` whose body starts at `from`.
fn url_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if let Some(&quote @ (b'"' | b'\'')) = bytes.get(i) {
        i = string_end(bytes, i + 1, quote);
    }
    let i = i.min(bytes.len());
    match bytes[i..].iter().position(|&b| b == b')') {
        Some(p) => i + p + 1,
        None => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(css: &str) -> Vec<ErrorCode> {
        check_custom_css(css).into_iter().map(|i| i.code).collect()
    }

    #[test]
    fn plain_stylesheet_is_clean() {
        let css = "@font-face{font-family:x;src:url(x.woff)}@media (min-width:1px){a{color:red}}\
                   @-webkit-keyframes spin{to{opacity:0}}@supports (display:grid){b{display:grid}}";
        assert!(check_custom_css(css).is_empty());
    }

    #[test]
    fn important_is_reported_per_property() {
        let issues = check_custom_css("a{color:red!important;margin:0 ! important}");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("'color'"));
        assert!(issues[1].message.contains("'margin'"));
    }

    #[test]
    fn disallowed_at_rules_are_reported_once() {
        let issues = check_custom_css("@import url(a.css);@import url(b.css);@-ms-viewport{width:device-width}");
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("'@import'"));
        assert!(issues[1].message.contains("'@-ms-viewport'"));
    }

    #[test]
    fn comments_are_ignored() {
        assert!(check_custom_css("/* @import x; !important */a{color:red}").is_empty());
    }

    #[test]
    fn urls_and_strings_are_not_tokens() {
        let css = ".logo{background:url(img/logo@retina.png)}\
                   .m::after{content:\"me@example !important\"}\
                   .q{background:url( 'a@2x.png' )}.e{content:'it\\'s @x'}";
        assert!(check_custom_css(css).is_empty());
    }

    #[test]
    fn rules_after_a_literal_are_still_checked() {
        let issues = check_custom_css("a{content:\"@x\"}@import url(b@2x.css);b{color:red!important}");
        assert_eq!(
            issues.into_iter().map(|i| i.code).collect::<Vec<_>>(),
            vec![ErrorCode::CssDisallowedImportant, ErrorCode::CssInvalidAtRule]
        );
    }

    #[test]
    fn oversized_stylesheet_is_reported() {
        let css = format!("a{{content:\"{}\"}}", "x".repeat(MAX_CUSTOM_CSS_BYTES));
        assert_eq!(codes(&css), vec![ErrorCode::StylesheetTooLong]);
    }
}
