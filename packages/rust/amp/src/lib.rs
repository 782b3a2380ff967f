//! AMP HTML validation for built documents.
//!
//! Checks a practical subset of the AMP HTML rules: required markup, allowed
//! scripts and extensions, disallowed tags and attributes, and the author
//! stylesheet limits. Results are reported per file as PASS/FAIL plus one
//! located message per error.

mod css;
mod location;
mod rules;

use std::fmt;
use std::path::{Path, PathBuf};

use scraper::Html;
use tracing::{debug, info, instrument, warn};

use sitekiln_shared::{Result, fs};

pub use css::MAX_CUSTOM_CSS_BYTES;

/// Rule that a document violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MandatoryTagMissing,
    MandatoryAttrMissing,
    MandatoryTagAncestor,
    DisallowedTag,
    DisallowedAttr,
    InvalidAttrValue,
    InvalidUrlProtocol,
    MissingRequiredExtension,
    DuplicateUniqueTag,
    WrongParentTag,
    StylesheetTooLong,
    CssDisallowedImportant,
    CssInvalidAtRule,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MandatoryTagMissing => "MANDATORY_TAG_MISSING",
            Self::MandatoryAttrMissing => "MANDATORY_ATTR_MISSING",
            Self::MandatoryTagAncestor => "MANDATORY_TAG_ANCESTOR_WITH_HINT",
            Self::DisallowedTag => "DISALLOWED_TAG",
            Self::DisallowedAttr => "DISALLOWED_ATTR",
            Self::InvalidAttrValue => "INVALID_ATTR_VALUE",
            Self::InvalidUrlProtocol => "INVALID_URL_PROTOCOL",
            Self::MissingRequiredExtension => "MISSING_REQUIRED_EXTENSION",
            Self::DuplicateUniqueTag => "DUPLICATE_UNIQUE_TAG",
            Self::WrongParentTag => "WRONG_PARENT_TAG",
            Self::StylesheetTooLong => "STYLESHEET_TOO_LONG",
            Self::CssDisallowedImportant => "CSS_SYNTAX_DISALLOWED_IMPORTANT",
            Self::CssInvalidAtRule => "CSS_SYNTAX_INVALID_AT_RULE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation, located in the document source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub col: usize,
    pub code: ErrorCode,
    pub message: String,
    /// Documentation for the violated rule.
    pub spec_url: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// Validation outcome for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub status: Status,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        let status = if errors.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        };
        Self { status, errors }
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Validation outcome for one file on disk.
#[derive(Debug, Clone)]
pub struct FileValidation {
    pub path: PathBuf,
    pub result: ValidationResult,
}

/// Validate one document's markup.
pub fn validate_document(source: &str) -> ValidationResult {
    let doc = Html::parse_document(source);
    let errors = rules::Checker::new(source, &doc).run();
    ValidationResult::from_errors(errors)
}

/// Validate every `*.html` file under `dir`, sorted by path.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn validate_tree(dir: &Path) -> Result<Vec<FileValidation>> {
    let files = fs::collect_files(dir, &["html"])?;
    if files.is_empty() {
        warn!("no html files to validate");
    }

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let source = fs::read_to_string(&path)?;
        let result = validate_document(&source);
        debug!(path = %path.display(), status = %result.status, errors = result.errors.len(), "validated");
        results.push(FileValidation { path, result });
    }

    let failed = results.iter().filter(|r| !r.result.passed()).count();
    info!(title = "amp", files = results.len(), failed, "validation complete");
    Ok(results)
}

/// `path: PASS|FAIL`, then `path:line:col message (see url)` per error.
pub fn format_result(path: &str, result: &ValidationResult) -> String {
    let mut out = format!("{path}: {}", result.status);
    for e in &result.errors {
        out.push_str(&format!(
            "\n{path}:{}:{} {} (see {})",
            e.line, e.col, e.message, e.spec_url
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = include_str!("../../../../fixtures/amp/valid.html");
    const INVALID_SCRIPT: &str = include_str!("../../../../fixtures/amp/invalid-script.html");
    const KITCHEN_SINK: &str = include_str!("../../../../fixtures/amp/disallowed.html");

    fn codes(result: &ValidationResult) -> Vec<ErrorCode> {
        result.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn valid_document_passes() {
        let result = validate_document(VALID);
        assert!(result.passed(), "unexpected errors: {:#?}", result.errors);
    }

    #[test]
    fn minified_valid_document_passes() {
        let minified = VALID
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("");
        let result = validate_document(&minified);
        assert!(result.passed(), "unexpected errors: {:#?}", result.errors);
    }

    #[test]
    fn inline_script_fails_with_location() {
        let result = validate_document(INVALID_SCRIPT);
        assert_eq!(result.status, Status::Fail);

        let script = result
            .errors
            .iter()
            .find(|e| e.code == ErrorCode::DisallowedTag)
            .expect("script error");
        assert!(script.message.contains("'script'"));
        assert_eq!((script.line, script.col), (16, 4));
    }

    #[test]
    fn empty_document_reports_required_markup() {
        let result = validate_document("");
        let codes = codes(&result);
        assert!(codes.contains(&ErrorCode::MandatoryTagMissing));
        assert!(codes.contains(&ErrorCode::MandatoryAttrMissing));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.message.contains("amphtml engine v0.js script"))
        );
    }

    #[test]
    fn disallowed_markup_is_reported() {
        let result = validate_document(KITCHEN_SINK);
        let messages: Vec<&str> = result.errors.iter().map(|e| e.message.as_str()).collect();
        let has = |needle: &str| messages.iter().any(|m| m.contains(needle));

        assert!(has("The tag 'img' may only appear as a descendant of tag 'noscript'"));
        assert!(has("The tag 'embed' is disallowed."));
        assert!(has("The attribute 'onclick' may not appear in tag 'button'."));
        assert!(has("Invalid URL protocol 'javascript:' for attribute 'href' in tag 'a'."));
        assert!(has("The tag 'amp-carousel' requires including the 'amp-carousel' extension"));
        assert!(has("The mandatory attribute 'src' is missing in tag 'amp-img'."));
        assert!(has("'link rel=stylesheet for fonts' is set to the invalid value 'css/site.css'"));
        assert!(has("the property 'color' is set to the disallowed value '!important'"));
        assert!(has("saw invalid at rule '@import'"));
        assert!(has("The tag 'style' is disallowed except in specific forms."));
        assert!(!has("amp-img' requires"));
    }

    #[test]
    fn second_custom_stylesheet_is_a_duplicate() {
        let doc = VALID.replace(
            "</head>",
            "<style amp-custom>b{margin:0}</style></head>",
        );
        let result = validate_document(&doc);
        assert_eq!(codes(&result), vec![ErrorCode::DuplicateUniqueTag]);
    }

    #[test]
    fn amp_attribute_alias_is_accepted() {
        let doc = VALID.replace("<html ⚡ lang=\"en\">", "<html amp lang=\"en\">");
        assert!(validate_document(&doc).passed());
    }

    #[test]
    fn format_lists_each_error() {
        let result = validate_document(INVALID_SCRIPT);
        let text = format_result("dist/index.html", &result);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("dist/index.html: FAIL"));
        assert!(lines.all(|l| l.starts_with("dist/index.html:") && l.ends_with(')')));

        let ok = format_result("dist/ok.html", &validate_document(VALID));
        assert_eq!(ok, "dist/ok.html: PASS");
    }

    #[test]
    fn validates_a_tree_in_path_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write_file(&dir.path().join("b.html"), INVALID_SCRIPT).unwrap();
        fs::write_file(&dir.path().join("a.html"), VALID).unwrap();

        let results = validate_tree(dir.path()).expect("validate");
        assert_eq!(results.len(), 2);
        assert!(results[0].path.ends_with("a.html"));
        assert!(results[0].result.passed());
        assert!(!results[1].result.passed());
    }
}
