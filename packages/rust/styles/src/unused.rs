//! Unused-style removal: drop selectors that match nothing in the staged HTML.
//!
//! Selectors are tested statically, so dynamic pseudo-classes (`:hover`,
//! `:focus`, …) and pseudo-elements (`::before`, …) are stripped before
//! matching. Anything the HTML matcher cannot parse is treated as used.

use std::collections::HashMap;
use std::path::PathBuf;

use scraper::{Html, Selector};
use tracing::debug;

use sitekiln_shared::{Result, fs};

/// Pseudo-classes that depend only on document structure or attributes.
const STATIC_PSEUDO_CLASSES: &[&str] = &[
    "root",
    "empty",
    "first-child",
    "last-child",
    "only-child",
    "first-of-type",
    "last-of-type",
    "only-of-type",
    "nth-child",
    "nth-last-child",
    "nth-of-type",
    "nth-last-of-type",
    "not",
    "is",
    "where",
    "has",
    "checked",
    "disabled",
    "enabled",
];

/// Pseudo-elements that may be written with a single colon.
const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["before", "after", "first-line", "first-letter"];

/// The set of HTML documents stylesheets are checked against.
pub struct HtmlCorpus {
    documents: Vec<Html>,
    cache: HashMap<String, bool>,
}

impl HtmlCorpus {
    /// Parse every HTML file in `paths`.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            sources.push(fs::read_to_string(path)?);
        }
        Ok(Self::from_sources(sources))
    }

    /// Parse HTML documents from in-memory sources.
    pub fn from_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            documents: sources
                .into_iter()
                .map(|s| Html::parse_document(s.as_ref()))
                .collect(),
            cache: HashMap::new(),
        }
    }

    /// Number of documents in the corpus.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether `selector` matches at least one element of any document.
    pub fn is_used(&mut self, selector: &str) -> bool {
        if let Some(&hit) = self.cache.get(selector) {
            return hit;
        }

        let testable = strip_dynamic_pseudos(selector);
        let used = match Selector::parse(&testable) {
            Ok(parsed) => self
                .documents
                .iter()
                .any(|doc| doc.select(&parsed).next().is_some()),
            Err(e) => {
                debug!(selector, error = %e, "selector not testable, keeping");
                true
            }
        };

        self.cache.insert(selector.to_string(), used);
        used
    }
}

/// Remove pseudo-classes and pseudo-elements that cannot be evaluated against
/// a static document. A compound left empty becomes `*`.
pub(crate) fn strip_dynamic_pseudos(selector: &str) -> String {
    let chars: Vec<char> = selector.chars().collect();
    let mut out = String::with_capacity(selector.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '[' => {
                let end = find_closing(&chars, i, '[', ']');
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' => {
                let is_element = chars.get(i + 1) == Some(&':');
                let name_start = if is_element { i + 2 } else { i + 1 };
                let mut j = name_start;
                while j < chars.len() && is_ident_char(chars[j]) {
                    j += 1;
                }
                let name = chars[name_start..j]
                    .iter()
                    .collect::<String>()
                    .to_ascii_lowercase();

                let mut argument = None;
                if chars.get(j) == Some(&'(') {
                    let end = find_closing(&chars, j, '(', ')');
                    let inner_end = end.saturating_sub(1).max(j + 1);
                    argument = Some(chars[j + 1..inner_end].iter().collect::<String>());
                    j = end;
                }

                let keep = !is_element
                    && !LEGACY_PSEUDO_ELEMENTS.contains(&name.as_str())
                    && STATIC_PSEUDO_CLASSES.contains(&name.as_str());

                match (keep, argument) {
                    (true, None) => {
                        out.push(':');
                        out.push_str(&name);
                    }
                    (true, Some(arg)) => {
                        let inner = strip_dynamic_pseudos(&arg);
                        // Stripping inside a negation would narrow what it excludes.
                        if name == "not" && inner != arg {
                            push_universal_if_empty(&mut out);
                        } else {
                            out.push(':');
                            out.push_str(&name);
                            out.push('(');
                            out.push_str(&inner);
                            out.push(')');
                        }
                    }
                    (false, _) => push_universal_if_empty(&mut out),
                }
                i = j;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        "*".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Insert `*` if the current compound selector has nothing in it yet.
fn push_universal_if_empty(out: &mut String) {
    let compound_empty = match out.chars().last() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',' | '('),
    };
    if compound_empty {
        out.push('*');
    }
}

/// Index one past the delimiter closing the one at `open_at`, honouring
/// nesting and quoted strings. Returns `chars.len()` when unbalanced.
fn find_closing(chars: &[char], open_at: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = open_at;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == open {
                    depth += 1;
                } else if c == close {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
            }
        }
        i += 1;
    }

    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dynamic_pseudo_classes() {
        assert_eq!(strip_dynamic_pseudos(".btn:hover"), ".btn");
        assert_eq!(strip_dynamic_pseudos("a:focus > span"), "a > span");
        assert_eq!(strip_dynamic_pseudos(":hover"), "*");
        assert_eq!(strip_dynamic_pseudos("nav :focus-within"), "nav *");
    }

    #[test]
    fn strips_pseudo_elements() {
        assert_eq!(strip_dynamic_pseudos(".icon::before"), ".icon");
        assert_eq!(strip_dynamic_pseudos(".icon:after"), ".icon");
        assert_eq!(strip_dynamic_pseudos("::selection"), "*");
        assert_eq!(strip_dynamic_pseudos("input::-webkit-input-placeholder"), "input");
    }

    #[test]
    fn keeps_structural_pseudo_classes() {
        assert_eq!(strip_dynamic_pseudos("li:first-child"), "li:first-child");
        assert_eq!(strip_dynamic_pseudos("tr:nth-child(2n+1)"), "tr:nth-child(2n+1)");
        assert_eq!(strip_dynamic_pseudos("p:not(.lead)"), "p:not(.lead)");
    }

    #[test]
    fn negation_of_dynamic_state_is_dropped() {
        assert_eq!(strip_dynamic_pseudos("a:not(:hover)"), "a");
    }

    #[test]
    fn attribute_values_are_untouched() {
        assert_eq!(
            strip_dynamic_pseudos("a[href^=\"http:\"]:hover"),
            "a[href^=\"http:\"]"
        );
    }

    #[test]
    fn corpus_matches_against_all_documents() {
        let mut corpus = HtmlCorpus::from_sources([
            "<html><body><div class=\"hero\"></div></body></html>",
            "<html><body><ul><li class=\"item\">x</li></ul></body></html>",
        ]);
        assert_eq!(corpus.len(), 2);
        assert!(corpus.is_used(".hero"));
        assert!(corpus.is_used("ul > li.item:hover"));
        assert!(corpus.is_used(".hero::after"));
        assert!(!corpus.is_used(".sidebar"));
        assert!(!corpus.is_used("ol li"));
    }

    #[test]
    fn untestable_selectors_are_kept() {
        let mut corpus = HtmlCorpus::from_sources(["<div></div>"]);
        assert!(corpus.is_used("span >"));
    }
}
