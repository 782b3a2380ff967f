//! Document-level AMP rules.
//!
//! Each `check_*` method inspects the parsed document and records
//! [`ValidationError`]s on the [`Checker`].

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::css::check_custom_css;
use crate::location::SourceLocator;
use crate::{ErrorCode, ValidationError};

/// AMP runtime script URLs.
const RUNTIME_SRCS: &[&str] = &[
    "https://cdn.ampproject.org/v0.js",
    "https://cdn.ampproject.org/lts/v0.js",
];

const EXTENSION_HOST: &str = "cdn.ampproject.org";

/// `amp-*` elements implemented by the runtime itself.
const BUILTIN_ELEMENTS: &[&str] = &["amp-img", "amp-pixel", "amp-layout"];

/// Tags allowed only as a `<noscript>` fallback, with their AMP replacement.
const NOSCRIPT_ONLY: &[(&str, &str)] = &[
    ("img", "amp-img"),
    ("video", "amp-video"),
    ("audio", "amp-audio"),
    ("iframe", "amp-iframe"),
];

const DISALLOWED_TAGS: &[&str] = &["frame", "frameset", "object", "param", "applet", "embed"];

/// Hosts allowed in `<link rel="stylesheet">`.
const FONT_PROVIDERS: &[&str] = &[
    "cloud.typography.com",
    "fast.fonts.net",
    "fonts.googleapis.com",
    "maxcdn.bootstrapcdn.com",
    "p.typekit.net",
    "use.fontawesome.com",
    "use.typekit.net",
];

/// Attributes holding a URL.
const URL_ATTRS: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

const SPEC_REQUIRED_MARKUP: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#required-markup";
const SPEC_HTML_TAGS: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#html-tags";
const SPEC_STYLESHEETS: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#stylesheets";
const SPEC_ATTRIBUTES: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#html-attributes";
const SPEC_CUSTOM_FONTS: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#custom-fonts";
const SPEC_EXTENSIONS: &str =
    "https://amp.dev/documentation/guides-and-tutorials/learn/spec/amphtml#extended-components";
const SPEC_AMP_IMG: &str = "https://amp.dev/documentation/components/amp-img";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static ANY: LazyLock<Selector> = LazyLock::new(|| selector("*"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static HEAD_CHARSET: LazyLock<Selector> = LazyLock::new(|| selector("head meta[charset]"));
static HEAD_VIEWPORT: LazyLock<Selector> =
    LazyLock::new(|| selector("head meta[name=viewport]"));
static HEAD_LINK: LazyLock<Selector> = LazyLock::new(|| selector("head link[rel]"));
static HEAD_BOILERPLATE: LazyLock<Selector> =
    LazyLock::new(|| selector("head style[amp-boilerplate]"));
static HEAD_NOSCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("head noscript"));
static BOILERPLATE: LazyLock<Selector> = LazyLock::new(|| selector("style[amp-boilerplate]"));

fn has_ancestor(el: &ElementRef<'_>, name: &str) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == name)
}

fn parent_name<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    el.parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.value().name())
}

/// An element together with its index among same-named elements.
struct Located<'a> {
    el: ElementRef<'a>,
    nth: usize,
}

pub(crate) struct Checker<'a> {
    source: &'a str,
    doc: &'a Html,
    locator: SourceLocator,
    elements: Vec<Located<'a>>,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(source: &'a str, doc: &'a Html) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let elements = doc
            .select(&ANY)
            .map(|el| {
                let count = counts.entry(el.value().name()).or_default();
                let nth = *count;
                *count += 1;
                Located { el, nth }
            })
            .collect();

        Self {
            source,
            doc,
            locator: SourceLocator::new(source),
            elements,
            errors: Vec::new(),
        }
    }

    /// Run every rule and return the collected errors in document order.
    pub(crate) fn run(mut self) -> Vec<ValidationError> {
        self.check_doctype();
        self.check_html_attribute();
        self.check_mandatory_head();
        self.check_scripts();
        self.check_extensions();
        self.check_disallowed_tags();
        self.check_styles();
        self.check_attributes();
        self.check_stylesheet_links();
        self.check_amp_img();

        self.errors.sort_by_key(|e| (e.line, e.col));
        self.errors
    }

    fn report(&mut self, at: (usize, usize), code: ErrorCode, message: String, url: &'static str) {
        self.errors.push(ValidationError {
            line: at.0,
            col: at.1,
            code,
            message,
            spec_url: url,
        });
    }

    fn report_missing(&mut self, what: &str) {
        self.report(
            (1, 0),
            ErrorCode::MandatoryTagMissing,
            format!("The mandatory tag '{what}' is missing or incorrect."),
            SPEC_REQUIRED_MARKUP,
        );
    }

    fn position(&self, located: &Located<'_>) -> (usize, usize) {
        self.locator
            .tag_position(located.el.value().name(), located.nth)
    }

    fn check_doctype(&mut self) {
        let head = self.source.trim_start_matches('\u{feff}').trim_start();
        let ok = head
            .get(..14)
            .is_some_and(|p| p.eq_ignore_ascii_case("<!doctype html"));
        if !ok {
            self.report_missing("html doctype");
        }
    }

    fn check_html_attribute(&mut self) {
        let root = self.doc.root_element();
        let has_amp = root.value().attr("⚡").is_some() || root.value().attr("amp").is_some();
        if !has_amp {
            let at = self.locator.tag_position("html", 0);
            self.report(
                at,
                ErrorCode::MandatoryAttrMissing,
                "The mandatory attribute '⚡' is missing in tag 'html'.".into(),
                SPEC_REQUIRED_MARKUP,
            );
        }
    }

    fn check_mandatory_head(&mut self) {
        let charset = self
            .doc
            .select(&HEAD_CHARSET)
            .any(|m| {
                m.value()
                    .attr("charset")
                    .is_some_and(|c| c.eq_ignore_ascii_case("utf-8"))
            });
        if !charset {
            self.report_missing("meta charset=utf-8");
        }

        if self.doc.select(&HEAD_VIEWPORT).next().is_none() {
            self.report_missing("meta name=viewport");
        }

        let canonical = self.doc.select(&HEAD_LINK).any(|l| {
            l.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
        });
        if !canonical {
            self.report_missing("link rel=canonical");
        }

        let runtime = self
            .doc
            .select(&SCRIPT)
            .any(|s| is_runtime_script(&s));
        if !runtime {
            self.report_missing("amphtml engine v0.js script");
        }

        let boilerplate = self
            .doc
            .select(&HEAD_BOILERPLATE)
            .any(|s| !has_ancestor(&s, "noscript"));
        if !boilerplate {
            self.report_missing("head > style[amp-boilerplate]");
        }

        // With scripting enabled the parser keeps `<noscript>` in head as raw text.
        let fallback = self.doc.select(&HEAD_NOSCRIPT).any(|n| {
            n.select(&BOILERPLATE).next().is_some()
                || n.text().any(|t| t.contains("amp-boilerplate"))
        });
        if !fallback {
            self.report_missing("noscript > style[amp-boilerplate]");
        }
    }

    fn check_scripts(&mut self) {
        let mut found = Vec::new();
        for located in self.elements.iter().filter(|l| l.el.value().name() == "script") {
            let el = &located.el;
            if is_runtime_script(el) || is_json_script(el) {
                continue;
            }

            let at = self.position(located);
            if let Some(name) = extension_name(el) {
                match el.value().attr("src") {
                    Some(src) if is_extension_src(src, name) => {
                        if el.value().attr("async").is_none() {
                            found.push((
                                at,
                                ErrorCode::MandatoryAttrMissing,
                                format!("The mandatory attribute 'async' is missing in tag '{name} extension .js script'."),
                                SPEC_EXTENSIONS,
                            ));
                        }
                    }
                    src => found.push((
                        at,
                        ErrorCode::InvalidAttrValue,
                        format!(
                            "The attribute 'src' in tag '{name} extension .js script' is set to the invalid value '{}'.",
                            src.unwrap_or_default()
                        ),
                        SPEC_EXTENSIONS,
                    )),
                }
                continue;
            }

            found.push((
                at,
                ErrorCode::DisallowedTag,
                "The tag 'script' is disallowed except in specific forms.".into(),
                SPEC_HTML_TAGS,
            ));
        }

        for (at, code, message, url) in found {
            self.report(at, code, message, url);
        }
    }

    fn check_extensions(&mut self) {
        let declared: BTreeSet<&str> = self
            .doc
            .select(&SCRIPT)
            .filter_map(|s| extension_name(&s))
            .collect();

        let mut missing: Vec<((usize, usize), String)> = Vec::new();
        let mut reported = BTreeSet::new();

        for located in &self.elements {
            let el = located.el.value();
            let required = match el.name() {
                "template" if el.attr("type") == Some("amp-mustache") => "amp-mustache",
                name if name.starts_with("amp-") && !BUILTIN_ELEMENTS.contains(&name) => name,
                _ => continue,
            };
            if declared.contains(required) || !reported.insert(required) {
                continue;
            }
            missing.push((self.position(located), required.to_string()));
        }

        for (at, name) in missing {
            self.report(
                at,
                ErrorCode::MissingRequiredExtension,
                format!("The tag '{name}' requires including the '{name}' extension JavaScript."),
                SPEC_EXTENSIONS,
            );
        }
    }

    fn check_disallowed_tags(&mut self) {
        let mut found = Vec::new();
        for located in &self.elements {
            let name = located.el.value().name();

            if let Some((_, replacement)) = NOSCRIPT_ONLY.iter().find(|(tag, _)| *tag == name) {
                if !has_ancestor(&located.el, "noscript") {
                    found.push((
                        self.position(located),
                        ErrorCode::MandatoryTagAncestor,
                        format!("The tag '{name}' may only appear as a descendant of tag 'noscript'. Did you mean '{replacement}'?"),
                    ));
                }
            } else if DISALLOWED_TAGS.contains(&name) {
                found.push((
                    self.position(located),
                    ErrorCode::DisallowedTag,
                    format!("The tag '{name}' is disallowed."),
                ));
            }
        }

        for (at, code, message) in found {
            self.report(at, code, message, SPEC_HTML_TAGS);
        }
    }

    fn check_styles(&mut self) {
        let mut found = Vec::new();
        let mut custom_seen = false;

        for located in self.elements.iter().filter(|l| l.el.value().name() == "style") {
            let el = located.el.value();
            let at = self.position(located);

            if el.attr("amp-boilerplate").is_some() {
                continue;
            }
            if el.attr("amp-custom").is_none() {
                found.push((
                    at,
                    ErrorCode::DisallowedTag,
                    "The tag 'style' is disallowed except in specific forms.".to_string(),
                ));
                continue;
            }

            if custom_seen {
                found.push((
                    at,
                    ErrorCode::DuplicateUniqueTag,
                    "The tag 'style amp-custom' appears more than once in the document.".to_string(),
                ));
            }
            custom_seen = true;

            let parent = parent_name(&located.el).unwrap_or_default();
            if parent != "head" {
                found.push((
                    at,
                    ErrorCode::WrongParentTag,
                    format!("The parent tag of tag 'style amp-custom' is '{parent}', but it can only be 'head'."),
                ));
            }

            let css: String = located.el.text().collect();
            for issue in check_custom_css(&css) {
                found.push((at, issue.code, issue.message));
            }
        }

        for (at, code, message) in found {
            self.report(at, code, message, SPEC_STYLESHEETS);
        }
    }

    fn check_attributes(&mut self) {
        let mut found = Vec::new();
        for located in &self.elements {
            let el = located.el.value();
            let tag = el.name();

            for (attr, value) in el.attrs() {
                if attr.len() > 2 && attr.starts_with("on") {
                    found.push((
                        self.position(located),
                        ErrorCode::DisallowedAttr,
                        format!("The attribute '{attr}' may not appear in tag '{tag}'."),
                    ));
                } else if URL_ATTRS.contains(&attr) && is_javascript_url(value) {
                    found.push((
                        self.position(located),
                        ErrorCode::InvalidUrlProtocol,
                        format!("Invalid URL protocol 'javascript:' for attribute '{attr}' in tag '{tag}'."),
                    ));
                }
            }
        }

        for (at, code, message) in found {
            self.report(at, code, message, SPEC_ATTRIBUTES);
        }
    }

    fn check_stylesheet_links(&mut self) {
        let mut found = Vec::new();
        for located in self.elements.iter().filter(|l| l.el.value().name() == "link") {
            let el = located.el.value();
            let is_stylesheet = el
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
            if !is_stylesheet {
                continue;
            }

            let href = el.attr("href").unwrap_or_default();
            if !is_font_provider(href) {
                found.push((
                    self.position(located),
                    format!("The attribute 'href' in tag 'link rel=stylesheet for fonts' is set to the invalid value '{href}'."),
                ));
            }
        }

        for (at, message) in found {
            self.report(at, ErrorCode::InvalidAttrValue, message, SPEC_CUSTOM_FONTS);
        }
    }

    fn check_amp_img(&mut self) {
        let missing: Vec<_> = self
            .elements
            .iter()
            .filter(|l| l.el.value().name() == "amp-img")
            .filter(|l| l.el.value().attr("src").is_none() && l.el.value().attr("srcset").is_none())
            .map(|l| self.position(l))
            .collect();

        for at in missing {
            self.report(
                at,
                ErrorCode::MandatoryAttrMissing,
                "The mandatory attribute 'src' is missing in tag 'amp-img'.".into(),
                SPEC_AMP_IMG,
            );
        }
    }
}

fn is_runtime_script(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    value.attr("async").is_some()
        && value.attr("custom-element").is_none()
        && value.attr("custom-template").is_none()
        && value.attr("src").is_some_and(|src| RUNTIME_SRCS.contains(&src))
}

fn is_json_script(el: &ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("src").is_some() {
        return false;
    }
    match value.attr("type").map(str::to_ascii_lowercase).as_deref() {
        Some("application/ld+json") => true,
        Some("application/json") => parent_name(el).is_some_and(|p| p.starts_with("amp-")),
        _ => false,
    }
}

fn extension_name<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    let value = el.value();
    value
        .attr("custom-element")
        .or_else(|| value.attr("custom-template"))
}

/// `https://cdn.ampproject.org/v0/<name>-<version>.js`, optionally under `/lts/`.
fn is_extension_src(src: &str, name: &str) -> bool {
    let Ok(url) = Url::parse(src) else {
        return false;
    };
    if url.scheme() != "https" || url.host_str() != Some(EXTENSION_HOST) {
        return false;
    }

    let path = url.path();
    let path = path.strip_prefix("/lts").unwrap_or(path);
    let Some(file) = path
        .strip_prefix("/v0/")
        .and_then(|f| f.strip_prefix(name))
        .and_then(|f| f.strip_prefix('-'))
        .and_then(|f| f.strip_suffix(".js"))
    else {
        return false;
    };

    file == "latest"
        || (!file.is_empty() && file.split('.').all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())))
}

fn is_javascript_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(11)
        .collect();
    compact.eq_ignore_ascii_case("javascript:")
}

fn is_font_provider(href: &str) -> bool {
    Url::parse(href).is_ok_and(|url| {
        url.scheme() == "https"
            && url
                .host_str()
                .is_some_and(|host| FONT_PROVIDERS.contains(&host))
    })
}
