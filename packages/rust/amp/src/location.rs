//! Map parsed elements back to line/column positions in the source text.
//!
//! The HTML parser does not keep source positions, so an element is located
//! by finding the n-th `<tag` occurrence in the source. Occurrences inside
//! comments and `<noscript>` are skipped, since the parser keeps those as text.

/// Line/column lookup over one document. Lines are 1-based, columns 0-based.
pub(crate) struct SourceLocator {
    lowered: String,
    line_starts: Vec<usize>,
    opaque: Vec<(usize, usize)>,
}

impl SourceLocator {
    pub(crate) fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let lowered = source.to_ascii_lowercase();
        let mut opaque = ranges(&lowered, "<!--", "-->");
        opaque.extend(ranges(&lowered, "<noscript", "</noscript"));
        Self {
            lowered,
            line_starts,
            opaque,
        }
    }

    /// Position of a byte offset.
    pub(crate) fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line])
    }

    /// Position of the `nth` (0-based) opening tag named `tag`, or `(1, 0)`
    /// when the tag was implied by the parser.
    pub(crate) fn tag_position(&self, tag: &str, nth: usize) -> (usize, usize) {
        let needle = format!("<{tag}");
        let bytes = self.lowered.as_bytes();

        self.lowered
            .match_indices(&needle)
            .filter(|(i, _)| !self.is_opaque(*i))
            .filter(|(i, _)| {
                let after = i + needle.len();
                bytes
                    .get(after)
                    .is_none_or(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
            })
            .nth(nth)
            .map(|(i, _)| self.position(i))
            .unwrap_or((1, 0))
    }

    fn is_opaque(&self, offset: usize) -> bool {
        self.opaque
            .iter()
            .any(|&(start, end)| offset > start && offset < end)
    }
}

/// Byte ranges from each `open` to the following `close` (or end of input).
fn ranges(haystack: &str, open: &str, close: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(start) = haystack[from..].find(open).map(|i| i + from) {
        let body = start + open.len();
        let end = haystack[body..]
            .find(close)
            .map_or(haystack.len(), |i| i + body);
        out.push((start, end));
        from = end;
    }
    out
}
