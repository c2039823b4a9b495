//! Inline span segmentation.
//!
//! Raw inline markdown is split into plain, bold, italic and code runs with a
//! fixed set of patterns. Code spans are matched first and their bytes are
//! masked out, so emphasis markers inside code are never re-interpreted.
//! The emphasis patterns then run independently over the remaining text and
//! may overlap each other. Overlaps are resolved by start offset: the match
//! that starts first wins and any match starting inside it is dropped. Ties
//! at the same offset go to the earlier pattern.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Styling of an inline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Unstyled text.
    Plain,
    /// `**text**` or `__text__`.
    Bold,
    /// `*text*` or `_text_`.
    Italic,
    /// `` `text` ``.
    Code,
}

/// A run of text with one styling kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineSpan {
    /// Text with delimiters removed.
    pub text: String,
    /// Styling kind.
    pub kind: SpanKind,
}

impl InlineSpan {
    /// Create a span.
    pub fn new(text: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    /// Create a plain span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, SpanKind::Plain)
    }
}

// Masked bytes are replaced with NUL; patterns refuse to match across them.
const MASK: u8 = 0;

static CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid code pattern"));

static EMPHASIS: LazyLock<Vec<(Regex, SpanKind)>> = LazyLock::new(|| {
    [
        (r"\*\*([^\x00\n]+?)\*\*", SpanKind::Bold),
        (r"\*([^\x00\n]+?)\*", SpanKind::Italic),
        (r"__([^\x00\n]+?)__", SpanKind::Bold),
        (r"_([^\x00\n]+?)_", SpanKind::Italic),
    ]
    .into_iter()
    .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
    .collect()
});

#[derive(Debug)]
struct Match {
    start: usize,
    end: usize,
    inner_start: usize,
    inner_end: usize,
    kind: SpanKind,
}

impl Match {
    fn from_captures(caps: &regex::Captures<'_>, kind: SpanKind) -> Option<Self> {
        let whole = caps.get(0)?;
        let inner = caps.get(1)?;
        Some(Self {
            start: whole.start(),
            end: whole.end(),
            inner_start: inner.start(),
            inner_end: inner.end(),
            kind,
        })
    }
}

/// Leftmost match of `regex` starting at every char boundary, so a match
/// hidden inside an earlier one of the same pattern is still found.
fn matches_from_every_start(regex: &Regex, haystack: &str, kind: SpanKind) -> Vec<Match> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < haystack.len() {
        let Some(m) = regex
            .captures_at(haystack, pos)
            .and_then(|caps| Match::from_captures(&caps, kind))
        else {
            break;
        };
        let step = haystack[m.start..].chars().next().map_or(1, char::len_utf8);
        pos = m.start + step;
        found.push(m);
    }

    found
}

/// Split raw inline markdown into ordered spans.
///
/// Spans cover the whole input. Empty input yields no spans; input without
/// any markers yields a single plain span equal to the input.
pub fn segment(text: &str) -> Vec<InlineSpan> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Match> = CODE
        .captures_iter(text)
        .filter_map(|caps| Match::from_captures(&caps, SpanKind::Code))
        .collect();

    // Masked bytes are replaced with NUL; emphasis refuses to match across them.
    let mut masked = text.as_bytes().to_vec();
    for m in &matches {
        masked[m.start..m.end].fill(0);
    }
    // Code spans start and end on ASCII backticks, so the mask keeps UTF-8 valid.
    let haystack = String::from_utf8_lossy(&masked);

    for (regex, kind) in EMPHASIS.iter() {
        matches.extend(matches_from_every_start(regex, &haystack, *kind));
    }

    // Stable sort keeps pattern priority for equal offsets.
    matches.sort_by_key(|m| m.start);

    let mut spans = Vec::new();
    let mut processed = 0;

    for m in matches {
        if m.start < processed {
            continue;
        }
        if m.start > processed {
            spans.push(InlineSpan::plain(&text[processed..m.start]));
        }
        spans.push(InlineSpan::new(&text[m.inner_start..m.inner_end], m.kind));
        processed = m.end;
    }

    if processed < text.len() {
        spans.push(InlineSpan::plain(&text[processed..]));
    }

    spans
}

/// Concatenate span texts, dropping styling.
pub fn plain_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}
