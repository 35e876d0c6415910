//! Citation text rewriter
//!
//! Applies a position map to one citation's raw text. The text is tokenized
//! into marker spans and plain text in a single pass, so a span is never
//! processed twice; each marker span is decoded, remapped, and re-encoded
//! with its original wrapper restored.

use crate::codec;
use crate::mapping::{PositionMap, Target};
use crate::snapshot::CitationKind;
use crate::ORPHAN_MARKER;

/// One lexed piece of citation text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Span<'a> {
    /// `[...]` marker; payload is the text between the brackets.
    Bracket(&'a str),

    /// `(...)` marker; payload is the text between the parentheses.
    Paren(&'a str),

    /// Anything outside a marker, emitted verbatim.
    Plain(&'a str),
}

impl<'a> Span<'a> {
    fn inner(self) -> Option<&'a str> {
        match self {
            Span::Bracket(inner) | Span::Paren(inner) => Some(inner),
            Span::Plain(_) => None,
        }
    }

    fn wrap(self, body: &str) -> String {
        match self {
            Span::Bracket(_) => format!("[{}]", body),
            Span::Paren(_) => format!("({})", body),
            Span::Plain(text) => text.to_string(),
        }
    }
}

/// Split raw citation text into marker spans and plain text.
///
/// An opener with no matching closer is plain text to the end of input;
/// markers never nest in the documents this engine handles.
fn tokenize(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let open = rest.chars().next().unwrap_or('\0');

        let close = match open {
            '[' => ']',
            '(' => ')',
            _ => {
                i += open.len_utf8();
                continue;
            }
        };

        match rest[1..].find(close) {
            Some(close_offset) => {
                if plain_start < i {
                    spans.push(Span::Plain(&text[plain_start..i]));
                }

                let inner = &rest[1..1 + close_offset];
                spans.push(match open {
                    '[' => Span::Bracket(inner),
                    _ => Span::Paren(inner),
                });

                i += close_offset + 2;
                plain_start = i;
            }
            None => {
                // Unbalanced opener; the remainder is plain text.
                i = text.len();
            }
        }
    }

    if plain_start < text.len() {
        spans.push(Span::Plain(&text[plain_start..]));
    }

    spans
}

/// Every marker numeral in the text, in reading order. Used by the
/// first-appearance sort, which needs the numbers but not the rewrite.
pub fn marker_numbers(text: &str) -> Vec<u32> {
    tokenize(text)
        .into_iter()
        .filter_map(|span| span.inner().map(codec::parse))
        .flatten()
        .collect()
}

/// Result of rewriting one citation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub changed: bool,
}

/// Rewrite one citation's raw text under a position map.
///
/// Only numeric citations are rewritten; other kinds pass through
/// unchanged. Within a marker span, numerals that map to a live position
/// are remapped and recompressed; numerals whose target was deleted (or
/// that resolve to no current position) are dropped, and a span losing
/// every numeral is replaced by the orphan marker. Spans that decode to no
/// numerals at all are left exactly as written.
pub fn rewrite_citation(raw_text: &str, kind: CitationKind, map: &PositionMap) -> Rewrite {
    if !kind.is_numeric() {
        return Rewrite {
            text: raw_text.to_string(),
            changed: false,
        };
    }

    let mut out = String::with_capacity(raw_text.len());

    for span in tokenize(raw_text) {
        match span.inner() {
            None => out.push_str(&span.wrap("")),
            Some(inner) => {
                let numbers = codec::parse(inner);
                if numbers.is_empty() {
                    // Not a numeric marker ("[see above]", "[orphaned]").
                    out.push_str(&span.wrap(inner));
                    continue;
                }

                let survivors: Vec<u32> = numbers
                    .iter()
                    .filter_map(|&n| match map.lookup(n) {
                        Some(Target::Position(p)) => Some(p),
                        Some(Target::Deleted) | None => None,
                    })
                    .collect();

                // A span the map leaves alone keeps its original notation,
                // spacing included, so an identity pass is a true no-op.
                let untouched = survivors.len() == numbers.len()
                    && survivors.iter().zip(numbers.iter()).all(|(s, n)| s == n);

                if untouched {
                    out.push_str(&span.wrap(inner));
                } else if survivors.is_empty() {
                    out.push_str(&span.wrap(ORPHAN_MARKER));
                } else {
                    out.push_str(&span.wrap(&codec::format(&survivors)));
                }
            }
        }
    }

    let changed = out != raw_text;
    Rewrite { text: out, changed }
}
