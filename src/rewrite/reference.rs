//! Tokenizing textual files into candidate path references.

use std::sync::OnceLock;

use regex::bytes::Regex;

/// How a reference is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Starts with `/`: resolved from the tree root.
    Absolute,
    /// Resolved against the referencing file's directory; scripts may also
    /// mean the tree root (see [`crate::rewrite::resolve_reference`]).
    Relative,
}

/// A candidate path reference inside a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub text: &'a str,
    pub kind: ReferenceKind,
}

impl Reference<'_> {
    /// The final `/`-separated segment as written.
    pub fn last_segment(&self) -> &str {
        self.text.rsplit('/').next().unwrap_or(self.text)
    }

    /// Spelled with a leading `./` or `../`.
    pub fn is_dot_relative(&self) -> bool {
        self.text.starts_with("./") || self.text.starts_with("../")
    }
}

fn reference_regex() -> &'static Regex {
    static REFERENCE_RE: OnceLock<Regex> = OnceLock::new();
    REFERENCE_RE.get_or_init(|| {
        Regex::new(r"(?:[A-Za-z0-9._~%@+/-]|[^\x00-\x7F])+").expect("reference regex should compile")
    })
}

/// Yields every path-like run in `content` that could name an asset.
///
/// Runs end at quotes, whitespace, parentheses, `?`, `#` and other
/// punctuation, so query strings and fragments are left outside the
/// reference. Trailing dots (sentence punctuation) are trimmed. Runs that
/// start with `//` or directly follow a `:` belong to external URLs or
/// `data:` URIs and are skipped.
pub fn references(content: &[u8]) -> impl Iterator<Item = Reference<'_>> {
    reference_regex().find_iter(content).filter_map(move |m| {
        let start = m.start();
        if start > 0 && content[start - 1] == b':' {
            return None;
        }

        let text = std::str::from_utf8(m.as_bytes()).ok()?;
        if text.starts_with("//") {
            return None;
        }

        let text = text.trim_end_matches('.');
        // Needs at least one character besides slashes and dots to name a file
        if !text.bytes().any(|b| b != b'/' && b != b'.') {
            return None;
        }

        let kind = if text.starts_with('/') {
            ReferenceKind::Absolute
        } else {
            ReferenceKind::Relative
        };

        Some(Reference {
            start,
            end: start + text.len(),
            text,
            kind,
        })
    })
}
