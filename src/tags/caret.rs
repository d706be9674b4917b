//! Caret-relative text transforms for multi-tag input.
//!
//! Carets are character offsets into the text, not byte offsets. Offsets
//! past the end are clamped to the end.

use std::sync::OnceLock;

use regex::Regex;

/// Trailing token: optional `-`/`~` operators followed by letters and colons.
fn trailing_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([-~]*)?([a-z:]*)$").expect("valid trailing token regex"))
}

/// The tag currently being typed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedQuery {
    /// Leading operator characters, e.g. `-` or `~`.
    pub operator: String,
    /// Lowercased partial tag, possibly empty.
    pub tag_query: String,
}

fn byte_offset(text: &str, caret: usize) -> usize {
    text.char_indices()
        .nth(caret)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Extract the trailing token immediately before the caret.
pub fn parse_query(text: &str, caret: usize) -> ParsedQuery {
    let before = &text[..byte_offset(text, caret)];

    match trailing_token_regex().captures(before) {
        Some(caps) => ParsedQuery {
            operator: caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            tag_query: caps
                .get(2)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
        },
        None => ParsedQuery::default(),
    }
}

/// Replace the trailing token before the caret with `completion`.
///
/// Operators in front of the token are kept, a single space is appended,
/// and the text after the caret is preserved verbatim. Returns the new
/// text and the caret position right after the inserted space.
pub fn insert_suggestion(text: &str, caret: usize, completion: &str) -> (String, usize) {
    let (before, after) = text.split_at(byte_offset(text, caret));

    let mut result = trailing_token_regex().replace(before, "${1}").into_owned();
    result.push_str(completion);
    result.push(' ');

    let new_caret = result.chars().count();
    result.push_str(after);

    (result, new_caret)
}
