//! Span anchoring over document text.
//!
//! # Responsibility
//! - Validate half-open `[start, end)` ranges against document text.
//! - Slice the selected text and bounded before/after context windows.
//!
//! # Invariants
//! - Offsets count Unicode scalar values (`char`), never bytes. Slicing maps
//!   char offsets to byte offsets, so multi-byte text never splits a char.
//! - All functions are pure and never panic on out-of-range input.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of chars kept on each side of a span.
pub const DEFAULT_CONTEXT_WINDOW: usize = 50;

/// Range rejected by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRange {
    pub start: usize,
    pub end: usize,
    /// Text length in chars.
    pub text_len: usize,
}

impl Display for InvalidRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid span [{}, {}) for text of length {}",
            self.start, self.end, self.text_len
        )
    }
}

impl Error for InvalidRange {}

/// Text derived from one span: selection plus context windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanText {
    pub selected_text: String,
    pub context_before: String,
    pub context_after: String,
}

/// Length of `text` in chars.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Returns whether `[start, end)` is a valid span of `text`.
pub fn validate(text: &str, start: usize, end: usize) -> bool {
    start <= end && end <= char_len(text)
}

/// Returns `text[start..end]` in char offsets.
pub fn extract(text: &str, start: usize, end: usize) -> Result<&str, InvalidRange> {
    let invalid = || InvalidRange {
        start,
        end,
        text_len: char_len(text),
    };
    if start > end {
        return Err(invalid());
    }
    let from = byte_offset(text, start).ok_or_else(invalid)?;
    let to = byte_offset(text, end).ok_or_else(invalid)?;
    Ok(&text[from..to])
}

/// Returns up to `window` chars ending at `pos`.
///
/// Empty when `pos == 0` or `text` is empty. `pos` past the end is clamped.
pub fn context_before(text: &str, pos: usize, window: usize) -> &str {
    if pos == 0 || text.is_empty() {
        return "";
    }
    let len = char_len(text);
    let pos = pos.min(len);
    let from = pos.saturating_sub(window);
    slice_chars(text, from, pos)
}

/// Returns up to `window` chars starting at `pos`.
///
/// Empty when `pos >= char_len(text)` or `text` is empty.
pub fn context_after(text: &str, pos: usize, window: usize) -> &str {
    let len = char_len(text);
    if text.is_empty() || pos >= len {
        return "";
    }
    let to = pos.saturating_add(window).min(len);
    slice_chars(text, pos, to)
}

/// Validates the span and derives every text field from it at once.
pub fn derive(text: &str, start: usize, end: usize, window: usize) -> Result<SpanText, InvalidRange> {
    let selected = extract(text, start, end)?;
    Ok(SpanText {
        selected_text: selected.to_string(),
        context_before: context_before(text, start, window).to_string(),
        context_after: context_after(text, end, window).to_string(),
    })
}

fn slice_chars(text: &str, from: usize, to: usize) -> &str {
    match (byte_offset(text, from), byte_offset(text, to)) {
        (Some(from), Some(to)) if from <= to => &text[from..to],
        _ => "",
    }
}

/// Maps a char offset to a byte offset. `char_len(text)` maps to `text.len()`.
fn byte_offset(text: &str, char_pos: usize) -> Option<usize> {
    text.char_indices()
        .map(|(index, _)| index)
        .chain(std::iter::once(text.len()))
        .nth(char_pos)
}

#[cfg(test)]
mod tests {
    use super::{context_after, context_before, derive, extract, validate, InvalidRange};

    const HELLO: &str = "Hello, World!";

    #[test]
    fn validate_accepts_bounds_and_rejects_inverted_or_overlong() {
        assert!(validate(HELLO, 0, 0));
        assert!(validate(HELLO, 0, 13));
        assert!(validate(HELLO, 13, 13));
        assert!(!validate(HELLO, 10, 5));
        assert!(!validate(HELLO, 0, 14));
        assert!(!validate("", 0, 1));
    }

    #[test]
    fn extract_returns_world_for_hello_world() {
        assert_eq!(extract(HELLO, 7, 12), Ok("World"));
        assert_eq!(extract(HELLO, 13, 13), Ok(""));
    }

    #[test]
    fn extract_reports_range_and_length() {
        let err = extract(HELLO, 10, 5).unwrap_err();
        assert_eq!(
            err,
            InvalidRange {
                start: 10,
                end: 5,
                text_len: 13
            }
        );
        assert!(extract(HELLO, 2, 20).is_err());
    }

    #[test]
    fn context_windows_around_world() {
        assert_eq!(context_before(HELLO, 7, 3), "o, ");
        assert_eq!(context_after(HELLO, 12, 3), "!");
        assert_eq!(context_before(HELLO, 2, 50), "He");
        assert_eq!(context_after(HELLO, 0, 5), "Hello");
    }

    #[test]
    fn context_windows_are_empty_at_edges() {
        assert_eq!(context_before(HELLO, 0, 10), "");
        assert_eq!(context_after(HELLO, 13, 10), "");
        assert_eq!(context_before("", 3, 10), "");
        assert_eq!(context_after("", 0, 10), "");
    }

    #[test]
    fn derive_fills_all_fields() {
        let span = derive(HELLO, 7, 12, 3).unwrap();
        assert_eq!(span.selected_text, "World");
        assert_eq!(span.context_before, "o, ");
        assert_eq!(span.context_after, "!");
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let text = "naïve café ☕ au lait";
        assert_eq!(extract(text, 6, 10), Ok("café"));
        assert_eq!(extract(text, 11, 12), Ok("☕"));
        assert_eq!(context_before(text, 11, 5), "café ");
        assert_eq!(context_after(text, 12, 3), " au");
        assert!(validate(text, 0, 20));
        assert!(!validate(text, 0, 21));
    }
}
