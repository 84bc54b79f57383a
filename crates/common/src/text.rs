//! Bounded text helpers.
//!
//! Display names are capped in the store schema (`VARCHAR(32)`), so values
//! coming from outside (the identity authority, request bodies) are cut on
//! character boundaries before they are persisted.

/// Maximum length, in characters, of user, group and member display names.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Maximum length, in characters, of a group invite code.
pub const MAX_INVITE_CODE_CHARS: usize = 8;

/// Truncate `value` to at most `max_chars` characters.
///
/// Counts Unicode scalar values, never splitting a multi-byte character.
/// Returns the input unchanged when it is already short enough.
#[must_use]
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value.get(..byte_idx).unwrap_or(value).to_string(),
        None => value.to_string(),
    }
}

/// Returns true when `value` is non-blank and at most `max_chars` characters.
#[must_use]
pub fn is_bounded_non_blank(value: &str, max_chars: usize) -> bool {
    !value.trim().is_empty() && value.chars().count() <= max_chars
}
