//! Plate text canonicalization.
//!
//! OCR confuses a handful of glyph pairs. Rather than swapping both ways
//! (which makes the result depend on how many times it runs), every pair is
//! folded in one fixed direction, always onto the digit:
//!
//! | read as | folded to |
//! |---------|-----------|
//! | `O`     | `0`       |
//! | `I`     | `1`       |
//! | `Z`     | `2`       |
//! | `B`     | `8`       |
//! | `С` (Cyrillic, U+0421) | `C` (Latin) |
//!
//! No fold target is also a fold source, so `normalize` is idempotent.
//! Anything matched against canonical text (country templates, watch-list
//! regexes) must accept `0`, `1`, `2` and `8` wherever a letter may be
//! `O`, `I`, `Z` or `B`.

/// Fold a single upper-case character to its canonical look-alike.
pub fn fold_lookalike(ch: char) -> char {
    match ch {
        'O' => '0',
        'I' => '1',
        'Z' => '2',
        'B' => '8',
        '\u{0421}' => 'C',
        other => other,
    }
}

/// Whether a character is dropped from plate text.
pub(crate) fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == '-'
}

/// Upper-case, separator-free text with no look-alike folding applied.
pub(crate) fn compact(text: &str) -> String {
    text.trim()
        .to_uppercase()
        .chars()
        .filter(|c| !is_separator(*c))
        .collect()
}

/// Canonical form of a plate string: trimmed, upper-cased, spaces and
/// hyphens removed, look-alikes folded.
pub fn normalize(text: &str) -> String {
    compact(text).chars().map(fold_lookalike).collect()
}
