//! IRC formatting code handling.
//!
//! XDCC bots decorate their pack lists heavily with bold and color codes.
//! Classification runs on text with the control bytes `0x02..=0x0F` removed.
//! Color digits following `^C` are left in place; the classification
//! patterns are written to tolerate them.

use std::borrow::Cow;

const CONTROL_RANGE: std::ops::RangeInclusive<char> = '\x02'..='\x0F';

/// Returns true if the text carries any control byte in `0x02..=0x0F`.
#[inline]
pub fn is_formatted(text: &str) -> bool {
    text.chars().any(|c| CONTROL_RANGE.contains(&c))
}

/// Strip the control bytes `0x02..=0x0F` from `text`.
///
/// Returns `Cow::Borrowed` if nothing had to be removed.
pub fn strip_control(text: &str) -> Cow<'_, str> {
    if !is_formatted(text) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|c| !CONTROL_RANGE.contains(c)).collect())
}
