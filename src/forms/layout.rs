//! Fixed-width field helpers and ISO-8859-1 output encoding.

use rust_decimal::Decimal;

use crate::core::round_amount;

/// Left-align `s` in a field of `width` characters, truncating if longer.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

/// Right-align a non-negative integer in a zero-filled field.
///
/// Returns `None` when the value is negative or needs more than `width` digits.
pub(crate) fn zero_pad(value: i128, width: usize) -> Option<String> {
    if value < 0 {
        return None;
    }
    let s = format!("{value:0width$}");
    (s.len() == width).then_some(s)
}

/// Pad `s` with spaces up to column `column` (0-based length).
pub(crate) fn pad_to(s: &mut String, column: usize) {
    let len = s.chars().count();
    if len < column {
        s.extend(std::iter::repeat_n(' ', column - len));
    }
}

/// Amount in integer cents, rounded half away from zero.
pub fn to_cents(amount: Decimal) -> i128 {
    let mut rounded = round_amount(amount);
    rounded.rescale(2);
    rounded.mantissa()
}

/// Normalize a company or person name for AEAT records: uppercase, accents
/// folded, anything but letters, digits and single spaces removed.
pub fn clean_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .flat_map(char::to_uppercase)
        .map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    }
}

/// Encode text as ISO-8859-1. Characters outside Latin-1 become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
