//! Field decoding and numeric/date coercion.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

/// Decode a raw field as UTF-8, or as ISO-8859-1 when `utf8` is false.
pub(crate) fn decode(bytes: &[u8], utf8: bool) -> Cow<'_, str> {
    if utf8 {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return Cow::Borrowed(s);
        }
    }
    // ISO-8859-1 maps every byte to the code point of the same value.
    Cow::Owned(bytes.iter().map(|&b| b as char).collect())
}

/// Parse a monetary amount as written in the export.
///
/// Blank values are zero. Accepts a decimal comma (`12,50`) and thousands
/// separators in either convention (`1.234,56`, `1,234.56`). Values that still
/// do not parse are logged and treated as zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let normalized = normalize_separators(&cleaned);
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .unwrap_or_else(|_| {
            debug!(value = raw, "unparseable amount, using 0");
            Decimal::ZERO
        })
}

fn normalize_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');
    match (last_comma, last_dot) {
        // Both present: whichever comes last is the decimal separator.
        (Some(c), Some(d)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) if s.matches(',').count() == 1 => s.replace(',', "."),
        (Some(_), None) => s.replace(',', ""),
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    }
}

/// Parse a VAT rate and express it in percent.
///
/// Amazon writes the rate either as a fraction (`0.21`) or a percentage
/// (`21`); anything in `(0, 1]` is taken as a fraction.
pub fn parse_rate_percent(raw: &str) -> Decimal {
    let rate = parse_amount(raw);
    if rate > Decimal::ZERO && rate <= Decimal::ONE {
        rate * Decimal::ONE_HUNDRED
    } else {
        rate
    }
}

/// Parse a transaction date (`dd-mm-yyyy`, `yyyy-mm-dd`, `dd/mm/yyyy` or `dd.mm.yyyy`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts() {
        assert_eq!(parse_amount(""), dec!(0));
        assert_eq!(parse_amount("   "), dec!(0));
        assert_eq!(parse_amount("100"), dec!(100));
        assert_eq!(parse_amount("12,50"), dec!(12.50));
        assert_eq!(parse_amount("-3.99"), dec!(-3.99));
        assert_eq!(parse_amount("1.234,56"), dec!(1234.56));
        assert_eq!(parse_amount("1,234.56"), dec!(1234.56));
        assert_eq!(parse_amount("1.234.567"), dec!(1234567));
        assert_eq!(parse_amount("1 234,5"), dec!(1234.5));
        assert_eq!(parse_amount("1e2"), dec!(100));
        assert_eq!(parse_amount("abc"), dec!(0));
    }

    #[test]
    fn rates() {
        assert_eq!(parse_rate_percent("0.21"), dec!(21.00));
        assert_eq!(parse_rate_percent("21"), dec!(21));
        assert_eq!(parse_rate_percent("0,1"), dec!(10.0));
        assert_eq!(parse_rate_percent(""), dec!(0));
    }

    #[test]
    fn dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date("15-01-2024"), expected);
        assert_eq!(parse_date("2024-01-15"), expected);
        assert_eq!(parse_date("15/01/2024"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn latin1_fallback() {
        assert_eq!(decode("Envíos".as_bytes(), true), "Envíos");
        assert_eq!(decode(&[b'E', b'n', b'v', 0xED, b'o', b's'], false), "Envíos");
    }
}
