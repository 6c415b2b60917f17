//! EU member-state table and the month codes used in Amazon activity periods.

/// Check whether `code` is one of the 27 EU member states (ISO 3166-1 alpha-2).
///
/// Comparison is case-insensitive. Greece is `GR` here; the VAT prefix `EL`
/// is handled by [`vat_prefix_country`].
pub fn is_eu_member(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    EU_MEMBER_STATES.binary_search(&code.as_str()).is_ok()
}

/// All EU member states, sorted for binary search.
pub fn eu_member_states() -> &'static [&'static str] {
    EU_MEMBER_STATES
}

/// Map the two-letter prefix of an EU VAT number to its ISO country code.
///
/// Returns `None` for prefixes that do not belong to a member state.
pub fn vat_prefix_country(vat_number: &str) -> Option<&'static str> {
    let prefix = vat_number.trim().get(..2)?.to_ascii_uppercase();
    if prefix == "EL" {
        return Some("GR");
    }
    EU_MEMBER_STATES
        .binary_search(&prefix.as_str())
        .ok()
        .map(|i| EU_MEMBER_STATES[i])
}

/// Month number (1-12) for a three-letter English month code such as `JAN`.
pub fn month_number(code: &str) -> Option<u32> {
    let code = code.trim().to_ascii_uppercase();
    MONTH_CODES
        .iter()
        .position(|m| *m == code)
        .map(|i| i as u32 + 1)
}

static EU_MEMBER_STATES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK",
];

const MONTH_CODES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members() {
        assert!(is_eu_member("ES"));
        assert!(is_eu_member("de"));
        assert!(is_eu_member(" FR "));
        assert!(!is_eu_member("GB"));
        assert!(!is_eu_member("CH"));
        assert!(!is_eu_member(""));
    }

    #[test]
    fn list_is_sorted() {
        for window in EU_MEMBER_STATES.windows(2) {
            assert!(window[0] < window[1], "{} >= {}", window[0], window[1]);
        }
        assert_eq!(EU_MEMBER_STATES.len(), 27);
    }

    #[test]
    fn vat_prefixes() {
        assert_eq!(vat_prefix_country("DE123456789"), Some("DE"));
        assert_eq!(vat_prefix_country("EL094259216"), Some("GR"));
        assert_eq!(vat_prefix_country("fr12345678901"), Some("FR"));
        assert_eq!(vat_prefix_country("GB123456789"), None);
        assert_eq!(vat_prefix_country("X"), None);
    }

    #[test]
    fn months() {
        assert_eq!(month_number("JAN"), Some(1));
        assert_eq!(month_number("sep"), Some(9));
        assert_eq!(month_number("DEC"), Some(12));
        assert_eq!(month_number("JANUARY"), None);
    }
}
