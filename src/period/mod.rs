//! Declaration period derived from the export's `ACTIVITY_PERIOD` values.

use chrono::{Datelike, Local, NaiveDate};
use tracing::warn;

use crate::core::{DeclarationPeriod, PeriodInfo, month_number};

/// Derives the [`PeriodInfo`] a run declares.
///
/// The first observed activity period decides. Quarterly (`2024Q1`) and
/// monthly (`2024-JAN`, also `2024-01`) labels are recognized; anything else
/// falls back to the first quarter of the fallback year.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodExtractor {
    fallback_year: Option<i32>,
}

impl PeriodExtractor {
    /// Extractor falling back to the current calendar year.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `year` instead of the current year when no period is recognized.
    pub fn with_fallback_year(mut self, year: i32) -> Self {
        self.fallback_year = Some(year);
        self
    }

    pub fn extract<S: AsRef<str>>(&self, activity_periods: &[S]) -> PeriodInfo {
        if let Some(info) = activity_periods
            .first()
            .and_then(|first| parse_period(first.as_ref()))
        {
            return info;
        }
        let year = self.fallback_year.unwrap_or_else(|| Local::now().year());
        warn!(
            periods = ?activity_periods.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            year,
            "no recognizable activity period, declaring first quarter"
        );
        PeriodInfo::quarterly(year, 1)
    }
}

/// Parse one `ACTIVITY_PERIOD` value.
///
/// ```
/// use modelo::period::parse_period;
/// use modelo::core::PeriodInfo;
///
/// assert_eq!(parse_period("2024Q2"), Some(PeriodInfo::quarterly(2024, 2)));
/// assert_eq!(parse_period("2024-MAR"), Some(PeriodInfo::monthly(2024, 3)));
/// assert_eq!(parse_period("last year"), None);
/// ```
pub fn parse_period(raw: &str) -> Option<PeriodInfo> {
    let raw = raw.trim().to_ascii_uppercase();
    let year_part = raw.get(..4)?;
    if !year_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;
    let rest = raw[4..].strip_prefix('-').unwrap_or(&raw[4..]);

    if let Some(q) = rest.strip_prefix('Q') {
        let quarter: u8 = q.parse().ok()?;
        return (1..=4)
            .contains(&quarter)
            .then(|| PeriodInfo::quarterly(year, quarter));
    }
    if let Some(month) = month_number(rest) {
        return Some(PeriodInfo::monthly(year, month as u8));
    }
    if rest.len() == 2 {
        let month: u8 = rest.parse().ok()?;
        return (1..=12)
            .contains(&month)
            .then(|| PeriodInfo::monthly(year, month));
    }
    None
}

/// First calendar day of an `ACTIVITY_PERIOD`, if it parses.
pub fn period_start(raw: &str) -> Option<NaiveDate> {
    let info = parse_period(raw)?;
    let month = match info.period {
        DeclarationPeriod::Quarter(q) => u32::from(q - 1) * 3 + 1,
        DeclarationPeriod::Month(m) => u32::from(m),
    };
    NaiveDate::from_ymd_opt(info.year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterly() {
        assert_eq!(parse_period("2024Q1"), Some(PeriodInfo::quarterly(2024, 1)));
        assert_eq!(parse_period("2023-q4"), Some(PeriodInfo::quarterly(2023, 4)));
        assert_eq!(parse_period("2024Q5"), None);
    }

    #[test]
    fn monthly() {
        assert_eq!(parse_period("2024-JAN"), Some(PeriodInfo::monthly(2024, 1)));
        assert_eq!(parse_period("2024-dec"), Some(PeriodInfo::monthly(2024, 12)));
        assert_eq!(parse_period("2024-01"), Some(PeriodInfo::monthly(2024, 1)));
        assert_eq!(parse_period("2024-13"), None);
        assert_eq!(parse_period("2024-XYZ"), None);
    }

    #[test]
    fn garbage() {
        assert_eq!(parse_period(""), None);
        assert_eq!(parse_period("Q1"), None);
        assert_eq!(parse_period("ABCD-JAN"), None);
    }

    #[test]
    fn first_period_wins() {
        let extractor = PeriodExtractor::new();
        let info = extractor.extract(&["2024-FEB", "2024-JAN", "2024-MAR"]);
        assert_eq!(info, PeriodInfo::monthly(2024, 2));
        assert_eq!(info.label(), "M 2");
    }

    #[test]
    fn fallback() {
        let extractor = PeriodExtractor::new().with_fallback_year(2022);
        let empty: [&str; 0] = [];
        assert_eq!(extractor.extract(&empty), PeriodInfo::quarterly(2022, 1));
        assert_eq!(extractor.extract(&["whenever"]).label(), "T 1");
    }

    #[test]
    fn starts() {
        assert_eq!(period_start("2024Q3"), NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(period_start("2024-FEB"), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(period_start("n/a"), None);
    }
}
