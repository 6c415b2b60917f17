//! Modelo 369: quarterly OSS / IOSS VAT return.
//!
//! Tagged fixed-width document. A header tag carries year and quarter, then
//! the pages of one regime follow, each exactly [`PAGE_LENGTH`] characters
//! including its opening and closing tags.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::layout::{pad_right, pad_to, to_cents, zero_pad};
use crate::core::{
    AggregatedBucket, CategoryAggregate, DeclarantConfig, DeclarationPeriod, ModeloError,
    PeriodInfo, ValidationError, is_eu_member, standard_vat_rate,
};

/// Length of every regime page.
pub const PAGE_LENGTH: usize = 2100;

/// Most country entries a main page holds.
pub const MAX_ENTRIES_PER_PAGE: usize = 28;

const HEADER_NIF_COLUMN: usize = 84;
const HEADER_LENGTH: usize = 204;
const PAGE_PREFIX_COLUMN: usize = 41;
const ENTRY_LENGTH: usize = 51;

/// Scheme a Modelo 369 is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Union scheme (OSS distance sales).
    Moss,
    /// Import scheme (IOSS).
    Impo,
}

impl Regime {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Moss => "MOSS",
            Self::Impo => "IMPO",
        }
    }

    fn pages(&self) -> &'static [&'static str] {
        match self {
            Self::Moss => &["T36904", "T36905", "T36906", "T36907", "T36908", "T36909"],
            Self::Impo => &["T36910", "T36911", "T36912"],
        }
    }
}

/// Pick the regime: IMPO whenever IOSS has data, else MOSS when OSS has data.
pub fn select_regime(oss: &CategoryAggregate, ioss: &CategoryAggregate) -> Option<Regime> {
    if !ioss.is_empty() {
        Some(Regime::Impo)
    } else if !oss.is_empty() {
        Some(Regime::Moss)
    } else {
        None
    }
}

/// Options for [`Form369Generator`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form369Options {
    /// File as a complementary return.
    pub complementary: bool,
}

/// Modelo 369 generator.
#[derive(Debug, Clone, Default)]
pub struct Form369Generator {
    options: Form369Options,
}

impl Form369Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Form369Options) -> Self {
        Self { options }
    }

    /// Check the data a return would be built from. Returns every violation.
    pub fn validate_data(
        &self,
        oss: &CategoryAggregate,
        ioss: &CategoryAggregate,
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let Some(regime) = select_regime(oss, ioss) else {
            return errors;
        };

        if let DeclarationPeriod::Month(m) = period.period {
            errors.push(ValidationError::with_rule(
                "period",
                format!("Modelo 369 is filed quarterly only, got month {m}"),
                "369-PERIOD",
            ));
        }
        if regime == Regime::Impo && config.ioss().is_none() {
            errors.push(ValidationError::with_rule(
                "declarant.ioss_number",
                "IMPO returns require an IOSS number",
                "369-IOSS",
            ));
        }

        let declared = declared_buckets(regime, oss, ioss);
        let prefix = regime.code().to_ascii_lowercase();
        for bucket in &declared.buckets {
            if bucket.record_count == 0 {
                continue;
            }
            let country = bucket.key.to_string();
            let field = format!("{prefix}.{country}");
            if !is_eu_member(&country) {
                errors.push(ValidationError::with_rule(
                    &field,
                    format!("destination '{country}' is not an EU member state"),
                    "369-COUNTRY",
                ));
            }
            match bucket.vat_rate {
                Some(rate) if rate > Decimal::ZERO => {}
                _ => errors.push(ValidationError::with_rule(
                    &field,
                    "missing destination VAT rate",
                    "369-RATE",
                )),
            }
            if bucket.base < Decimal::ZERO || bucket.vat < Decimal::ZERO {
                errors.push(ValidationError::with_rule(
                    &field,
                    "negative base or VAT amount",
                    "369-NEGATIVE",
                ));
            } else if zero_pad(to_cents(bucket.base), 10).is_none()
                || zero_pad(to_cents(bucket.vat), 8).is_none()
            {
                errors.push(ValidationError::with_rule(
                    &field,
                    "amount exceeds field width",
                    "369-WIDTH",
                ));
            }
        }

        let total = &declared.total;
        if total.base >= Decimal::ZERO
            && total.vat >= Decimal::ZERO
            && (zero_pad(to_cents(total.base), 10).is_none()
                || zero_pad(to_cents(total.vat), 8).is_none())
        {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.TOTAL"),
                "total exceeds field width",
                "369-WIDTH",
            ));
        }

        let entries = declared.buckets.iter().filter(|b| b.record_count > 0).count();
        if entries > MAX_ENTRIES_PER_PAGE {
            errors.push(ValidationError::with_rule(
                prefix,
                format!("{entries} destination countries exceed the {MAX_ENTRIES_PER_PAGE} entries of one page"),
                "369-ENTRIES",
            ));
        }
        errors
    }

    /// Validate and render the return. Encode with
    /// [`encode_latin1`](super::encode_latin1) before writing.
    pub fn generate(
        &self,
        oss: &CategoryAggregate,
        ioss: &CategoryAggregate,
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        let regime = select_regime(oss, ioss).ok_or_else(|| {
            ModeloError::FormGeneration("No OSS or IOSS data for Form 369".into())
        })?;

        let errors = self.validate_data(oss, ioss, period, config);
        if !errors.is_empty() {
            return Err(ModeloError::from_validation("Form 369 validation failed", &errors));
        }
        if regime == Regime::Impo && !oss.is_empty() {
            warn!(
                oss_buckets = oss.buckets.len(),
                "IOSS data present, OSS sales are not declared in this IMPO return"
            );
        }

        let DeclarationPeriod::Quarter(quarter) = period.period else {
            return Err(ModeloError::FormGeneration("Form 369 needs a quarterly period".into()));
        };
        let tag = format!("T369{}{}T0000", period.year, quarter);

        let mut content = self.header(&tag, config);
        let declared = declared_buckets(regime, oss, ioss);
        let pages = regime.pages();
        for (i, page) in pages.iter().enumerate() {
            if i == 0 {
                content.push_str(&self.main_page(page, regime, declared, period, config)?);
            } else {
                content.push_str(&empty_page(page));
            }
        }
        content.push_str(&format!("</{tag}>"));

        info!(
            regime = regime.code(),
            entries = declared.buckets.len(),
            bytes = content.len(),
            "Form 369 generated"
        );
        Ok(content)
    }

    fn header(&self, tag: &str, config: &DeclarantConfig) -> String {
        let mut header = format!("<{tag}>");
        pad_to(&mut header, HEADER_NIF_COLUMN);
        header.push_str(&pad_right(config.nif.trim(), 9));
        pad_to(&mut header, HEADER_LENGTH);
        header.push_str("<T36900></T36900>");
        header
    }

    fn main_page(
        &self,
        page: &str,
        regime: Regime,
        declared: &CategoryAggregate,
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        let mut content = format!("<{page}>{} DO", regime.code());
        pad_to(&mut content, PAGE_PREFIX_COLUMN);
        content.push(if self.options.complementary { 'C' } else { ' ' });
        content.push(' ');
        content.push_str("ES");
        content.push_str(config.nif.trim());
        match regime {
            Regime::Moss => content.push_str(&" ".repeat(6)),
            Regime::Impo => {
                content.push_str("   ");
                content.push_str(&pad_right(config.ioss().unwrap_or_default(), 12));
            }
        }
        content.push_str(&pad_right(config.company_name.trim(), 80));
        content.push_str(&format!("{}T {}", period.year, period_number(period)));
        content.push_str(&" ".repeat(15));

        let active = declared
            .buckets
            .iter()
            .any(|b| b.base > Decimal::ZERO || b.vat > Decimal::ZERO);
        content.push(if active { '0' } else { '1' });

        for bucket in declared.buckets.iter().filter(|b| b.record_count > 0) {
            content.push_str(&country_entry(bucket)?);
        }
        content.push_str(&total_entry(&declared.total)?);

        let closing = format!("</{page}>");
        pad_to(&mut content, PAGE_LENGTH - closing.len());
        content.push_str(&closing);
        if content.chars().count() != PAGE_LENGTH {
            return Err(ModeloError::FormGeneration(format!(
                "Form 369 page {page} overflows {PAGE_LENGTH} characters"
            )));
        }
        Ok(content)
    }
}

fn declared_buckets<'a>(
    regime: Regime,
    oss: &'a CategoryAggregate,
    ioss: &'a CategoryAggregate,
) -> &'a CategoryAggregate {
    match regime {
        Regime::Moss => oss,
        Regime::Impo => ioss,
    }
}

fn period_number(period: &PeriodInfo) -> u8 {
    match period.period {
        DeclarationPeriod::Quarter(n) | DeclarationPeriod::Month(n) => n,
    }
}

fn empty_page(page: &str) -> String {
    let mut content = format!("<{page}>");
    let closing = format!("</{page}>");
    pad_to(&mut content, PAGE_LENGTH - closing.len());
    content.push_str(&closing);
    content
}

/// `CC RRRRX` padded to 20, base cents (10), 13 blanks, VAT cents (8).
fn country_entry(bucket: &AggregatedBucket) -> Result<String, ModeloError> {
    let country = bucket.key.to_string();
    let rate = bucket.vat_rate.unwrap_or_default();
    let rate_digits = zero_pad(to_cents(rate), 4).ok_or_else(|| {
        ModeloError::FormGeneration(format!("VAT rate {rate} of {country} does not fit 4 digits"))
    })?;
    let kind = if standard_vat_rate(&country) == Some(rate) { 'S' } else { 'R' };
    let label = format!("{country:>2} {rate_digits}{kind}");
    amounts_entry(&label, bucket)
}

fn total_entry(total: &AggregatedBucket) -> Result<String, ModeloError> {
    amounts_entry("TOTAL", total)
}

fn amounts_entry(label: &str, bucket: &AggregatedBucket) -> Result<String, ModeloError> {
    let overflow = || {
        ModeloError::FormGeneration(format!("Form 369 amounts for {label} do not fit their fields"))
    };
    let base = zero_pad(to_cents(bucket.base), 10).ok_or_else(overflow)?;
    let vat = zero_pad(to_cents(bucket.vat), 8).ok_or_else(overflow)?;
    let entry = format!("{}{base}{}{vat}", pad_right(label, 20), " ".repeat(13));
    debug_assert_eq!(entry.len(), ENTRY_LENGTH);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AggregationKey, FiscalCategory};
    use rust_decimal_macros::dec;

    fn bucket(country: &str, base: Decimal, vat: Decimal, rate: Decimal) -> AggregatedBucket {
        let mut b = AggregatedBucket::new(AggregationKey::new([country]));
        b.base = base;
        b.vat = vat;
        b.total = base + vat;
        b.record_count = 1;
        b.vat_rate = Some(rate);
        b
    }

    #[test]
    fn entry_layout() {
        let entry = country_entry(&bucket("DE", dec!(100), dec!(19), dec!(19))).unwrap();
        assert_eq!(entry.len(), ENTRY_LENGTH);
        assert_eq!(&entry[..8], "DE 1900S");
        assert_eq!(&entry[20..30], "0000010000");
        assert_eq!(&entry[30..43], " ".repeat(13));
        assert_eq!(&entry[43..], "00001900");
    }

    #[test]
    fn reduced_rate_is_flagged() {
        let entry = country_entry(&bucket("FR", dec!(100), dec!(5.5), dec!(5.5))).unwrap();
        assert_eq!(&entry[..8], "FR 0550R");
    }

    #[test]
    fn empty_page_length() {
        let page = empty_page("T36905");
        assert_eq!(page.len(), PAGE_LENGTH);
        assert!(page.starts_with("<T36905>"));
        assert!(page.ends_with("</T36905>"));
    }

    #[test]
    fn regime_selection() {
        let empty = CategoryAggregate {
            category: FiscalCategory::Oss,
            buckets: vec![],
            total: AggregatedBucket::new(AggregationKey::total()),
        };
        let mut with_data = empty.clone();
        with_data.total.record_count = 1;

        assert_eq!(select_regime(&empty, &empty), None);
        assert_eq!(select_regime(&with_data, &empty), Some(Regime::Moss));
        assert_eq!(select_regime(&with_data, &with_data), Some(Regime::Impo));
        assert_eq!(select_regime(&empty, &with_data), Some(Regime::Impo));
    }
}
