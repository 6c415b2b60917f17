//! Modelo 349: recapitulative statement of intra-community operations.
//!
//! Fixed-width text, 500 characters per record, CRLF line endings. One
//! type-2 record per buyer plus one type-1 declarant summary record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::layout::{clean_name, pad_right, to_cents, zero_pad};
use crate::core::{
    CategoryAggregate, DeclarantConfig, ModeloError, PeriodInfo, ValidationError,
    vat_prefix_country,
};

/// Length of every Modelo 349 record.
pub const RECORD_LENGTH: usize = 500;

/// Operation key for exempt intra-community supplies of goods.
pub const KEY_INTRA_COMMUNITY_SUPPLY: char = 'E';

/// One buyer line of Modelo 349.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form349Record {
    /// Departure country of the goods.
    pub country: String,
    pub buyer_name: String,
    /// Buyer's EU VAT number, country prefix included.
    pub buyer_vat: String,
    /// Taxable base in EUR.
    pub base: Decimal,
    pub operation_key: char,
}

impl Form349Record {
    /// Country of the buyer, from the VAT number prefix.
    pub fn buyer_country(&self) -> Option<&'static str> {
        vat_prefix_country(&self.buyer_vat)
    }
}

/// Turn intra-community buckets into Form 349 records.
///
/// Buckets with a non-positive base, a key that is not
/// `country|buyerName|buyerVat`, or an empty buyer name or VAT number are
/// dropped. Fails when nothing survives.
pub fn form349_records(intracom: &CategoryAggregate) -> Result<Vec<Form349Record>, ModeloError> {
    let mut records = Vec::new();
    for bucket in &intracom.buckets {
        let parts = bucket.key.parts();
        let (country, name, vat) = match parts {
            [country, name, vat] => (country.trim(), name.trim(), vat.trim()),
            _ => {
                warn!(key = %bucket.key, "skipping intra-community bucket with malformed key");
                continue;
            }
        };
        if bucket.base <= Decimal::ZERO {
            warn!(key = %bucket.key, base = %bucket.base, "skipping intra-community bucket without positive base");
            continue;
        }
        if name.is_empty() || vat.is_empty() {
            warn!(key = %bucket.key, "skipping intra-community bucket without buyer identity");
            continue;
        }
        records.push(Form349Record {
            country: country.to_string(),
            buyer_name: name.to_string(),
            buyer_vat: vat.split_whitespace().collect::<String>().to_ascii_uppercase(),
            base: bucket.base,
            operation_key: KEY_INTRA_COMMUNITY_SUPPLY,
        });
    }

    if records.is_empty() {
        return Err(ModeloError::FormGeneration(
            "No valid data for Form 349 after filtering".into(),
        ));
    }
    Ok(records)
}

/// Check intra-community buckets before filtering. Returns every problem found.
///
/// Unlike [`form349_records`], which silently drops unusable buckets, this
/// reports them, plus buyer VAT numbers that do not start with an EU prefix.
pub fn validate_form349_data(intracom: &CategoryAggregate) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for bucket in &intracom.buckets {
        let field = format!("intracom.{}", bucket.key);
        let [_, name, vat] = bucket.key.parts() else {
            errors.push(ValidationError::with_rule(
                field,
                "key must be country|buyerName|buyerVat",
                "349-KEY",
            ));
            continue;
        };
        if name.trim().is_empty() {
            errors.push(ValidationError::with_rule(&field, "empty buyer name", "349-NAME"));
        }
        if vat.trim().is_empty() {
            errors.push(ValidationError::with_rule(&field, "empty buyer VAT number", "349-VAT"));
        } else if vat_prefix_country(vat).is_none() {
            errors.push(ValidationError::with_rule(
                &field,
                format!("buyer VAT number '{vat}' has no EU country prefix"),
                "349-VAT",
            ));
        }
        if bucket.base < Decimal::ZERO {
            errors.push(ValidationError::with_rule(&field, "negative base amount", "349-NEGATIVE"));
        }
    }
    errors
}

/// Where the type-1 summary record goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryPosition {
    /// First line, as the AEAT import expects.
    Leading,
    /// Last line, closing the file.
    #[default]
    Trailing,
}

/// Options for [`Form349Generator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form349Options {
    pub summary_position: SummaryPosition,
    /// 13-digit declaration identifier, starting with `349`.
    pub declaration_number: String,
    /// Contact name used when the declarant config has none.
    pub default_contact: String,
    /// Fail on buckets [`validate_form349_data`] flags instead of logging them.
    #[serde(default)]
    pub reject_invalid: bool,
}

impl Default for Form349Options {
    fn default() -> Self {
        Self {
            summary_position: SummaryPosition::Trailing,
            declaration_number: "3490000000001".into(),
            default_contact: "ADMINISTRACION".into(),
            reject_invalid: false,
        }
    }
}

/// Fixed-width Modelo 349 generator.
#[derive(Debug, Clone, Default)]
pub struct Form349Generator {
    options: Form349Options,
}

impl Form349Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Form349Options) -> Self {
        Self { options }
    }

    /// Render the records. Lines are joined with CRLF; encode with
    /// [`encode_latin1`](super::encode_latin1) before writing.
    pub fn generate(
        &self,
        records: &[Form349Record],
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        if records.is_empty() {
            return Err(ModeloError::FormGeneration(
                "Form 349 has no operator records".into(),
            ));
        }

        let mut operators = Vec::with_capacity(records.len());
        for record in records {
            operators.push(self.operator_record(record, period, config)?);
        }
        let summary = self.summary_record(records, period, config)?;

        let lines: Vec<String> = match self.options.summary_position {
            SummaryPosition::Leading => std::iter::once(summary).chain(operators).collect(),
            SummaryPosition::Trailing => operators.into_iter().chain(std::iter::once(summary)).collect(),
        };
        let content = lines.join("\r\n");
        if content.is_empty() {
            return Err(ModeloError::FormGeneration("Form 349 output is empty".into()));
        }
        info!(records = records.len(), bytes = content.len(), "Form 349 generated");
        Ok(content)
    }

    fn operator_record(
        &self,
        record: &Form349Record,
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        let cents = to_cents(record.base);
        let amount = zero_pad(cents, 13).ok_or_else(|| {
            ModeloError::FormGeneration(format!(
                "Form 349 base {} for {} does not fit 13 digits",
                record.base, record.buyer_vat
            ))
        })?;

        let mut line = String::with_capacity(RECORD_LENGTH);
        line.push('2');
        line.push_str("349");
        line.push_str(&year_field(period)?);
        line.push_str(&nif_field(config));
        line.push_str(&" ".repeat(58));
        line.push_str(&pad_right(&record.buyer_vat, 17));
        line.push_str(&pad_right(&clean_name(&record.buyer_name), 40));
        line.push(record.operation_key);
        line.push_str(&amount);
        line.push_str(&" ".repeat(32));
        // Final destination VAT number, only used with operation key C.
        line.push_str(&" ".repeat(17));
        Ok(finish_record(line))
    }

    fn summary_record(
        &self,
        records: &[Form349Record],
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        let total_cents: i128 = records.iter().map(|r| to_cents(r.base)).sum();
        let overflow = || {
            ModeloError::FormGeneration(format!(
                "Form 349 total {total_cents} cents does not fit the summary record"
            ))
        };
        let euros = zero_pad(total_cents / 100, 13).ok_or_else(overflow)?;
        let cents = zero_pad(total_cents % 100, 2).ok_or_else(overflow)?;
        let count = zero_pad(records.len() as i128, 9).ok_or_else(overflow)?;

        let phone: String = config
            .phone
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        let contact = config
            .contact_name
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.options.default_contact);

        let mut line = String::with_capacity(RECORD_LENGTH);
        line.push('1');
        line.push_str("349");
        line.push_str(&year_field(period)?);
        line.push_str(&nif_field(config));
        line.push_str(&pad_right(&clean_name(&config.company_name), 40));
        line.push(' ');
        line.push_str(&format!("{:0>9}", truncate_digits(&phone, 9)));
        line.push_str(&pad_right(&clean_name(contact), 40));
        line.push_str(&pad_right(&self.options.declaration_number, 13));
        // Not complementary, not substitutive, no previous declaration.
        line.push_str("  ");
        line.push_str(&"0".repeat(13));
        line.push_str(&pad_right(&period.form_code(), 2));
        line.push_str(&count);
        line.push_str(&euros);
        line.push_str(&cents);
        // Rectified operators and amounts.
        line.push_str(&"0".repeat(9));
        line.push_str(&"0".repeat(15));
        line.push(' ');
        Ok(finish_record(line))
    }
}

fn year_field(period: &PeriodInfo) -> Result<String, ModeloError> {
    zero_pad(i128::from(period.year), 4)
        .ok_or_else(|| ModeloError::FormGeneration(format!("invalid exercise year {}", period.year)))
}

fn nif_field(config: &DeclarantConfig) -> String {
    let nif = config.nif.trim().to_ascii_uppercase();
    let nif: String = nif.chars().take(9).collect();
    format!("{nif:0>9}")
}

fn truncate_digits(s: &str, max: usize) -> &str {
    &s[s.len().saturating_sub(max)..]
}

fn finish_record(mut line: String) -> String {
    super::layout::pad_to(&mut line, RECORD_LENGTH);
    line.chars().take(RECORD_LENGTH).collect()
}
