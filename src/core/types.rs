use std::fmt;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::ModeloError;

/// Fiscal category a transaction is reclassified into.
///
/// Every classified row lands in exactly one category; rows that match no
/// classification rule are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FiscalCategory {
    /// Domestic sales charged with local VAT, B2C and B2B.
    #[serde(rename = "B2C_B2B_LOCAL")]
    B2cB2bLocal,
    /// Domestic sales on which no VAT was charged.
    #[serde(rename = "LOCAL_SIN_IVA")]
    LocalSinIva,
    /// Intra-community supplies of goods to VAT-registered buyers (Form 349).
    #[serde(rename = "INTRACOM_B2B")]
    IntracomB2b,
    /// Distance sales declared under the union One-Stop-Shop (Form 369 MOSS).
    #[serde(rename = "OSS")]
    Oss,
    /// Low-value imports declared under the Import One-Stop-Shop (Form 369 IMPO).
    #[serde(rename = "IOSS")]
    Ioss,
    /// Sales where the marketplace collected and remitted the VAT.
    #[serde(rename = "MARKETPLACE_VAT")]
    MarketplaceVat,
    /// Fees and services purchased from Amazon itself.
    #[serde(rename = "AMAZON_COMPRAS")]
    AmazonCompras,
    /// Shipments leaving the EU.
    #[serde(rename = "EXPORTACIONES")]
    Exportaciones,
}

impl FiscalCategory {
    /// All categories in report order.
    pub const ALL: [FiscalCategory; 8] = [
        Self::B2cB2bLocal,
        Self::LocalSinIva,
        Self::IntracomB2b,
        Self::Oss,
        Self::Ioss,
        Self::MarketplaceVat,
        Self::AmazonCompras,
        Self::Exportaciones,
    ];

    /// Stable machine code (e.g. "INTRACOM_B2B").
    pub fn code(&self) -> &'static str {
        match self {
            Self::B2cB2bLocal => "B2C_B2B_LOCAL",
            Self::LocalSinIva => "LOCAL_SIN_IVA",
            Self::IntracomB2b => "INTRACOM_B2B",
            Self::Oss => "OSS",
            Self::Ioss => "IOSS",
            Self::MarketplaceVat => "MARKETPLACE_VAT",
            Self::AmazonCompras => "AMAZON_COMPRAS",
            Self::Exportaciones => "EXPORTACIONES",
        }
    }

    /// Spanish heading used in the aggregated report.
    pub fn title(&self) -> &'static str {
        match self {
            Self::B2cB2bLocal => "Ventas locales al consumidor final - B2C y B2B (EUR)",
            Self::LocalSinIva => "Ventas locales SIN IVA (EUR)",
            Self::IntracomB2b => "Ventas Intracomunitarias de bienes - B2B (EUR)",
            Self::Oss => "Ventanilla Única - OSS esquema europeo (EUR)",
            Self::Ioss => "Ventanilla Única - IOSS esquema de importación (EUR)",
            Self::MarketplaceVat => "IVA recaudado y remitido por Amazon Marketplace (EUR)",
            Self::AmazonCompras => "Compras a Amazon (EUR)",
            Self::Exportaciones => "Exportaciones (EUR)",
        }
    }

    /// Report section the category is rendered in.
    pub fn section(&self) -> ReportSection {
        match self {
            Self::B2cB2bLocal | Self::LocalSinIva => ReportSection::Regular,
            _ => ReportSection::International,
        }
    }

    /// Whether amounts in this category are converted to EUR.
    pub fn converts_currency(&self) -> bool {
        matches!(self, Self::Oss | Self::Ioss | Self::MarketplaceVat)
    }

    /// Column labels for the parts of this category's aggregation key.
    pub fn key_labels(&self) -> &'static [&'static str] {
        match self {
            Self::B2cB2bLocal => &["Taxable Jurisdiction"],
            Self::LocalSinIva => &["Country", "Detail"],
            Self::IntracomB2b => &["Country", "Buyer Name", "Buyer VAT"],
            Self::Oss | Self::Ioss => &["Arrival Country"],
            Self::MarketplaceVat | Self::AmazonCompras | Self::Exportaciones => {
                &["Depart Country", "Arrival Country"]
            }
        }
    }

    /// Position in [`FiscalCategory::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Parse a category from its machine code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for FiscalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Top-level grouping of categories in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportSection {
    /// Domestic activity.
    Regular,
    /// Cross-border and marketplace activity.
    International,
}

impl ReportSection {
    /// Section heading.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::International => "INTERNATIONAL",
        }
    }
}

/// Monetary fields of one transaction as found in the export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowAmounts {
    /// Amount excluding VAT.
    pub net: Decimal,
    /// VAT amount.
    pub vat: Decimal,
    /// Amount including VAT.
    pub gross: Decimal,
    /// VAT rate as a percentage (21 for 21 %).
    pub vat_rate_percent: Decimal,
}

/// One normalized record of the Amazon VAT transaction export.
///
/// String fields are trimmed; absent columns are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    /// 1-based record number in the source file (header excluded).
    pub line: u64,
    pub activity_period: String,
    pub transaction_type: String,
    pub tax_reporting_scheme: String,
    pub tax_collection_responsibility: String,
    pub supplier_name: String,
    pub sale_depart_country: String,
    pub sale_arrival_country: String,
    pub arrival_city: String,
    pub taxable_jurisdiction: String,
    pub buyer_name: String,
    pub buyer_vat_number: String,
    pub buyer_vat_number_country: String,
    pub transaction_currency_code: String,
    pub transaction_complete_date: Option<NaiveDate>,
    pub amounts: RowAmounts,
}

impl TransactionRow {
    /// Departure and arrival country are the same.
    pub fn is_domestic(&self) -> bool {
        self.sale_depart_country
            .eq_ignore_ascii_case(&self.sale_arrival_country)
    }

    /// The row is a refund (`TRANSACTION_TYPE` = `RETURN`).
    pub fn is_return(&self) -> bool {
        self.transaction_type.eq_ignore_ascii_case("RETURN")
    }
}

/// A classified row with EUR-normalized amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedRow {
    pub row: TransactionRow,
    pub category: FiscalCategory,
    /// Taxable base in EUR.
    pub base: Decimal,
    /// VAT in EUR.
    pub vat: Decimal,
    /// Always `base + vat`.
    pub total: Decimal,
    /// Base reconstructed from VAT and rate, or `base` when that is not possible.
    pub calculated_base: Decimal,
    /// Rate applied to the source currency (1 when not converted).
    pub exchange_rate: Decimal,
    /// Destination VAT rate in percent, resolved for OSS and IOSS rows.
    pub vat_rate: Option<Decimal>,
}

impl ComputedRow {
    /// Country of destination (arrival country).
    pub fn destination_country(&self) -> &str {
        &self.row.sale_arrival_country
    }
}

/// Composite key identifying one bucket within a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationKey(Vec<String>);

impl AggregationKey {
    /// Label of the synthetic grand-total bucket.
    pub const TOTAL: &'static str = "Total";

    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Parse a `|`-joined key such as `DE|Acme GmbH|DE123456789`.
    pub fn parse(joined: &str) -> Self {
        Self(joined.split('|').map(str::to_string).collect())
    }

    /// The key of the grand-total bucket.
    pub fn total() -> Self {
        Self(vec![Self::TOTAL.to_string()])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_total(&self) -> bool {
        self.0.len() == 1 && self.0[0] == Self::TOTAL
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Accumulated amounts for one aggregation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub key: AggregationKey,
    pub base: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
    pub calculated_base: Decimal,
    pub record_count: u64,
    /// First destination VAT rate seen for this key.
    pub vat_rate: Option<Decimal>,
}

impl AggregatedBucket {
    pub fn new(key: AggregationKey) -> Self {
        Self {
            key,
            base: Decimal::ZERO,
            vat: Decimal::ZERO,
            total: Decimal::ZERO,
            calculated_base: Decimal::ZERO,
            record_count: 0,
            vat_rate: None,
        }
    }

    /// Accumulate one computed row.
    pub fn add(&mut self, row: &ComputedRow) -> Result<(), ModeloError> {
        self.combine(
            [row.base, row.vat, row.total, row.calculated_base],
            Decimal::checked_add,
        )?;
        self.record_count += 1;
        if self.vat_rate.is_none() {
            self.vat_rate = row.vat_rate;
        }
        Ok(())
    }

    /// Take another bucket's sums back out of this one.
    pub fn subtract(&mut self, other: &AggregatedBucket) -> Result<(), ModeloError> {
        self.combine(other.amounts(), Decimal::checked_sub)?;
        self.record_count = self.record_count.saturating_sub(other.record_count);
        Ok(())
    }

    /// Fold another bucket's sums into this one.
    pub fn merge(&mut self, other: &AggregatedBucket) -> Result<(), ModeloError> {
        self.combine(other.amounts(), Decimal::checked_add)?;
        self.record_count += other.record_count;
        if self.vat_rate.is_none() {
            self.vat_rate = other.vat_rate;
        }
        Ok(())
    }

    fn amounts(&self) -> [Decimal; 4] {
        [self.base, self.vat, self.total, self.calculated_base]
    }

    /// Apply `op` to all four sums; on overflow the bucket is left untouched.
    fn combine(
        &mut self,
        rhs: [Decimal; 4],
        op: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<(), ModeloError> {
        let mut out = self.amounts();
        for (field, (lhs, rhs)) in ["base", "vat", "total", "calculated base"]
            .into_iter()
            .zip(out.iter_mut().zip(rhs))
        {
            *lhs = op(*lhs, rhs).ok_or_else(|| {
                ModeloError::Arithmetic(format!("{field} overflows bucket {}", self.key))
            })?;
        }
        [self.base, self.vat, self.total, self.calculated_base] = out;
        Ok(())
    }
}

/// Aggregated result for one category: its buckets in first-seen order plus the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: FiscalCategory,
    pub buckets: Vec<AggregatedBucket>,
    pub total: AggregatedBucket,
}

impl CategoryAggregate {
    /// No row was classified into this category.
    pub fn is_empty(&self) -> bool {
        self.total.record_count == 0
    }

    /// Look up a bucket by key.
    pub fn get(&self, key: &AggregationKey) -> Option<&AggregatedBucket> {
        self.buckets.iter().find(|b| &b.key == key)
    }

    /// Look up a single-part key such as a destination country.
    pub fn get_by(&self, part: &str) -> Option<&AggregatedBucket> {
        self.buckets
            .iter()
            .find(|b| b.key.parts().len() == 1 && b.key.parts()[0] == part)
    }
}

/// Declaration period within a fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclarationPeriod {
    /// Quarter 1-4.
    Quarter(u8),
    /// Month 1-12.
    Month(u8),
}

/// Year and period a declaration covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub year: i32,
    pub period: DeclarationPeriod,
}

impl PeriodInfo {
    pub fn quarterly(year: i32, quarter: u8) -> Self {
        Self {
            year,
            period: DeclarationPeriod::Quarter(quarter),
        }
    }

    pub fn monthly(year: i32, month: u8) -> Self {
        Self {
            year,
            period: DeclarationPeriod::Month(month),
        }
    }

    pub fn is_quarterly(&self) -> bool {
        matches!(self.period, DeclarationPeriod::Quarter(_))
    }

    /// Spanish label: `T 1` for a quarter, `M 3` for a month.
    pub fn label(&self) -> String {
        match self.period {
            DeclarationPeriod::Quarter(q) => format!("T {q}"),
            DeclarationPeriod::Month(m) => format!("M {m}"),
        }
    }

    /// Label without the space, as used in file names (`T1`, `M3`).
    pub fn compact_label(&self) -> String {
        self.label().replace(' ', "")
    }

    /// Two-character period code of the AEAT forms (`1T`..`4T`, `01`..`12`).
    pub fn form_code(&self) -> String {
        match self.period {
            DeclarationPeriod::Quarter(q) => format!("{q}T"),
            DeclarationPeriod::Month(m) => format!("{m:02}"),
        }
    }
}

impl fmt::Display for PeriodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.label())
    }
}

/// Round to cents, half away from zero.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
