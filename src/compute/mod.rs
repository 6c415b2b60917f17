//! Per-row amount derivation and EUR normalization.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::{ComputedRow, FiscalCategory, ModeloError, RateProvider, TransactionRow};
use crate::period::period_start;

/// Derives base, VAT and total for classified rows.
///
/// Only OSS, IOSS and marketplace-collected rows are converted to EUR; the
/// others are reported in the currency they were invoiced in.
#[derive(Debug, Clone)]
pub struct ValueComputer<P> {
    rates: P,
    reference_date: NaiveDate,
}

impl<P: RateProvider> ValueComputer<P> {
    /// Create a computer that looks rates up in `rates`.
    ///
    /// Rows without a usable period or transaction date are converted at
    /// today's rate.
    pub fn new(rates: P) -> Self {
        Self {
            rates,
            reference_date: Local::now().date_naive(),
        }
    }

    /// Set the date used when a row carries no date of its own.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    /// The underlying rate provider.
    pub fn rates(&self) -> &P {
        &self.rates
    }

    /// Compute EUR amounts for a row already assigned to `category`.
    ///
    /// Fails with [`ModeloError::Arithmetic`] when an amount leaves the
    /// decimal range after conversion.
    pub fn compute(
        &self,
        row: TransactionRow,
        category: FiscalCategory,
    ) -> Result<ComputedRow, ModeloError> {
        let date = self.rate_date(&row);
        let exchange_rate = if category.converts_currency() {
            self.exchange_rate(&row, date)
        } else {
            Decimal::ONE
        };

        let line = row.line;
        let overflow = |what: &str| ModeloError::Arithmetic(format!("line {line}: {what} out of range"));
        let convert = |amount: Decimal, what: &str| {
            amount.checked_mul(exchange_rate).ok_or_else(|| overflow(what))
        };

        let net = convert(row.amounts.net, "net amount")?;
        let mut vat = convert(row.amounts.vat, "VAT amount")?;
        let gross = convert(row.amounts.gross, "gross amount")?;
        let rate = row.amounts.vat_rate_percent;

        let base = derive_base(net, vat, gross, rate).ok_or_else(|| overflow("derived base"))?;
        if category == FiscalCategory::IntracomB2b {
            // Exempt supply: whatever VAT the export shows is not owed.
            vat = Decimal::ZERO;
        }

        let calculated_base = if vat > Decimal::ZERO && rate > Decimal::ZERO {
            base_from_vat(vat, rate).ok_or_else(|| overflow("calculated base"))?
        } else {
            base
        };
        let total = base.checked_add(vat).ok_or_else(|| overflow("total"))?;

        let vat_rate = if !rate.is_zero() {
            Some(rate)
        } else if matches!(category, FiscalCategory::Oss | FiscalCategory::Ioss) {
            self.rates.vat_rate(&row.sale_arrival_country, date)
        } else {
            None
        };

        debug!(
            line = row.line,
            %category,
            %base,
            %vat,
            %exchange_rate,
            "row computed"
        );

        Ok(ComputedRow {
            total,
            base,
            vat,
            calculated_base,
            exchange_rate,
            vat_rate,
            category,
            row,
        })
    }

    fn rate_date(&self, row: &TransactionRow) -> NaiveDate {
        period_start(&row.activity_period)
            .or(row.transaction_complete_date)
            .unwrap_or(self.reference_date)
    }

    fn exchange_rate(&self, row: &TransactionRow, date: NaiveDate) -> Decimal {
        let currency = row.transaction_currency_code.as_str();
        if currency.is_empty() || currency.eq_ignore_ascii_case("EUR") {
            return Decimal::ONE;
        }
        self.rates.exchange_rate(currency, date).unwrap_or_else(|| {
            warn!(
                line = row.line,
                currency, "no exchange rate for currency, amounts left unconverted"
            );
            Decimal::ONE
        })
    }
}

/// Taxable base from the amounts present in the export.
///
/// A missing net is rebuilt only when the VAT-inclusive amount is present:
/// from VAT and rate when the rate is non-zero, otherwise the inclusive amount
/// is the base. `None` when the division leaves the decimal range.
pub fn derive_base(
    net: Decimal,
    vat: Decimal,
    gross: Decimal,
    rate_percent: Decimal,
) -> Option<Decimal> {
    if !net.is_zero() || gross.is_zero() {
        Some(net)
    } else if rate_percent.is_zero() {
        Some(gross)
    } else {
        base_from_vat(vat, rate_percent)
    }
}

fn base_from_vat(vat: Decimal, rate_percent: Decimal) -> Option<Decimal> {
    vat.checked_div(rate_percent / Decimal::ONE_HUNDRED)
}
