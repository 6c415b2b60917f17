//! Exchange-rate and VAT-rate lookup.
//!
//! The pipeline only reads rates through [`RateProvider`]. [`StaticRates`] is
//! the deterministic built-in table; [`RateTable`] holds effective-dated rates
//! loaded from JSON; [`WithFallback`] consults a primary provider and falls
//! back to the built-in table when it has no answer.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::ModeloError;

/// Source of currency and VAT rates, keyed by effective date.
///
/// Implementations are shared read-only across runs and must tolerate
/// concurrent lookups.
pub trait RateProvider: Send + Sync {
    /// EUR value of one unit of `currency` (ISO 4217) on `date`.
    fn exchange_rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal>;

    /// Standard VAT rate of `country` (ISO 3166-1 alpha-2) on `date`, in percent.
    fn vat_rate(&self, country: &str, date: NaiveDate) -> Option<Decimal>;
}

impl<P: RateProvider + ?Sized> RateProvider for &P {
    fn exchange_rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal> {
        (**self).exchange_rate(currency, date)
    }

    fn vat_rate(&self, country: &str, date: NaiveDate) -> Option<Decimal> {
        (**self).vat_rate(country, date)
    }
}

impl<P: RateProvider + ?Sized> RateProvider for Arc<P> {
    fn exchange_rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal> {
        (**self).exchange_rate(currency, date)
    }

    fn vat_rate(&self, country: &str, date: NaiveDate) -> Option<Decimal> {
        (**self).vat_rate(country, date)
    }
}

/// Built-in rates used when no rate store is available. Dates are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRates;

impl RateProvider for StaticRates {
    fn exchange_rate(&self, currency: &str, _date: NaiveDate) -> Option<Decimal> {
        let currency = currency.trim().to_ascii_uppercase();
        lookup(FALLBACK_EXCHANGE_RATES, &currency)
    }

    fn vat_rate(&self, country: &str, _date: NaiveDate) -> Option<Decimal> {
        let country = country.trim().to_ascii_uppercase();
        lookup(FALLBACK_VAT_RATES, &country)
    }
}

/// Standard VAT rate (percent) of an EU member state from the built-in table.
pub fn standard_vat_rate(country: &str) -> Option<Decimal> {
    let country = country.trim().to_ascii_uppercase();
    lookup(FALLBACK_VAT_RATES, &country)
}

fn lookup(table: &[(&str, Decimal)], code: &str) -> Option<Decimal> {
    table
        .binary_search_by(|(c, _)| (*c).cmp(code))
        .ok()
        .map(|i| table[i].1)
}

/// Currency → EUR, sorted by currency code.
static FALLBACK_EXCHANGE_RATES: &[(&str, Decimal)] = &[
    ("AUD", dec!(0.602)),
    ("BGN", dec!(0.511)),
    ("BRL", dec!(0.162)),
    ("CAD", dec!(0.679)),
    ("CHF", dec!(1.081)),
    ("CNY", dec!(0.129)),
    ("CZK", dec!(0.041)),
    ("DKK", dec!(0.134)),
    ("EUR", dec!(1)),
    ("GBP", dec!(1.169827)),
    ("HRK", dec!(0.133)),
    ("HUF", dec!(0.0025)),
    ("INR", dec!(0.011)),
    ("JPY", dec!(0.0062)),
    ("MXN", dec!(0.047)),
    ("NOK", dec!(0.087)),
    ("PLN", dec!(0.319033)),
    ("RON", dec!(0.201)),
    ("SEK", dec!(0.087)),
    ("USD", dec!(0.926)),
];

/// Standard VAT rates in percent, sorted by country code.
static FALLBACK_VAT_RATES: &[(&str, Decimal)] = &[
    ("AT", dec!(20)),
    ("BE", dec!(21)),
    ("BG", dec!(20)),
    ("CY", dec!(19)),
    ("CZ", dec!(21)),
    ("DE", dec!(19)),
    ("DK", dec!(25)),
    ("EE", dec!(20)),
    ("ES", dec!(21)),
    ("FI", dec!(24)),
    ("FR", dec!(20)),
    ("GR", dec!(24)),
    ("HR", dec!(25)),
    ("HU", dec!(27)),
    ("IE", dec!(23)),
    ("IT", dec!(22)),
    ("LT", dec!(21)),
    ("LU", dec!(17)),
    ("LV", dec!(21)),
    ("MT", dec!(18)),
    ("NL", dec!(21)),
    ("PL", dec!(23)),
    ("PT", dec!(23)),
    ("RO", dec!(19)),
    ("SE", dec!(25)),
    ("SI", dec!(22)),
    ("SK", dec!(20)),
];

/// An exchange rate valid from a given date until superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateEntry {
    pub currency: String,
    pub valid_from: NaiveDate,
    /// EUR per unit of `currency`.
    pub rate: Decimal,
}

/// A VAT rate valid from a given date until superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRateEntry {
    pub country: String,
    pub valid_from: NaiveDate,
    /// Percent.
    pub rate: Decimal,
}

/// Effective-dated rate store, typically loaded from a JSON export.
///
/// ```
/// use modelo::core::{RateProvider, RateTable};
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let table = RateTable::from_json(r#"{
///     "exchange_rates": [{"currency": "GBP", "valid_from": "2024-01-01", "rate": "1.15"}],
///     "vat_rates": []
/// }"#).unwrap();
/// let day = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
/// assert_eq!(table.exchange_rate("GBP", day), Some(dec!(1.15)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    pub exchange_rates: Vec<ExchangeRateEntry>,
    #[serde(default)]
    pub vat_rates: Vec<VatRateEntry>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from JSON.
    pub fn from_json(json: &str) -> Result<Self, ModeloError> {
        serde_json::from_str(json)
            .map_err(|e| ModeloError::Configuration(format!("invalid rate table: {e}")))
    }

    /// Add an exchange rate.
    pub fn exchange(mut self, currency: &str, valid_from: NaiveDate, rate: Decimal) -> Self {
        self.exchange_rates.push(ExchangeRateEntry {
            currency: currency.to_ascii_uppercase(),
            valid_from,
            rate,
        });
        self
    }

    /// Add a VAT rate.
    pub fn vat(mut self, country: &str, valid_from: NaiveDate, rate: Decimal) -> Self {
        self.vat_rates.push(VatRateEntry {
            country: country.to_ascii_uppercase(),
            valid_from,
            rate,
        });
        self
    }
}

impl RateProvider for RateTable {
    fn exchange_rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.exchange_rates
            .iter()
            .filter(|e| e.currency.eq_ignore_ascii_case(currency.trim()) && e.valid_from <= date)
            .max_by_key(|e| e.valid_from)
            .map(|e| e.rate)
    }

    fn vat_rate(&self, country: &str, date: NaiveDate) -> Option<Decimal> {
        self.vat_rates
            .iter()
            .filter(|e| e.country.eq_ignore_ascii_case(country.trim()) && e.valid_from <= date)
            .max_by_key(|e| e.valid_from)
            .map(|e| e.rate)
    }
}

/// Consults `primary` first and the built-in table when it has no rate.
#[derive(Debug, Clone)]
pub struct WithFallback<P> {
    primary: P,
}

impl<P: RateProvider> WithFallback<P> {
    pub fn new(primary: P) -> Self {
        Self { primary }
    }
}

impl<P: RateProvider> RateProvider for WithFallback<P> {
    fn exchange_rate(&self, currency: &str, date: NaiveDate) -> Option<Decimal> {
        self.primary.exchange_rate(currency, date).or_else(|| {
            let rate = StaticRates.exchange_rate(currency, date);
            if rate.is_some() {
                warn!(currency, %date, "no stored exchange rate, using built-in fallback");
            }
            rate
        })
    }

    fn vat_rate(&self, country: &str, date: NaiveDate) -> Option<Decimal> {
        self.primary.vat_rate(country, date).or_else(|| {
            let rate = StaticRates.vat_rate(country, date);
            if rate.is_some() {
                warn!(country, %date, "no stored VAT rate, using built-in fallback");
            }
            rate
        })
    }
}
