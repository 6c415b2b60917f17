//! Header resolution: which column feeds which [`TransactionRow`] field.

use csv::ByteRecord;
use rust_decimal::Decimal;

use super::value::{decode, parse_amount, parse_date, parse_rate_percent};
use crate::core::{ModeloError, RowAmounts, TransactionRow};

pub(crate) const ACTIVITY_PERIOD: &str = "ACTIVITY_PERIOD";

const COMPONENTS: [&str; 6] = [
    "PRICE_OF_ITEMS",
    "PROMO_PRICE_OF_ITEMS",
    "SHIP_CHARGE",
    "PROMO_SHIP_CHARGE",
    "GIFT_WRAP",
    "PROMO_GIFT_WRAP",
];

/// Where an amount comes from: a total column, or the sum of itemized columns.
#[derive(Debug, Clone, PartialEq)]
enum AmountSource {
    Total(usize),
    Components(Vec<usize>),
}

impl AmountSource {
    fn resolve(headers: &[String], totals: &[&str], suffixes: &[&str]) -> Self {
        if let Some(idx) = totals.iter().find_map(|name| position(headers, name)) {
            return Self::Total(idx);
        }
        let parts = COMPONENTS
            .iter()
            .filter_map(|component| {
                suffixes
                    .iter()
                    .find_map(|suffix| position(headers, &format!("{component}_{suffix}")))
            })
            .collect();
        Self::Components(parts)
    }

    fn read(&self, fields: &[String], line: u64) -> Result<Decimal, ModeloError> {
        match self {
            Self::Total(idx) => Ok(amount_at(fields, *idx)),
            Self::Components(parts) => parts.iter().try_fold(Decimal::ZERO, |sum, &idx| {
                sum.checked_add(amount_at(fields, idx)).ok_or_else(|| {
                    ModeloError::Arithmetic(format!("line {line}: itemized amounts overflow"))
                })
            }),
        }
    }
}

/// Column indices resolved once from the header.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    width: usize,
    activity_period: usize,
    transaction_type: Option<usize>,
    tax_reporting_scheme: Option<usize>,
    tax_collection_responsibility: Option<usize>,
    supplier_name: Option<usize>,
    sale_depart_country: Option<usize>,
    sale_arrival_country: Option<usize>,
    arrival_city: Option<usize>,
    taxable_jurisdiction: Option<usize>,
    buyer_name: Option<usize>,
    buyer_vat_number: Option<usize>,
    buyer_vat_number_country: Option<usize>,
    transaction_currency_code: Option<usize>,
    transaction_complete_date: Option<usize>,
    vat_rate: Option<usize>,
    net: AmountSource,
    vat: AmountSource,
    gross: AmountSource,
}

impl ColumnMap {
    /// Resolve the header. Names are matched trimmed and case-insensitively.
    pub(crate) fn resolve(raw_headers: &[String]) -> Result<Self, ModeloError> {
        let headers: Vec<String> = raw_headers
            .iter()
            .map(|h| h.trim().to_ascii_uppercase())
            .collect();

        let activity_period = position(&headers, ACTIVITY_PERIOD)
            .ok_or_else(|| ModeloError::MissingColumn(ACTIVITY_PERIOD.into()))?;

        Ok(Self {
            width: headers.len(),
            activity_period,
            transaction_type: position(&headers, "TRANSACTION_TYPE"),
            tax_reporting_scheme: position(&headers, "TAX_REPORTING_SCHEME"),
            tax_collection_responsibility: position(&headers, "TAX_COLLECTION_RESPONSIBILITY"),
            supplier_name: position(&headers, "SUPPLIER_NAME"),
            sale_depart_country: position(&headers, "SALE_DEPART_COUNTRY"),
            sale_arrival_country: position(&headers, "SALE_ARRIVAL_COUNTRY"),
            arrival_city: position(&headers, "ARRIVAL_CITY"),
            taxable_jurisdiction: position(&headers, "TAXABLE_JURISDICTION"),
            buyer_name: position(&headers, "BUYER_NAME"),
            buyer_vat_number: position(&headers, "BUYER_VAT_NUMBER"),
            buyer_vat_number_country: position(&headers, "BUYER_VAT_NUMBER_COUNTRY"),
            transaction_currency_code: position(&headers, "TRANSACTION_CURRENCY_CODE"),
            transaction_complete_date: position(&headers, "TRANSACTION_COMPLETE_DATE"),
            vat_rate: position(&headers, "PRICE_OF_ITEMS_VAT_RATE_PERCENT"),
            net: AmountSource::resolve(
                &headers,
                &[
                    "TOTAL_ACTIVITY_VALUE_VAT_EXCL_AMT",
                    "TOTAL_ACTIVITY_VALUE_AMT_VAT_EXCL",
                ],
                &["AMT_VAT_EXCL", "VAT_EXCL_AMT"],
            ),
            vat: AmountSource::resolve(&headers, &["TOTAL_ACTIVITY_VALUE_VAT_AMT"], &["VAT_AMT"]),
            gross: AmountSource::resolve(
                &headers,
                &[
                    "TOTAL_ACTIVITY_VALUE_VAT_INCL_AMT",
                    "TOTAL_ACTIVITY_VALUE_AMT_VAT_INCL",
                ],
                &["AMT_VAT_INCL", "VAT_INCL_AMT"],
            ),
        })
    }

    /// Number of header columns.
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    /// Build a typed row from one record. Missing cells read as empty.
    pub(crate) fn build_row(
        &self,
        record: &ByteRecord,
        utf8: bool,
        line: u64,
    ) -> Result<TransactionRow, ModeloError> {
        let fields: Vec<String> = record
            .iter()
            .map(|raw| decode(raw, utf8).trim().to_string())
            .collect();
        let text = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .cloned()
                .unwrap_or_default()
        };

        Ok(TransactionRow {
            line,
            activity_period: text(Some(self.activity_period)),
            transaction_type: text(self.transaction_type),
            tax_reporting_scheme: text(self.tax_reporting_scheme),
            tax_collection_responsibility: text(self.tax_collection_responsibility),
            supplier_name: text(self.supplier_name),
            sale_depart_country: text(self.sale_depart_country).to_ascii_uppercase(),
            sale_arrival_country: text(self.sale_arrival_country).to_ascii_uppercase(),
            arrival_city: text(self.arrival_city),
            taxable_jurisdiction: text(self.taxable_jurisdiction),
            buyer_name: text(self.buyer_name),
            buyer_vat_number: text(self.buyer_vat_number),
            buyer_vat_number_country: text(self.buyer_vat_number_country).to_ascii_uppercase(),
            transaction_currency_code: text(self.transaction_currency_code).to_ascii_uppercase(),
            transaction_complete_date: self
                .transaction_complete_date
                .and_then(|i| fields.get(i))
                .and_then(|s| parse_date(s)),
            amounts: RowAmounts {
                net: self.net.read(&fields, line)?,
                vat: self.vat.read(&fields, line)?,
                gross: self.gross.read(&fields, line)?,
                vat_rate_percent: self
                    .vat_rate
                    .and_then(|i| fields.get(i))
                    .map(|s| parse_rate_percent(s))
                    .unwrap_or_default(),
            },
        })
    }
}

fn position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn amount_at(fields: &[String], idx: usize) -> Decimal {
    fields.get(idx).map(|s| parse_amount(s)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_activity_period() {
        let err = ColumnMap::resolve(&headers(&["TRANSACTION_TYPE"])).unwrap_err();
        assert_eq!(err.to_string(), "Missing required ACTIVITY_PERIOD column");
    }

    #[test]
    fn total_columns_preferred() {
        let map = ColumnMap::resolve(&headers(&[
            "activity_period",
            "TOTAL_ACTIVITY_VALUE_AMT_VAT_EXCL",
            "PRICE_OF_ITEMS_AMT_VAT_EXCL",
        ]))
        .unwrap();
        assert_eq!(map.net, AmountSource::Total(1));
    }

    #[test]
    fn components_summed_without_total() {
        let map = ColumnMap::resolve(&headers(&[
            "ACTIVITY_PERIOD",
            "PRICE_OF_ITEMS_AMT_VAT_EXCL",
            "PROMO_PRICE_OF_ITEMS_AMT_VAT_EXCL",
            "SHIP_CHARGE_AMT_VAT_EXCL",
        ]))
        .unwrap();
        let record = ByteRecord::from(vec!["2024-JAN", "100", "-10", "5,50"]);
        let row = map.build_row(&record, true, 1).unwrap();
        assert_eq!(row.amounts.net, dec!(95.50));
        assert_eq!(row.amounts.vat, dec!(0));
    }

    #[test]
    fn component_overflow_is_an_error() {
        let map = ColumnMap::resolve(&headers(&[
            "ACTIVITY_PERIOD",
            "PRICE_OF_ITEMS_AMT_VAT_EXCL",
            "SHIP_CHARGE_AMT_VAT_EXCL",
        ]))
        .unwrap();
        let max = "79228162514264337593543950335";
        let record = ByteRecord::from(vec!["2024-JAN", max, max]);
        let err = map.build_row(&record, true, 3).unwrap_err();
        assert!(matches!(err, ModeloError::Arithmetic(ref m) if m.starts_with("line 3")));
    }

    #[test]
    fn short_record_reads_empty() {
        let map = ColumnMap::resolve(&headers(&[
            "ACTIVITY_PERIOD",
            "TAX_REPORTING_SCHEME",
            "SALE_ARRIVAL_COUNTRY",
        ]))
        .unwrap();
        let record = ByteRecord::from(vec![" 2024-JAN ", "UNION-OSS"]);
        let row = map.build_row(&record, true, 7).unwrap();
        assert_eq!(row.line, 7);
        assert_eq!(row.activity_period, "2024-JAN");
        assert_eq!(row.tax_reporting_scheme, "UNION-OSS");
        assert_eq!(row.sale_arrival_country, "");
    }
}
