//! Property-based tests for classification, computation and aggregation.
//!
//! Run with: `cargo test --test proptest_tests`

#![cfg(feature = "forms")]

use chrono::NaiveDate;
use modelo::aggregate::AggregationEngine;
use modelo::classify::classify;
use modelo::compute::ValueComputer;
use modelo::core::*;
use modelo::forms::to_cents;
use modelo::ingest::parse_amount;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Generate an amount between -9999.99 and 99999.99.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-999_999i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_country() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("ES"),
        Just("DE"),
        Just("FR"),
        Just("IT"),
        Just("GB"),
        Just("US"),
        Just(""),
    ]
}

fn arb_scheme() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("REGULAR"),
        Just("UNION-OSS"),
        Just("DEEMED_RESELLER-IOSS"),
        Just("UK_VOEC-DOMESTIC"),
        Just(""),
    ]
}

fn arb_responsibility() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("SELLER"), Just("MARKETPLACE"), Just("")]
}

fn arb_currency() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("EUR"), Just("GBP"), Just("PLN"), Just("")]
}

/// Generate a transaction row with a mix of schemes, routes and amounts.
fn arb_row() -> impl Strategy<Value = TransactionRow> {
    (
        arb_scheme(),
        arb_responsibility(),
        arb_country(),
        arb_country(),
        arb_currency(),
        arb_amount(),
        arb_amount(),
        any::<bool>(),
    )
        .prop_map(
            |(scheme, responsibility, depart, arrival, currency, net, vat, has_buyer_vat)| {
                TransactionRow {
                    activity_period: "2024Q1".into(),
                    transaction_type: "SALE".into(),
                    tax_reporting_scheme: scheme.into(),
                    tax_collection_responsibility: responsibility.into(),
                    sale_depart_country: depart.into(),
                    sale_arrival_country: arrival.into(),
                    taxable_jurisdiction: arrival.into(),
                    buyer_name: if has_buyer_vat { "Buyer".into() } else { String::new() },
                    buyer_vat_number: if has_buyer_vat {
                        format!("{arrival}123456789")
                    } else {
                        String::new()
                    },
                    buyer_vat_number_country: if has_buyer_vat {
                        arrival.into()
                    } else {
                        String::new()
                    },
                    transaction_currency_code: currency.into(),
                    amounts: RowAmounts {
                        net,
                        vat,
                        gross: net + vat,
                        vat_rate_percent: Decimal::ZERO,
                    },
                    ..Default::default()
                }
            },
        )
}

fn arb_rows() -> impl Strategy<Value = Vec<TransactionRow>> {
    prop::collection::vec(arb_row(), 0..40)
}

// ── Property Tests ──────────────────────────────────────────────────────────

proptest! {
    /// Every category total equals the sum of its buckets.
    #[test]
    fn totals_are_bucket_sums(rows in arb_rows()) {
        let computer = ValueComputer::new(StaticRates).with_reference_date(date(2024, 3, 31));
        let report = AggregationEngine::new()
            .aggregate(rows.into_iter().filter_map(|row| {
                let category = classify(&row)?;
                Some(computer.compute(row, category).unwrap())
            }))
            .unwrap();

        for aggregate in report.categories() {
            let base: Decimal = aggregate.buckets.iter().map(|b| b.base).sum();
            let vat: Decimal = aggregate.buckets.iter().map(|b| b.vat).sum();
            let total: Decimal = aggregate.buckets.iter().map(|b| b.total).sum();
            let count: u64 = aggregate.buckets.iter().map(|b| b.record_count).sum();
            prop_assert_eq!(aggregate.total.base, base);
            prop_assert_eq!(aggregate.total.vat, vat);
            prop_assert_eq!(aggregate.total.total, total);
            prop_assert_eq!(aggregate.total.record_count, count);
        }
    }

    /// Classified rows all end up in the report, whatever reallocation does.
    #[test]
    fn record_count_is_preserved(rows in arb_rows()) {
        let computer = ValueComputer::new(StaticRates).with_reference_date(date(2024, 3, 31));
        let classified: Vec<ComputedRow> = rows
            .into_iter()
            .filter_map(|row| {
                let category = classify(&row)?;
                Some(computer.compute(row, category).unwrap())
            })
            .collect();
        let expected = classified.len() as u64;
        let report = AggregationEngine::new().aggregate(classified).unwrap();
        prop_assert_eq!(report.record_count(), expected);
    }

    /// Categories outside OSS, IOSS and MARKETPLACE keep their amounts as given.
    #[test]
    fn non_converting_categories_keep_amounts(row in arb_row()) {
        let computer = ValueComputer::new(StaticRates).with_reference_date(date(2024, 3, 31));
        if let Some(category) = classify(&row) {
            let computed = computer.compute(row.clone(), category).unwrap();
            prop_assert_eq!(computed.total, computed.base + computed.vat);
            if !category.converts_currency() {
                prop_assert_eq!(computed.exchange_rate, Decimal::ONE);
                if category != FiscalCategory::IntracomB2b {
                    prop_assert_eq!(computed.vat, row.amounts.vat);
                }
            }
        }
    }

    /// Formatting an amount and parsing it back gives the same cents.
    #[test]
    fn amounts_survive_decimal_comma(amount in arb_amount()) {
        let comma = format!("{amount:.2}").replace('.', ",");
        prop_assert_eq!(to_cents(parse_amount(&comma)), to_cents(amount));
    }
}

// ── Edge cases ──────────────────────────────────────────────────────────────

#[test]
fn rounding_is_half_away_from_zero() {
    assert_eq!(round_amount(dec!(0.005)), dec!(0.01));
    assert_eq!(round_amount(dec!(-0.005)), dec!(-0.01));
    assert_eq!(round_amount(dec!(2.345)), dec!(2.35));
    assert_eq!(round_amount(dec!(2.344)), dec!(2.34));
}
