//! First-match rule engine assigning each row to a [`FiscalCategory`].
//!
//! Rules are evaluated top to bottom; the first predicate that holds decides
//! the category. A row that matches nothing is not an error, it is simply
//! left out of every total.

use crate::core::{FiscalCategory, TransactionRow, is_eu_member};

/// A classification rule: a predicate over a row and the category it assigns.
#[derive(Clone, Copy)]
pub struct Rule {
    pub category: FiscalCategory,
    /// Short description for logs and diagnostics.
    pub description: &'static str,
    pub predicate: fn(&TransactionRow) -> bool,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("category", &self.category)
            .field("description", &self.description)
            .finish()
    }
}

/// The rules in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        category: FiscalCategory::MarketplaceVat,
        description: "tax collected by the marketplace",
        predicate: |r| r.tax_collection_responsibility.eq_ignore_ascii_case("MARKETPLACE"),
    },
    Rule {
        category: FiscalCategory::AmazonCompras,
        description: "supplied by Amazon Services Europe",
        predicate: |r| {
            r.supplier_name
                .to_lowercase()
                .contains("amazon services europe")
        },
    },
    Rule {
        category: FiscalCategory::Ioss,
        description: "import one-stop-shop scheme",
        predicate: |r| scheme_contains(r, "DEEMED_RESELLER-IOSS"),
    },
    Rule {
        category: FiscalCategory::Oss,
        description: "union one-stop-shop scheme",
        predicate: |r| scheme_contains(r, "UNION-OSS"),
    },
    Rule {
        category: FiscalCategory::IntracomB2b,
        description: "cross-border sale to a VAT-registered buyer",
        predicate: |r| {
            !r.is_domestic()
                && !r.buyer_vat_number_country.is_empty()
                && is_seller_collected(r)
        },
    },
    Rule {
        category: FiscalCategory::LocalSinIva,
        description: "domestic sale without VAT",
        predicate: |r| {
            r.is_domestic() && r.amounts.vat.is_zero() && r.buyer_vat_number.is_empty()
        },
    },
    Rule {
        category: FiscalCategory::B2cB2bLocal,
        description: "regular domestic sale collected by the seller",
        predicate: |r| {
            (r.tax_reporting_scheme.eq_ignore_ascii_case("REGULAR")
                || r.tax_reporting_scheme.eq_ignore_ascii_case("UK_VOEC-DOMESTIC"))
                && is_seller_collected(r)
        },
    },
    Rule {
        category: FiscalCategory::Exportaciones,
        description: "shipment leaving the EU",
        predicate: |r| {
            is_eu_member(&r.sale_depart_country)
                && !r.sale_arrival_country.is_empty()
                && !is_eu_member(&r.sale_arrival_country)
        },
    },
];

fn scheme_contains(row: &TransactionRow, needle: &str) -> bool {
    row.tax_reporting_scheme.to_ascii_uppercase().contains(needle)
}

fn is_seller_collected(row: &TransactionRow) -> bool {
    row.tax_collection_responsibility.eq_ignore_ascii_case("SELLER")
}

/// Classify a row using the built-in rules.
pub fn classify(row: &TransactionRow) -> Option<FiscalCategory> {
    classify_with(RULES, row)
}

/// Classify a row against an explicit rule list.
pub fn classify_with(rules: &[Rule], row: &TransactionRow) -> Option<FiscalCategory> {
    rules
        .iter()
        .find(|rule| (rule.predicate)(row))
        .map(|rule| rule.category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_order_matches_priority() {
        let order: Vec<_> = RULES.iter().map(|r| r.category).collect();
        assert_eq!(
            order,
            vec![
                FiscalCategory::MarketplaceVat,
                FiscalCategory::AmazonCompras,
                FiscalCategory::Ioss,
                FiscalCategory::Oss,
                FiscalCategory::IntracomB2b,
                FiscalCategory::LocalSinIva,
                FiscalCategory::B2cB2bLocal,
                FiscalCategory::Exportaciones,
            ]
        );
    }

    #[test]
    fn empty_row_is_unclassified_unless_domestic_without_vat() {
        // Empty depart == empty arrival, no VAT, no buyer VAT number.
        let row = TransactionRow::default();
        assert_eq!(classify(&row), Some(FiscalCategory::LocalSinIva));

        let row = TransactionRow {
            sale_depart_country: "ES".into(),
            sale_arrival_country: "FR".into(),
            ..Default::default()
        };
        assert_eq!(classify(&row), None);
    }

    #[test]
    fn custom_rule_list() {
        let rules = [Rule {
            category: FiscalCategory::Exportaciones,
            description: "everything",
            predicate: |_| true,
        }];
        let row = TransactionRow::default();
        assert_eq!(classify_with(&rules, &row), Some(FiscalCategory::Exportaciones));
        assert_eq!(classify_with(&[], &row), None);
    }
}
