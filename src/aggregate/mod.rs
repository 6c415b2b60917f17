//! Grouping of computed rows into per-category buckets.
//!
//! Each category keeps its buckets in first-seen order. When the stream ends,
//! [`AggregationEngine::finish`] runs the UK marketplace reallocation and
//! derives each category's `Total`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{
    AggregatedBucket, AggregationKey, CategoryAggregate, ComputedRow, FiscalCategory, ModeloError,
};

const UNKNOWN_JURISDICTION: &str = "UNKNOWN";
const SHIPPING_WITHOUT_VAT: &str = "Envíos SIN IVA";
const PRODUCTS_WITHOUT_VAT: &str = "Productos SIN IVA";

/// Post-aggregation move of UK VOEC marketplace sales into their own bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UkReallocation {
    pub enabled: bool,
    /// `TAX_REPORTING_SCHEME` values whose marketplace rows are moved.
    pub schemes: Vec<String>,
    /// Bucket receiving the moved amounts.
    pub target_key: AggregationKey,
}

impl Default for UkReallocation {
    fn default() -> Self {
        Self {
            enabled: true,
            schemes: vec!["UK_VOEC-DOMESTIC".into()],
            target_key: AggregationKey::new(["GB", "UK-VOEC"]),
        }
    }
}

impl UkReallocation {
    /// No reallocation: marketplace rows stay where aggregation put them.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    fn applies_to(&self, row: &ComputedRow) -> bool {
        self.enabled
            && row.category == FiscalCategory::MarketplaceVat
            && self
                .schemes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&row.row.tax_reporting_scheme))
    }
}

/// Category-specific aggregation key of a computed row.
pub fn aggregation_key(row: &ComputedRow) -> AggregationKey {
    let r = &row.row;
    match row.category {
        FiscalCategory::B2cB2bLocal => {
            let jurisdiction = if r.taxable_jurisdiction.is_empty() {
                UNKNOWN_JURISDICTION
            } else {
                r.taxable_jurisdiction.as_str()
            };
            AggregationKey::new([jurisdiction])
        }
        FiscalCategory::LocalSinIva => {
            let detail = if r.transaction_type.eq_ignore_ascii_case("SALE") {
                SHIPPING_WITHOUT_VAT
            } else {
                PRODUCTS_WITHOUT_VAT
            };
            AggregationKey::new([r.sale_depart_country.as_str(), detail])
        }
        FiscalCategory::IntracomB2b => AggregationKey::new([
            r.sale_depart_country.as_str(),
            r.buyer_name.as_str(),
            r.buyer_vat_number.as_str(),
        ]),
        FiscalCategory::Oss | FiscalCategory::Ioss => {
            AggregationKey::new([r.sale_arrival_country.as_str()])
        }
        FiscalCategory::MarketplaceVat
        | FiscalCategory::AmazonCompras
        | FiscalCategory::Exportaciones => AggregationKey::new([
            r.sale_depart_country.as_str(),
            r.sale_arrival_country.as_str(),
        ]),
    }
}

/// Buckets of one category in insertion order, with their running total.
#[derive(Debug, Clone)]
struct BucketMap {
    buckets: Vec<AggregatedBucket>,
    index: HashMap<AggregationKey, usize>,
    total: AggregatedBucket,
}

impl Default for BucketMap {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
            index: HashMap::new(),
            total: AggregatedBucket::new(AggregationKey::total()),
        }
    }
}

impl BucketMap {
    fn entry(&mut self, key: AggregationKey) -> &mut AggregatedBucket {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.buckets.push(AggregatedBucket::new(key.clone()));
                self.index.insert(key, self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[idx]
    }

    fn add(&mut self, key: AggregationKey, row: &ComputedRow) -> Result<(), ModeloError> {
        self.total.add(row)?;
        self.entry(key).add(row)
    }

    fn snapshot(&self, category: FiscalCategory) -> CategoryAggregate {
        CategoryAggregate {
            category,
            buckets: self.buckets.clone(),
            total: self.total.clone(),
        }
    }
}

/// Accumulates computed rows into per-category buckets.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    categories: [BucketMap; 8],
    uk: UkReallocation,
    /// Amounts flagged for reallocation, keyed by their source bucket.
    uk_moves: BucketMap,
    rows: u64,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self {
            categories: Default::default(),
            uk: UkReallocation::default(),
            uk_moves: BucketMap::default(),
            rows: 0,
        }
    }

    /// Configure the UK marketplace reallocation.
    pub fn with_uk_reallocation(mut self, uk: UkReallocation) -> Self {
        self.uk = uk;
        self
    }

    /// Aggregate a whole stream of rows.
    pub fn aggregate<I>(mut self, rows: I) -> Result<AggregatedReport, ModeloError>
    where
        I: IntoIterator<Item = ComputedRow>,
    {
        for row in rows {
            self.add(&row)?;
        }
        self.finish()
    }

    /// Accumulate one row into its category's bucket.
    ///
    /// Fails with [`ModeloError::Arithmetic`] when a sum leaves the decimal range.
    pub fn add(&mut self, row: &ComputedRow) -> Result<(), ModeloError> {
        let key = aggregation_key(row);
        if self.uk.applies_to(row) {
            self.uk_moves.add(key.clone(), row)?;
        }
        self.categories[row.category.index()].add(key, row)?;
        self.rows += 1;
        Ok(())
    }

    /// Number of rows accumulated so far.
    pub fn rows_aggregated(&self) -> u64 {
        self.rows
    }

    /// Current state of one category, without the reallocation pass.
    pub fn snapshot(&self, category: FiscalCategory) -> CategoryAggregate {
        self.categories[category.index()].snapshot(category)
    }

    /// Apply post-aggregation adjustments and freeze the result.
    ///
    /// Reallocation moves amounts between buckets, so category totals are
    /// unchanged by it.
    pub fn finish(mut self) -> Result<AggregatedReport, ModeloError> {
        if !self.uk_moves.buckets.is_empty() {
            let marketplace = &mut self.categories[FiscalCategory::MarketplaceVat.index()];
            let mut moved = AggregatedBucket::new(self.uk.target_key.clone());
            for flagged in &self.uk_moves.buckets {
                marketplace.entry(flagged.key.clone()).subtract(flagged)?;
                moved.merge(flagged)?;
            }
            debug!(
                rows = moved.record_count,
                base = %moved.base,
                target = %self.uk.target_key,
                "UK marketplace sales reallocated"
            );
            marketplace.entry(self.uk.target_key.clone()).merge(&moved)?;
        }

        let categories = FiscalCategory::ALL.map(|c| self.categories[c.index()].snapshot(c));
        info!(
            rows = self.rows,
            buckets = categories.iter().map(|c| c.buckets.len()).sum::<usize>(),
            "aggregation finished"
        );
        Ok(AggregatedReport { categories })
    }
}

/// Final aggregation result for all categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    categories: [CategoryAggregate; 8],
}

impl AggregatedReport {
    /// Aggregate of one category (empty if no row landed in it).
    pub fn category(&self, category: FiscalCategory) -> &CategoryAggregate {
        &self.categories[category.index()]
    }

    /// All categories in report order.
    pub fn categories(&self) -> &[CategoryAggregate] {
        &self.categories
    }

    /// Rows counted across all categories.
    pub fn record_count(&self) -> u64 {
        self.categories.iter().map(|c| c.total.record_count).sum()
    }
}
