//! # modelo
//!
//! Reclassifies an Amazon VAT transaction export into fiscal categories and
//! produces the Spanish declarations that follow from it: Modelo 349
//! (intra-community supplies) and Modelo 369 (OSS / IOSS).
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Amounts are only rounded to cents when they are written out.
//!
//! ## Quick Start
//!
//! ```rust
//! use modelo::aggregate::AggregationEngine;
//! use modelo::classify::classify;
//! use modelo::compute::ValueComputer;
//! use modelo::core::*;
//! use modelo::ingest::CsvIngestor;
//! use rust_decimal_macros::dec;
//!
//! let csv = "ACTIVITY_PERIOD,TAX_REPORTING_SCHEME,SALE_ARRIVAL_COUNTRY,TRANSACTION_CURRENCY_CODE,\
//!            TOTAL_ACTIVITY_VALUE_VAT_EXCL_AMT,TOTAL_ACTIVITY_VALUE_VAT_AMT\n\
//!            2024-01,UNION-OSS,DE,EUR,100,21\n";
//!
//! let computer = ValueComputer::new(StaticRates);
//! let mut engine = AggregationEngine::new();
//! for row in CsvIngestor::new(csv.as_bytes()).unwrap() {
//!     let row = row.unwrap();
//!     if let Some(category) = classify(&row) {
//!         engine.add(&computer.compute(row, category).unwrap()).unwrap();
//!     }
//! }
//! let report = engine.finish().unwrap();
//! let oss = report.category(FiscalCategory::Oss);
//! assert_eq!(oss.get_by("DE").unwrap().total, dec!(121));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Data model, ingestion, classification, computation, aggregation, periods |
//! | `report` | Sectioned CSV report |
//! | `forms` | Modelo 349 / 369 generators |
//! | `pipeline` (default) | End-to-end orchestration and file output |
//! | `cli` | `modelo` command-line binary |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod aggregate;

#[cfg(feature = "core")]
pub mod classify;

#[cfg(feature = "core")]
pub mod compute;

#[cfg(feature = "core")]
pub mod ingest;

#[cfg(feature = "core")]
pub mod period;

#[cfg(feature = "report")]
pub mod report;

#[cfg(feature = "forms")]
pub mod forms;

#[cfg(feature = "pipeline")]
pub mod pipeline;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
