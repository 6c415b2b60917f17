//! Streaming ingestion of the Amazon VAT transaction export.
//!
//! Detects the delimiter and character encoding, validates the header and
//! yields typed [`TransactionRow`](crate::core::TransactionRow)s lazily.
//!
//! # Example
//!
//! ```
//! use modelo::ingest::CsvIngestor;
//!
//! let data = "ACTIVITY_PERIOD;TAX_REPORTING_SCHEME;TOTAL_ACTIVITY_VALUE_VAT_AMT\n\
//!             2024-JAN;UNION-OSS;21,00\n";
//! let rows: Vec<_> = CsvIngestor::new(data.as_bytes())
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(rows[0].tax_reporting_scheme, "UNION-OSS");
//! ```

mod columns;
mod reader;
mod value;

pub use reader::{CsvIngestor, MAX_ACTIVITY_PERIODS, detect_delimiter, validate_extension};
pub use value::{parse_amount, parse_date, parse_rate_percent};
