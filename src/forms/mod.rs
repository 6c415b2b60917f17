//! Spanish tax declarations built from the aggregated categories.
//!
//! - [`Form349Generator`]: Modelo 349 fixed-width file (intra-community supplies)
//! - [`Form349CsvGenerator`]: the same records as semicolon CSV
//! - [`Form369Generator`]: Modelo 369 OSS / IOSS return
//!
//! Generators return text; the regulator expects ISO-8859-1 bytes, see
//! [`encode_latin1`].

mod form349;
mod form349_csv;
mod form369;
mod layout;

pub use form349::{
    Form349Generator, Form349Options, Form349Record, KEY_INTRA_COMMUNITY_SUPPLY, RECORD_LENGTH,
    SummaryPosition, form349_records, validate_form349_data,
};
pub use form349_csv::Form349CsvGenerator;
pub use form369::{
    Form369Generator, Form369Options, MAX_ENTRIES_PER_PAGE, PAGE_LENGTH, Regime, select_regime,
};
pub use layout::{clean_name, encode_latin1, to_cents};
