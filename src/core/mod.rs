//! Core data model, error taxonomy, rate lookup and declarant configuration.

mod config;
mod countries;
mod error;
mod rates;
mod types;

pub use config::*;
pub use countries::*;
pub use error::*;
pub use rates::*;
pub use types::*;
