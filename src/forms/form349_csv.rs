//! Semicolon-delimited rendering of the Modelo 349 records, for review in a
//! spreadsheet before filing.

use csv::{Terminator, WriterBuilder};
use tracing::info;

use super::form349::Form349Record;
use super::layout::{clean_name, to_cents};
use crate::core::{DeclarantConfig, ModeloError, PeriodInfo};

const HEADER: [&str; 8] = [
    "NIF_DECLARANTE",
    "EJERCICIO",
    "PERIODO",
    "PAIS",
    "NIF_OPERADOR",
    "NOMBRE_OPERADOR",
    "CLAVE",
    "BASE_IMPONIBLE",
];

/// CSV variant of Modelo 349.
#[derive(Debug, Clone, Copy, Default)]
pub struct Form349CsvGenerator;

impl Form349CsvGenerator {
    pub fn new() -> Self {
        Self
    }

    /// One line per record after a header. Amounts use a decimal comma.
    pub fn generate(
        &self,
        records: &[Form349Record],
        period: &PeriodInfo,
        config: &DeclarantConfig,
    ) -> Result<String, ModeloError> {
        if records.is_empty() {
            return Err(ModeloError::FormGeneration(
                "Form 349 CSV has no operator records".into(),
            ));
        }

        let mut wtr = WriterBuilder::new()
            .delimiter(b';')
            .terminator(Terminator::CRLF)
            .from_writer(Vec::new());
        wtr.write_record(HEADER)?;

        let nif = config.nif.trim().to_ascii_uppercase();
        let year = period.year.to_string();
        let period_code = period.form_code();
        for record in records {
            let country = record.buyer_country().unwrap_or(record.country.as_str());
            wtr.write_record([
                nif.as_str(),
                year.as_str(),
                period_code.as_str(),
                country,
                record.buyer_vat.as_str(),
                clean_name(&record.buyer_name).as_str(),
                record.operation_key.to_string().as_str(),
                format_cents(to_cents(record.base)).as_str(),
            ])?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| ModeloError::Io(e.into_error()))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| ModeloError::FormGeneration(format!("Form 349 CSV is not text: {e}")))?;
        if content.is_empty() {
            return Err(ModeloError::FormGeneration("Form 349 CSV output is empty".into()));
        }
        info!(records = records.len(), bytes = content.len(), "Form 349 CSV generated");
        Ok(content)
    }
}

fn format_cents(cents: i128) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{},{:02}", abs / 100, abs % 100)
}
