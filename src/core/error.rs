use thiserror::Error;

/// Errors that can abort a reclassification or form generation run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModeloError {
    /// The input file is not a `.csv` or `.txt` file.
    #[error("unsupported file extension '{0}': only .csv and .txt files are accepted")]
    UnsupportedExtension(String),

    /// A column the pipeline cannot run without is absent from the header.
    #[error("Missing required {0} column")]
    MissingColumn(String),

    /// The export spans more activity periods than one declaration can cover.
    #[error(
        "Maximum {max} distinct ACTIVITY_PERIOD values allowed, found more than {max} ({})",
        found.join(", ")
    )]
    TooManyPeriods {
        /// Largest accepted number of distinct periods.
        max: usize,
        /// Distinct periods seen up to and including the offending one.
        found: Vec<String>,
    },

    /// Reading the input or writing an artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV stream is malformed beyond what the reader tolerates.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Declarant or rate configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or more pre-generation checks failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A generator had nothing to emit or emitted nothing.
    #[error("form generation failed: {0}")]
    FormGeneration(String),

    /// An amount or a running sum left the representable decimal range.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

impl ModeloError {
    /// Join a list of validation errors into a single [`ModeloError::Validation`].
    pub fn from_validation(prefix: &str, errors: &[ValidationError]) -> Self {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Validation(format!("{prefix}: {joined}"))
    }
}

/// One failed declarant or form check.
///
/// Validators return these in a `Vec` so a declarant sees every problem in
/// one pass; [`ModeloError::from_validation`] folds them into a single error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Where the bad value sits, e.g. `declarant.nif` or `oss.DE.vat_rate`.
    pub field: String,
    pub message: String,
    /// AEAT-side check code such as `369-RATE` or `CFG-NIF`.
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rule {
            Some(code) => write!(f, "[{code}] {}: {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

impl ValidationError {
    /// An untagged check failure.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// A check failure carrying its check code, shown as `[code]` in messages.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            rule: Some(code.into()),
            ..Self::new(field, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_periods_message() {
        let err = ModeloError::TooManyPeriods {
            max: 3,
            found: vec!["2024-JAN".into(), "2024-FEB".into()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Maximum 3 distinct ACTIVITY_PERIOD values allowed"));
        assert!(msg.contains("2024-JAN, 2024-FEB"));
    }

    #[test]
    fn validation_join() {
        let errors = vec![
            ValidationError::new("oss.DE", "missing VAT rate"),
            ValidationError::with_rule("period", "quarterly only", "369-PERIOD"),
        ];
        let err = ModeloError::from_validation("Form 369 validation failed", &errors);
        assert_eq!(
            err.to_string(),
            "validation failed: Form 369 validation failed: oss.DE: missing VAT rate, [369-PERIOD] period: quarterly only"
        );
    }

    #[test]
    fn arithmetic_message() {
        let err = ModeloError::Arithmetic("base overflows bucket DE".into());
        assert_eq!(err.to_string(), "arithmetic error: base overflows bucket DE");
    }
}
