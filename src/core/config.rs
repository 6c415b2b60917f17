//! Declarant configuration shared by the form generators.

use serde::{Deserialize, Serialize};

use super::error::{ModeloError, ValidationError};

/// Identity of the company filing the declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarantConfig {
    /// Spanish tax ID (NIF), e.g. "B12345678".
    pub nif: String,
    /// Registered company name.
    pub company_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub province: String,
    /// IOSS registration number (`IM` + 10 digits), required for IMPO returns.
    #[serde(default)]
    pub ioss_number: Option<String>,
    /// Contact person printed on the Form 349 declarant record.
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Contact phone printed on the Form 349 declarant record.
    #[serde(default)]
    pub phone: Option<String>,
}

impl DeclarantConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ModeloError> {
        serde_json::from_str(json)
            .map_err(|e| ModeloError::Configuration(format!("invalid declarant config: {e}")))
    }

    /// Check required fields and identifier formats. Returns every problem found.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let required = [
            ("declarant.nif", &self.nif),
            ("declarant.company_name", &self.company_name),
            ("declarant.address_line1", &self.address_line1),
            ("declarant.postal_code", &self.postal_code),
            ("declarant.city", &self.city),
            ("declarant.province", &self.province),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(ValidationError::with_rule(field, "is required", "CFG-REQUIRED"));
            }
        }

        if !self.nif.trim().is_empty() && !is_valid_nif(&self.nif) {
            errors.push(ValidationError::with_rule(
                "declarant.nif",
                format!("'{}' is not a valid NIF", self.nif),
                "CFG-NIF",
            ));
        }

        if let Some(ioss) = &self.ioss_number {
            if !ioss.trim().is_empty() && !is_valid_ioss_number(ioss) {
                errors.push(ValidationError::with_rule(
                    "declarant.ioss_number",
                    format!("'{ioss}' must be IM followed by 10 digits"),
                    "CFG-IOSS",
                ));
            }
        }

        errors
    }

    /// The IOSS number, if one is configured and non-blank.
    pub fn ioss(&self) -> Option<&str> {
        self.ioss_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Check the shape of a Spanish NIF.
///
/// Accepts company NIFs (entity letter + 8 digits, e.g. `B12345678`) and
/// personal ones (8 digits + control letter, e.g. `12345678Z`). Only the
/// format is checked, not the control character.
pub fn is_valid_nif(nif: &str) -> bool {
    let nif = nif.trim().to_ascii_uppercase();
    let bytes = nif.as_bytes();
    if bytes.len() != 9 {
        return false;
    }
    let all_digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);

    if b"ABCDEFGHJNPQRSUVW".contains(&bytes[0]) && all_digits(&bytes[1..]) {
        return true;
    }
    all_digits(&bytes[..8]) && b"TRWAGMYFPDXBNJZSQVHLCKE".contains(&bytes[8])
}

/// Check the shape of an IOSS number: `IM` followed by 10 digits.
pub fn is_valid_ioss_number(number: &str) -> bool {
    let number = number.trim();
    number.len() == 12
        && number.starts_with("IM")
        && number[2..].chars().all(|c| c.is_ascii_digit())
}

/// Builder for [`DeclarantConfig`].
///
/// # Example
///
/// ```
/// use modelo::core::DeclarantConfigBuilder;
///
/// let config = DeclarantConfigBuilder::new("B12345678", "Ejemplo Comercio SL")
///     .address("Calle Mayor 1", "28013", "Madrid", "Madrid")
///     .ioss_number("IM7240000001")
///     .build();
/// assert!(config.validate().is_empty());
/// ```
pub struct DeclarantConfigBuilder {
    config: DeclarantConfig,
}

impl DeclarantConfigBuilder {
    /// Create a new builder with the NIF and company name.
    pub fn new(nif: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            config: DeclarantConfig {
                nif: nif.into(),
                company_name: company_name.into(),
                ..Default::default()
            },
        }
    }

    /// Set the first address line, postal code, city and province.
    pub fn address(
        mut self,
        line1: impl Into<String>,
        postal_code: impl Into<String>,
        city: impl Into<String>,
        province: impl Into<String>,
    ) -> Self {
        self.config.address_line1 = line1.into();
        self.config.postal_code = postal_code.into();
        self.config.city = city.into();
        self.config.province = province.into();
        self
    }

    pub fn address_line2(mut self, line: impl Into<String>) -> Self {
        self.config.address_line2 = Some(line.into());
        self
    }

    pub fn ioss_number(mut self, number: impl Into<String>) -> Self {
        self.config.ioss_number = Some(number.into());
        self
    }

    pub fn contact_name(mut self, name: impl Into<String>) -> Self {
        self.config.contact_name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.config.phone = Some(phone.into());
        self
    }

    pub fn build(self) -> DeclarantConfig {
        self.config
    }
}
