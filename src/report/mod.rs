//! Sectioned CSV rendering of the aggregated categories.
//!
//! Output has a `REGULAR` section (domestic categories) and an
//! `INTERNATIONAL` section (everything else). Each category contributes its
//! Spanish title, a column header, one row per bucket and a `Total` row.
//! Empty categories and sections are omitted.

use std::io::Write;

use csv::WriterBuilder;
use rust_decimal::Decimal;

use crate::aggregate::AggregatedReport;
use crate::core::{
    AggregatedBucket, CategoryAggregate, FiscalCategory, ModeloError, ReportSection,
    round_amount,
};

/// Renders an [`AggregatedReport`] as delimited text.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    delimiter: u8,
    include_record_counts: bool,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_record_counts: true,
        }
    }
}

impl ReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field delimiter (default `,`).
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Whether to append a `Records` column (default on).
    pub fn include_record_counts(mut self, include: bool) -> Self {
        self.include_record_counts = include;
        self
    }

    /// Render to a string.
    pub fn render(&self, report: &AggregatedReport) -> Result<String, ModeloError> {
        let mut buf = Vec::new();
        self.write(report, &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| ModeloError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Write the report to `out`.
    pub fn write<W: Write>(&self, report: &AggregatedReport, out: W) -> Result<(), ModeloError> {
        let mut wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(out);

        for section in [ReportSection::Regular, ReportSection::International] {
            let categories: Vec<&CategoryAggregate> = report
                .categories()
                .iter()
                .filter(|c| c.category.section() == section && !c.is_empty())
                .collect();
            if categories.is_empty() {
                continue;
            }

            wtr.write_record([section.name()])?;
            for aggregate in categories {
                wtr.write_record([aggregate.category.title()])?;
                wtr.write_record(self.header(aggregate.category))?;
                for bucket in aggregate.buckets.iter().filter(|b| b.record_count > 0) {
                    wtr.write_record(self.row(aggregate.category, bucket))?;
                }
                wtr.write_record(self.row(aggregate.category, &aggregate.total))?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    fn header(&self, category: FiscalCategory) -> Vec<String> {
        let mut fields: Vec<String> = category.key_labels().iter().map(|s| s.to_string()).collect();
        fields.extend(["Base (€)", "IVA (€)", "Total (€)"].map(String::from));
        if category == FiscalCategory::B2cB2bLocal {
            fields.push("Calculated Base (€)".into());
        }
        if self.include_record_counts {
            fields.push("Records".into());
        }
        fields
    }

    fn row(&self, category: FiscalCategory, bucket: &AggregatedBucket) -> Vec<String> {
        let width = category.key_labels().len();
        let mut fields: Vec<String> = if bucket.key.is_total() {
            let mut f = vec![String::new(); width];
            f[0] = bucket.key.to_string();
            f
        } else {
            let mut f = bucket.key.parts().to_vec();
            f.resize(width, String::new());
            f
        };
        fields.push(format_amount(bucket.base));
        fields.push(format_amount(bucket.vat));
        fields.push(format_amount(bucket.total));
        if category == FiscalCategory::B2cB2bLocal {
            fields.push(format_amount(bucket.calculated_base));
        }
        if self.include_record_counts {
            fields.push(bucket.record_count.to_string());
        }
        fields
    }
}

/// Two-decimal rendering of an amount, half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", round_amount(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_format() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(-12.345)), "-12.35");
    }

    #[test]
    fn b2c_header_has_calculated_base() {
        let header = ReportWriter::new().header(FiscalCategory::B2cB2bLocal);
        assert_eq!(
            header,
            vec![
                "Taxable Jurisdiction",
                "Base (€)",
                "IVA (€)",
                "Total (€)",
                "Calculated Base (€)",
                "Records"
            ]
        );
        let header = ReportWriter::new()
            .include_record_counts(false)
            .header(FiscalCategory::Oss);
        assert_eq!(header, vec!["Arrival Country", "Base (€)", "IVA (€)", "Total (€)"]);
    }
}
