//! End-to-end orchestration: export file in, report and declarations out.
//!
//! # Example
//!
//! ```no_run
//! use modelo::core::DeclarantConfigBuilder;
//! use modelo::pipeline::TaxFormsOrchestrator;
//!
//! let config = DeclarantConfigBuilder::new("B12345678", "Ejemplo Comercio SL")
//!     .address("Calle Mayor 1", "28013", "Madrid", "Madrid")
//!     .build();
//!
//! let orchestrator = TaxFormsOrchestrator::new();
//! let written = orchestrator.run("amazon_vat_2024Q1.csv", &config, "out").unwrap();
//! for path in written {
//!     println!("{}", path.display());
//! }
//! ```

mod artifacts;

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::{AggregatedReport, AggregationEngine, UkReallocation};
use crate::classify::classify;
use crate::compute::ValueComputer;
use crate::core::{
    DeclarantConfig, FiscalCategory, ModeloError, PeriodInfo, RateProvider, StaticRates,
};
use crate::forms::{
    Form349CsvGenerator, Form349Generator, Form349Options, Form369Generator, Form369Options,
    form349_records, validate_form349_data,
};
use crate::ingest::{CsvIngestor, validate_extension};
use crate::period::PeriodExtractor;
use crate::report::ReportWriter;

pub use artifacts::{FormArtifact, FormKind, write_artifacts};

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Leave `RETURN` transactions out of every total.
    pub skip_returns: bool,
    pub uk_reallocation: UkReallocation,
    /// Rate date for rows without a period or transaction date (default: today).
    pub reference_date: Option<NaiveDate>,
    /// Year declared when no activity period is recognizable (default: current year).
    pub fallback_year: Option<i32>,
    pub form349: Form349Options,
    pub form369: Form369Options,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_returns: true,
            uk_reallocation: UkReallocation::default(),
            reference_date: None,
            fallback_year: None,
            form349: Form349Options::default(),
            form369: Form369Options::default(),
        }
    }
}

/// Builder for [`PipelineOptions`].
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: PipelineOptions::default(),
        }
    }

    pub fn skip_returns(mut self, skip: bool) -> Self {
        self.options.skip_returns = skip;
        self
    }

    pub fn uk_reallocation(mut self, uk: UkReallocation) -> Self {
        self.options.uk_reallocation = uk;
        self
    }

    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.options.reference_date = Some(date);
        self
    }

    pub fn fallback_year(mut self, year: i32) -> Self {
        self.options.fallback_year = Some(year);
        self
    }

    pub fn form349(mut self, options: Form349Options) -> Self {
        self.options.form349 = options;
        self
    }

    pub fn form369(mut self, options: Form369Options) -> Self {
        self.options.form369 = options;
        self
    }

    pub fn build(self) -> PipelineOptions {
        self.options
    }
}

impl Default for PipelineOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the streaming stages produce for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub report: AggregatedReport,
    /// Distinct activity periods in first-seen order.
    pub activity_periods: Vec<String>,
    pub period: PeriodInfo,
    pub rows_read: u64,
    pub rows_classified: u64,
    /// `RETURN` rows left out.
    pub rows_skipped: u64,
    /// Rows no classification rule matched.
    pub rows_unclassified: u64,
}

/// Sequences ingestion, classification, computation, aggregation and form
/// generation for one export at a time.
#[derive(Debug, Clone)]
pub struct TaxFormsOrchestrator<P = StaticRates> {
    rates: P,
    options: PipelineOptions,
}

impl TaxFormsOrchestrator<StaticRates> {
    /// Orchestrator using the built-in rate table.
    pub fn new() -> Self {
        Self::with_rates(StaticRates)
    }
}

impl Default for TaxFormsOrchestrator<StaticRates> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RateProvider> TaxFormsOrchestrator<P> {
    pub fn with_rates(rates: P) -> Self {
        Self {
            rates,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the streaming stages over a CSV byte stream.
    pub fn process<R: Read>(&self, input: R) -> Result<ProcessedData, ModeloError> {
        let mut ingestor = CsvIngestor::new(input)?;
        let mut computer = ValueComputer::new(&self.rates);
        if let Some(date) = self.options.reference_date {
            computer = computer.with_reference_date(date);
        }
        let mut engine =
            AggregationEngine::new().with_uk_reallocation(self.options.uk_reallocation.clone());

        let (mut skipped, mut unclassified) = (0u64, 0u64);
        for row in ingestor.by_ref() {
            let row = row?;
            if self.options.skip_returns && row.is_return() {
                skipped += 1;
                continue;
            }
            match classify(&row) {
                Some(category) => engine.add(&computer.compute(row, category)?)?,
                None => unclassified += 1,
            }
        }

        let activity_periods = ingestor.activity_periods().to_vec();
        let mut extractor = PeriodExtractor::new();
        if let Some(year) = self.options.fallback_year {
            extractor = extractor.with_fallback_year(year);
        }
        let period = extractor.extract(&activity_periods);
        let rows_classified = engine.rows_aggregated();
        let report = engine.finish()?;

        info!(
            rows = ingestor.rows_read(),
            classified = rows_classified,
            skipped,
            unclassified,
            %period,
            "export processed"
        );
        Ok(ProcessedData {
            report,
            activity_periods,
            period,
            rows_read: ingestor.rows_read(),
            rows_classified,
            rows_skipped: skipped,
            rows_unclassified: unclassified,
        })
    }

    /// Open and process a `.csv` or `.txt` export.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<ProcessedData, ModeloError> {
        let path = path.as_ref();
        validate_extension(path)?;
        info!(path = %path.display(), "reading export");
        self.process(std::fs::File::open(path)?)
    }

    /// Render the aggregated report as CSV text.
    pub fn render_report(&self, data: &ProcessedData) -> Result<String, ModeloError> {
        ReportWriter::new().render(&data.report)
    }

    /// Modelo 349 in both fixed-width and CSV form.
    ///
    /// Buckets flagged by [`validate_form349_data`] are logged, or fail the
    /// form when [`Form349Options::reject_invalid`] is set.
    pub fn generate_form349(
        &self,
        data: &ProcessedData,
        config: &DeclarantConfig,
    ) -> Result<Vec<FormArtifact>, ModeloError> {
        check_config(config)?;
        let intracom = data.report.category(FiscalCategory::IntracomB2b);
        let problems = validate_form349_data(intracom);
        if self.options.form349.reject_invalid && !problems.is_empty() {
            return Err(ModeloError::from_validation("Form 349 validation failed", &problems));
        }
        for problem in &problems {
            warn!(%problem, "Form 349 data problem");
        }
        let records = form349_records(intracom)?;
        let fixed = Form349Generator::with_options(self.options.form349.clone())
            .generate(&records, &data.period, config)?;
        let csv = Form349CsvGenerator::new().generate(&records, &data.period, config)?;
        Ok(vec![
            FormArtifact::new(FormKind::Form349, &data.period, fixed),
            FormArtifact::new(FormKind::Form349Csv, &data.period, csv),
        ])
    }

    /// Modelo 369 for the OSS or IOSS data, whichever regime applies.
    pub fn generate_form369(
        &self,
        data: &ProcessedData,
        config: &DeclarantConfig,
    ) -> Result<FormArtifact, ModeloError> {
        check_config(config)?;
        let content = Form369Generator::with_options(self.options.form369.clone()).generate(
            data.report.category(FiscalCategory::Oss),
            data.report.category(FiscalCategory::Ioss),
            &data.period,
            config,
        )?;
        Ok(FormArtifact::new(FormKind::Form369, &data.period, content))
    }

    /// Every declaration the data calls for. Forms whose source categories
    /// are empty are skipped; any failure fails the whole set.
    pub fn generate_forms(
        &self,
        data: &ProcessedData,
        config: &DeclarantConfig,
    ) -> Result<Vec<FormArtifact>, ModeloError> {
        check_config(config)?;
        let mut artifacts = Vec::new();

        if data.report.category(FiscalCategory::IntracomB2b).is_empty() {
            info!("no intra-community sales, Form 349 not generated");
        } else {
            artifacts.extend(self.generate_form349(data, config)?);
        }

        let oss_empty = data.report.category(FiscalCategory::Oss).is_empty();
        let ioss_empty = data.report.category(FiscalCategory::Ioss).is_empty();
        if oss_empty && ioss_empty {
            info!("no OSS or IOSS sales, Form 369 not generated");
        } else {
            artifacts.push(self.generate_form369(data, config)?);
        }

        if artifacts.is_empty() {
            warn!("export contains nothing to declare");
        }
        Ok(artifacts)
    }

    /// Process `input`, generate every applicable form and write them to
    /// `out_dir`. Nothing is written unless every form was generated.
    pub fn run(
        &self,
        input: impl AsRef<Path>,
        config: &DeclarantConfig,
        out_dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, ModeloError> {
        let data = self.process_file(input)?;
        let artifacts = self.generate_forms(&data, config)?;
        write_artifacts(&artifacts, out_dir.as_ref())
    }
}

fn check_config(config: &DeclarantConfig) -> Result<(), ModeloError> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ModeloError::Configuration(format!(
        "invalid declarant configuration: {joined}"
    )))
}
