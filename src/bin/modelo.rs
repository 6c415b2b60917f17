//! # modelo CLI
//!
//! Reads an Amazon VAT transaction export and writes the aggregated report
//! or the Spanish declarations derived from it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use modelo::aggregate::UkReallocation;
use modelo::core::{DeclarantConfig, FiscalCategory, RateTable, WithFallback};
use modelo::forms::SummaryPosition;
use modelo::pipeline::{
    FormArtifact, PipelineOptions, ProcessedData, TaxFormsOrchestrator, write_artifacts,
};
use modelo::report::ReportWriter;

/// Amazon VAT report reclassification and Modelo 349 / 369 generation.
#[derive(Parser, Debug)]
#[command(name = "modelo", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON rate table consulted before the built-in rates.
    #[arg(long, global = true)]
    rates: Option<PathBuf>,

    /// Keep RETURN transactions in the totals.
    #[arg(long, global = true)]
    include_returns: bool,

    /// Leave UK VOEC marketplace sales in their original buckets.
    #[arg(long, global = true)]
    no_uk_reallocation: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the reclassified, aggregated report as CSV.
    Report(ReportArgs),

    /// Generate Modelo 349 and/or Modelo 369.
    Forms(FormsArgs),

    /// Print a JSON summary of periods and per-category totals.
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Export file (.csv or .txt).
    input: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use `;` as the report delimiter.
    #[arg(long)]
    semicolon: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormChoice {
    #[value(name = "349")]
    Form349,
    #[value(name = "369")]
    Form369,
}

#[derive(Args, Debug)]
struct FormsArgs {
    /// Export file (.csv or .txt).
    input: PathBuf,

    /// Declarant configuration (JSON).
    #[arg(short, long)]
    declarant: PathBuf,

    /// Directory the declarations are written to.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Only generate these forms (default: every form the data calls for).
    #[arg(long = "form", value_enum)]
    forms: Vec<FormChoice>,

    /// Put the Modelo 349 summary record first.
    #[arg(long)]
    summary_first: bool,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    /// Export file (.csv or .txt).
    input: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Failures are reported only through the `error!` event, so every
/// verbosity level keeps errors visible.
fn env_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let rates = match &cli.rates {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading rate table {}", path.display()))?;
            RateTable::from_json(&json)?
        }
        None => RateTable::new(),
    };

    let mut options = PipelineOptions {
        skip_returns: !cli.include_returns,
        ..Default::default()
    };
    if cli.no_uk_reallocation {
        options.uk_reallocation = UkReallocation::disabled();
    }
    if let Commands::Forms(args) = &cli.command {
        if args.summary_first {
            options.form349.summary_position = SummaryPosition::Leading;
        }
    }
    let orchestrator = TaxFormsOrchestrator::with_rates(WithFallback::new(rates)).with_options(options);

    match &cli.command {
        Commands::Report(args) => report(&orchestrator, args),
        Commands::Forms(args) => forms(&orchestrator, args),
        Commands::Summary(args) => summary(&orchestrator, args),
    }
}

type Orchestrator = TaxFormsOrchestrator<WithFallback<RateTable>>;

fn process(orchestrator: &Orchestrator, input: &Path) -> Result<ProcessedData> {
    orchestrator
        .process_file(input)
        .with_context(|| format!("processing {}", input.display()))
}

fn report(orchestrator: &Orchestrator, args: &ReportArgs) -> Result<()> {
    let data = process(orchestrator, &args.input)?;
    let writer = if args.semicolon {
        ReportWriter::new().delimiter(b';')
    } else {
        ReportWriter::new()
    };
    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            writer.write(&data.report, file)?;
        }
        None => writer.write(&data.report, std::io::stdout().lock())?,
    }
    Ok(())
}

fn forms(orchestrator: &Orchestrator, args: &FormsArgs) -> Result<()> {
    let json = std::fs::read_to_string(&args.declarant)
        .with_context(|| format!("reading declarant config {}", args.declarant.display()))?;
    let config = DeclarantConfig::from_json(&json)?;
    let data = process(orchestrator, &args.input)?;

    let artifacts: Vec<FormArtifact> = if args.forms.is_empty() {
        orchestrator.generate_forms(&data, &config)?
    } else {
        let mut artifacts = Vec::new();
        if args.forms.contains(&FormChoice::Form349) {
            artifacts.extend(orchestrator.generate_form349(&data, &config)?);
        }
        if args.forms.contains(&FormChoice::Form369) {
            artifacts.push(orchestrator.generate_form369(&data, &config)?);
        }
        artifacts
    };
    if artifacts.is_empty() {
        bail!("{} contains nothing to declare", args.input.display());
    }

    for path in write_artifacts(&artifacts, &args.out_dir)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn summary(orchestrator: &Orchestrator, args: &SummaryArgs) -> Result<()> {
    let data = process(orchestrator, &args.input)?;
    let categories: serde_json::Map<String, serde_json::Value> = FiscalCategory::ALL
        .iter()
        .map(|c| {
            let aggregate = data.report.category(*c);
            (
                c.code().to_string(),
                serde_json::json!({
                    "records": aggregate.total.record_count,
                    "buckets": aggregate.buckets.len(),
                    "base": modelo::report::format_amount(aggregate.total.base),
                    "vat": modelo::report::format_amount(aggregate.total.vat),
                    "total": modelo::report::format_amount(aggregate.total.total),
                }),
            )
        })
        .collect();
    let out = serde_json::json!({
        "activity_periods": data.activity_periods,
        "year": data.period.year,
        "period": data.period.label(),
        "quarterly": data.period.is_quarterly(),
        "rows_read": data.rows_read,
        "rows_classified": data.rows_classified,
        "rows_skipped": data.rows_skipped,
        "rows_unclassified": data.rows_unclassified,
        "categories": categories,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
