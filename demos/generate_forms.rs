//! Run the whole pipeline on an export and write the declarations.
//!
//! Run with: `cargo run --example generate_forms -- export.csv out/`

use std::path::PathBuf;

use modelo::core::DeclarantConfigBuilder;
use modelo::forms::{Form349Options, SummaryPosition};
use modelo::pipeline::{PipelineOptionsBuilder, TaxFormsOrchestrator};

fn main() {
    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "amazon_vat.csv".into()));
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "out".into()));

    let config = DeclarantConfigBuilder::new("B12345678", "Ejemplo Comercio SL")
        .address("Calle Mayor 1", "28013", "Madrid", "Madrid")
        .contact_name("Ana García")
        .phone("912345678")
        .build();

    let options = PipelineOptionsBuilder::new()
        .form349(Form349Options {
            summary_position: SummaryPosition::Leading,
            ..Default::default()
        })
        .build();
    let orchestrator = TaxFormsOrchestrator::new().with_options(options);

    let data = match orchestrator.process_file(&input) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Cannot process {}: {e}", input.display());
            std::process::exit(1);
        }
    };
    println!(
        "{} rows read, {} classified, {} returns skipped, period {}",
        data.rows_read, data.rows_classified, data.rows_skipped, data.period
    );

    match orchestrator
        .generate_forms(&data, &config)
        .and_then(|artifacts| modelo::pipeline::write_artifacts(&artifacts, &out_dir))
    {
        Ok(written) => {
            for path in written {
                println!("Written: {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("No declarations written: {e}");
            std::process::exit(1);
        }
    }
}
