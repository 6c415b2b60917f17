//! Reclassify a small export and print the aggregated report.
//!
//! Run with: `cargo run --example classify_report --features report`

use chrono::NaiveDate;
use modelo::aggregate::AggregationEngine;
use modelo::classify::classify;
use modelo::compute::ValueComputer;
use modelo::core::*;
use modelo::ingest::CsvIngestor;
use modelo::report::ReportWriter;

const EXPORT: &str = "\
ACTIVITY_PERIOD;TRANSACTION_TYPE;TAX_REPORTING_SCHEME;TAX_COLLECTION_RESPONSIBILITY;SALE_DEPART_COUNTRY;SALE_ARRIVAL_COUNTRY;TAXABLE_JURISDICTION;BUYER_NAME;BUYER_VAT_NUMBER;BUYER_VAT_NUMBER_COUNTRY;TRANSACTION_CURRENCY_CODE;TOTAL_ACTIVITY_VALUE_VAT_EXCL_AMT;TOTAL_ACTIVITY_VALUE_VAT_AMT
2024-JAN;SALE;REGULAR;SELLER;ES;ES;SPAIN;;;;EUR;41,32;8,68
2024-JAN;SALE;REGULAR;SELLER;ES;ES;SPAIN;;;;EUR;0,00;0,00
2024-JAN;SALE;UNION-OSS;SELLER;ES;DE;GERMANY;;;;EUR;100,00;19,00
2024-FEB;SALE;UNION-OSS;SELLER;ES;FR;FRANCE;;;;GBP;50,00;10,00
2024-FEB;SALE;REGULAR;SELLER;ES;IT;ITALY;Rossi SRL;IT12345678901;IT;EUR;900,00;0,00
2024-MAR;SALE;UK_VOEC-DOMESTIC;MARKETPLACE;GB;GB;UNITED KINGDOM;;;;GBP;25,00;5,00
2024-MAR;SALE;;;ES;US;;;;;USD;300,00;0,00
";

fn main() {
    let computer = ValueComputer::new(StaticRates)
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    let mut engine = AggregationEngine::new();

    for row in CsvIngestor::new(EXPORT.as_bytes()).expect("header should be valid") {
        let row = row.expect("row should parse");
        match classify(&row) {
            Some(category) => {
                println!("line {}: {}", row.line, category);
                let computed = computer
                    .compute(row, category)
                    .expect("amounts should be in range");
                engine.add(&computed).expect("sums should be in range");
            }
            None => println!("line {}: unclassified", row.line),
        }
    }

    let report = engine.finish().expect("sums should be in range");
    println!();
    print!(
        "{}",
        ReportWriter::new()
            .delimiter(b';')
            .render(&report)
            .expect("report should render")
    );
}
