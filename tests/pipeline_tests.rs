#![cfg(feature = "pipeline")]

use std::path::Path;

use chrono::NaiveDate;
use modelo::core::*;
use modelo::pipeline::*;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config() -> DeclarantConfig {
    DeclarantConfigBuilder::new("B12345678", "Ejemplo Comercio SL")
        .address("Calle Mayor 1", "28013", "Madrid", "Madrid")
        .build()
}

fn orchestrator() -> TaxFormsOrchestrator {
    TaxFormsOrchestrator::new().with_options(
        PipelineOptionsBuilder::new()
            .reference_date(date(2024, 3, 31))
            .fallback_year(2024)
            .build(),
    )
}

const HEADER: &str = "ACTIVITY_PERIOD,TRANSACTION_TYPE,TAX_REPORTING_SCHEME,TAX_COLLECTION_RESPONSIBILITY,\
SUPPLIER_NAME,SALE_DEPART_COUNTRY,SALE_ARRIVAL_COUNTRY,TAXABLE_JURISDICTION,BUYER_NAME,BUYER_VAT_NUMBER,\
BUYER_VAT_NUMBER_COUNTRY,TRANSACTION_CURRENCY_CODE,PRICE_OF_ITEMS_VAT_RATE_PERCENT,\
TOTAL_ACTIVITY_VALUE_VAT_EXCL_AMT,TOTAL_ACTIVITY_VALUE_VAT_AMT,TOTAL_ACTIVITY_VALUE_VAT_INCL_AMT";

fn export<S: AsRef<str>>(rows: &[S]) -> String {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row.as_ref());
    }
    csv.push('\n');
    csv
}

/// Prefix a row body with its activity period.
fn at(period: &str, body: &str) -> String {
    format!("{period},{body}")
}

const OSS_DE: &str = "2024Q1,SALE,UNION-OSS,SELLER,,ES,DE,GERMANY,,,,EUR,,100,21,121";
const INTRACOM_FR: &str =
    "2024Q1,SALE,REGULAR,SELLER,,ES,FR,FRANCE,Dupont SARL,FR12345678901,FR,EUR,,500,0,500";
const IOSS_IT: &str = "2024Q1,SALE,DEEMED_RESELLER-IOSS,SELLER,,CN,IT,ITALY,,,,EUR,,50,11,61";
const B2C_ES: &str = "SALE,REGULAR,SELLER,,ES,ES,SPAIN,,,,EUR,21,10,2.10,12.10";
const RETURN_ES: &str = "RETURN,REGULAR,SELLER,,ES,ES,SPAIN,,,,EUR,21,-10,-2.10,-12.10";

// --- Processing ---

#[test]
fn oss_sale_lands_in_destination_bucket() {
    let data = orchestrator()
        .process(export(&[OSS_DE]).as_bytes())
        .unwrap();
    let oss = data.report.category(FiscalCategory::Oss);
    let de = oss.get_by("DE").unwrap();
    assert_eq!(de.base, dec!(100));
    assert_eq!(de.vat, dec!(21));
    assert_eq!(de.total, dec!(121));
    assert_eq!(oss.total.total, dec!(121));
    assert_eq!(data.period, PeriodInfo::quarterly(2024, 1));
}

#[test]
fn monthly_export_example() {
    // Amazon's scenario: monthly label, OSS sale to Germany.
    let row = "2024-01,SALE,UNION-OSS,,,,DE,,,,,EUR,,100,21,";
    let data = orchestrator().process(export(&[row]).as_bytes()).unwrap();
    let de = data.report.category(FiscalCategory::Oss).get_by("DE").unwrap();
    assert_eq!((de.base, de.vat, de.total), (dec!(100), dec!(21), dec!(121)));
    assert_eq!(data.period, PeriodInfo::monthly(2024, 1));
}

#[test]
fn counters_and_periods() {
    let rows = [
        at("2024-JAN", B2C_ES),
        at("2024-FEB", B2C_ES),
        at("2024-MAR", RETURN_ES),
        at("2024-MAR", "SALE,,,,US,CA,,,,,USD,,5,0,5"),
    ];
    let data = orchestrator().process(export(&rows).as_bytes()).unwrap();
    assert_eq!(data.rows_read, 4);
    assert_eq!(data.rows_classified, 2);
    assert_eq!(data.rows_skipped, 1);
    assert_eq!(data.rows_unclassified, 1);
    assert_eq!(data.activity_periods, ["2024-JAN", "2024-FEB", "2024-MAR"]);
    assert_eq!(data.period, PeriodInfo::monthly(2024, 1));

    let b2c = data.report.category(FiscalCategory::B2cB2bLocal);
    assert_eq!(b2c.get_by("SPAIN").unwrap().base, dec!(20));
}

#[test]
fn returns_can_be_kept() {
    let orchestrator = TaxFormsOrchestrator::new().with_options(
        PipelineOptionsBuilder::new()
            .skip_returns(false)
            .reference_date(date(2024, 3, 31))
            .build(),
    );
    let rows = [at("2024Q1", B2C_ES), at("2024Q1", RETURN_ES)];
    let data = orchestrator.process(export(&rows).as_bytes()).unwrap();
    let b2c = data.report.category(FiscalCategory::B2cB2bLocal);
    assert_eq!(b2c.total.base, dec!(0));
    assert_eq!(b2c.total.record_count, 2);
}

#[test]
fn fourth_period_fails_the_run() {
    let rows = ["2024-JAN", "2024-FEB", "2024-MAR", "2024-APR"].map(|p| at(p, B2C_ES));
    let err = orchestrator().process(export(&rows).as_bytes()).unwrap_err();
    assert!(matches!(err, ModeloError::TooManyPeriods { .. }));
}

#[test]
fn report_rendering() {
    let orchestrator = orchestrator();
    let data = orchestrator
        .process(export(&[OSS_DE, INTRACOM_FR]).as_bytes())
        .unwrap();
    let report = orchestrator.render_report(&data).unwrap();
    assert!(report.contains("INTERNATIONAL"));
    assert!(report.contains("DE,100.00,21.00,121.00"));
    assert!(report.contains("ES,Dupont SARL,FR12345678901,500.00,0.00,500.00"));
}

#[test]
fn overflowing_amounts_fail_instead_of_panicking() {
    let max = "79228162514264337593543950335";
    let row = format!("2024Q1,SALE,UNION-OSS,SELLER,,ES,DE,GERMANY,,,,EUR,,{max},0,{max}");
    let err = orchestrator()
        .process(export(&[&row, &row]).as_bytes())
        .unwrap_err();
    assert!(matches!(err, ModeloError::Arithmetic(_)));
}

// --- Forms ---

#[test]
fn forms_follow_the_data() {
    let orchestrator = orchestrator();
    let data = orchestrator
        .process(export(&[OSS_DE, INTRACOM_FR]).as_bytes())
        .unwrap();
    let artifacts = orchestrator.generate_forms(&data, &config()).unwrap();
    let kinds: Vec<FormKind> = artifacts.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![FormKind::Form349, FormKind::Form349Csv, FormKind::Form369]
    );
    assert_eq!(artifacts[0].file_name, "modelo_349_2024_T1.txt");
    assert_eq!(artifacts[2].file_name, "modelo_369_2024_T1.txt");
}

#[test]
fn no_intracom_means_no_form349() {
    let orchestrator = orchestrator();
    let data = orchestrator.process(export(&[OSS_DE]).as_bytes()).unwrap();
    let artifacts = orchestrator.generate_forms(&data, &config()).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].kind, FormKind::Form369);
    assert!(artifacts[0].content.contains("MOSS DO"));
}

#[test]
fn monthly_period_blocks_form369() {
    let orchestrator = orchestrator();
    let row = at("2024-FEB", "SALE,UNION-OSS,SELLER,,ES,DE,GERMANY,,,,EUR,,100,19,119");
    let data = orchestrator.process(export(&[row]).as_bytes()).unwrap();
    let err = orchestrator.generate_form369(&data, &config()).unwrap_err();
    assert!(matches!(err, ModeloError::Validation(ref m) if m.contains("369-PERIOD")));
}

#[test]
fn ioss_without_number_fails_all_forms() {
    let orchestrator = orchestrator();
    let data = orchestrator
        .process(export(&[INTRACOM_FR, IOSS_IT]).as_bytes())
        .unwrap();
    let err = orchestrator.generate_forms(&data, &config()).unwrap_err();
    assert!(matches!(err, ModeloError::Validation(ref m) if m.contains("369-IOSS")));
}

#[test]
fn invalid_config_is_rejected() {
    let orchestrator = orchestrator();
    let data = orchestrator.process(export(&[OSS_DE]).as_bytes()).unwrap();
    let mut bad = config();
    bad.nif = "123".into();
    let err = orchestrator.generate_forms(&data, &bad).unwrap_err();
    assert!(matches!(err, ModeloError::Configuration(ref m) if m.contains("CFG-NIF")));
}

#[test]
fn artifacts_are_latin1() {
    let orchestrator = orchestrator();
    let row = "2024Q1,SALE,REGULAR,SELLER,,ES,FR,FRANCE,Société Générale,FR12345678901,FR,EUR,,500,0,500";
    let data = orchestrator.process(export(&[row]).as_bytes()).unwrap();
    let artifacts = orchestrator.generate_form349(&data, &config()).unwrap();
    // Fixed-width names are folded to ASCII.
    assert!(artifacts[0].to_bytes().is_ascii());
    assert!(artifacts[0].content.contains("SOCIETE GENERALE"));
}

#[test]
fn form349_flags_non_eu_buyer_vat() {
    let row = "2024Q1,SALE,REGULAR,SELLER,,ES,FR,FRANCE,Brit Ltd,GB123456789,FR,EUR,,500,0,500";
    let lenient = orchestrator();
    let data = lenient.process(export(&[row]).as_bytes()).unwrap();
    assert_eq!(lenient.generate_form349(&data, &config()).unwrap().len(), 2);

    let strict = TaxFormsOrchestrator::new().with_options(
        PipelineOptionsBuilder::new()
            .reference_date(date(2024, 3, 31))
            .form349(modelo::forms::Form349Options {
                reject_invalid: true,
                ..Default::default()
            })
            .build(),
    );
    let err = strict.generate_form349(&data, &config()).unwrap_err();
    assert!(matches!(err, ModeloError::Validation(ref m) if m.contains("349-VAT")));
}

// --- Files ---

fn write_export(dir: &Path, rows: &[&str]) -> std::path::PathBuf {
    let path = dir.join("amazon_vat.csv");
    std::fs::write(&path, export(rows)).unwrap();
    path
}

#[test]
fn run_writes_every_form() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_export(dir.path(), &[OSS_DE, INTRACOM_FR]);
    let out = dir.path().join("out");

    let written = orchestrator().run(&input, &config(), &out).unwrap();
    assert_eq!(written.len(), 3);
    for path in &written {
        assert!(path.exists());
        let bytes = std::fs::read(path).unwrap();
        assert!(!bytes.is_empty());
    }
    let leftovers = std::fs::read_dir(&out)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "part"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn run_writes_nothing_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_export(dir.path(), &[INTRACOM_FR, IOSS_IT]);
    let out = dir.path().join("out");

    assert!(orchestrator().run(&input, &config(), &out).is_err());
    assert!(!out.exists() || std::fs::read_dir(&out).unwrap().next().is_none());
}

#[test]
fn run_rejects_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("amazon_vat.json");
    std::fs::write(&input, export(&[OSS_DE])).unwrap();
    let err = orchestrator()
        .run(&input, &config(), dir.path())
        .unwrap_err();
    assert!(matches!(err, ModeloError::UnsupportedExtension(_)));
}

#[test]
fn repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_export(dir.path(), &[OSS_DE, INTRACOM_FR]);
    let first_dir = dir.path().join("a");
    let second_dir = dir.path().join("b");

    let first = orchestrator().run(&input, &config(), &first_dir).unwrap();
    let second = orchestrator().run(&input, &config(), &second_dir).unwrap();
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
