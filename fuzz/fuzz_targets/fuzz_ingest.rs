#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic: errors are fine, panics are bugs.
    if let Ok(ingestor) = modelo::ingest::CsvIngestor::new(data) {
        for row in ingestor {
            let _ = row;
        }
    }
});
