#![no_main]

use libfuzzer_sys::fuzz_target;
use modelo::core::DeclarantConfigBuilder;
use modelo::pipeline::TaxFormsOrchestrator;

fuzz_target!(|data: &[u8]| {
    let orchestrator = TaxFormsOrchestrator::new();
    let Ok(processed) = orchestrator.process(data) else {
        return;
    };
    let _ = orchestrator.render_report(&processed);

    let config = DeclarantConfigBuilder::new("B12345678", "Fuzz SL")
        .address("Calle 1", "28001", "Madrid", "Madrid")
        .ioss_number("IM7240000001")
        .build();
    let _ = orchestrator.generate_forms(&processed, &config);
});
