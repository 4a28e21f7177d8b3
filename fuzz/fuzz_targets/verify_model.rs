#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(ast) = verifpal_syntax::parse(s) {
            if let Ok(model) = verifpal_model::lower(&ast, "fuzz.vp") {
                let config = verifpal_engine::VerifyConfig {
                    threads: 1,
                    mutation_cap: 256,
                    scan_budget: 1_000,
                    max_stage: 3,
                    ..verifpal_engine::VerifyConfig::default()
                };
                let _ = verifpal_engine::verify(&model, &config);
            }
        }
    }
});
