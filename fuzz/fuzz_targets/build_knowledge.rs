#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(ast) = verifpal_syntax::parse(s) {
            if let Ok(model) = verifpal_model::lower(&ast, "fuzz.vp") {
                let _ = verifpal_model::sanity(&model);
            }
        }
    }
});
