#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(model) = verifpal_syntax::parse(s) {
            let printed = verifpal_syntax::pretty_print(&model);
            let reparsed = verifpal_syntax::parse(&printed).expect("pretty output must parse");
            assert_eq!(printed, verifpal_syntax::pretty_print(&reparsed));
        }
    }
});
