#![no_main]

use libfuzzer_sys::fuzz_target;
use sqlforge_core::parse_queries;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = parse_queries(source);
    }
});
