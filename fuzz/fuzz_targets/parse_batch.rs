#![no_main]

use libfuzzer_sys::fuzz_target;
use procscope_core::parse_batch;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let _ = parse_batch(sql);
    }
});
