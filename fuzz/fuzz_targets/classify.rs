#![no_main]

use libfuzzer_sys::fuzz_target;
use procscope_core::{classify_batch, parse_batch};

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        if let Ok(batch) = parse_batch(sql) {
            let _ = classify_batch(&batch);
        }
    }
});
