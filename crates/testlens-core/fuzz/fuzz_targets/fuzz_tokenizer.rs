#![no_main]

use libfuzzer_sys::fuzz_target;
use testlens_core::tokenizer::Tokenizer;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes, including invalid UTF-8, must classify without error
    for event in Tokenizer::events(data) {
        assert!(event.is_ok());
    }
});
