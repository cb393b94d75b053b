#![no_main]

use libfuzzer_sys::fuzz_target;
use testlens_core::parser::parse_reader;

fuzz_target!(|data: &[u8]| {
    // Aggregation may reject the input but must never panic
    if let Ok(result) = parse_reader(data) {
        for package in &result.packages {
            for pair in package.testcases.windows(2) {
                assert!(
                    testlens_core::ordering::compare_test_names(&pair[0].name, &pair[1].name)
                        .is_le()
                );
            }
        }
    }
});
