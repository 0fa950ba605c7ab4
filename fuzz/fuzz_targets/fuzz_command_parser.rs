#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary host lines must parse or be rejected, never panic.
    let _ = peel_core::parse_line(data);
});
