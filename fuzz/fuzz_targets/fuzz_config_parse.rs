//! Fuzz target for TOML adapter configuration.
//!
//! Feeds arbitrary text to `DataframeInputConfig::from_toml()` and, when it
//! parses, to `DataframeInput::from_config()`. Errors are fine, panics are not.
//!
//! Run with: `cargo +nightly fuzz run fuzz_config_parse`

#![no_main]
use infer_adapters::{DataframeInput, DataframeInputConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = DataframeInputConfig::from_toml(s) {
            let _ = DataframeInput::from_config(&config);
        }
    }
});
