//! Fuzz target for group extraction.
//!
//! Splits the input on `0xFF` into payloads, alternating JSON and CSV
//! declarations, and checks that every task leaves `extract` with a
//! terminal outcome and that batched rows add up to the batch length.
//!
//! Run with: `cargo +nightly fuzz run fuzz_extract`

#![no_main]
use infer_adapters::{DataframeInput, InferenceTask};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(adapter) = DataframeInput::builder().build() else {
        return;
    };
    let mut tasks: Vec<InferenceTask> = data
        .split(|b| *b == 0xFF)
        .enumerate()
        .map(|(i, chunk)| {
            if i % 2 == 0 {
                InferenceTask::from_json(chunk.to_vec())
            } else {
                InferenceTask::from_csv(chunk.to_vec())
            }
        })
        .collect();

    let batch = adapter.extract(&mut tasks);

    assert!(tasks.iter().all(|t| !t.is_pending()));
    let rows: usize = tasks.iter().filter_map(|t| t.batched_rows()).sum();
    assert_eq!(batch.map_or(0, |b| b.len()), rows);
});
