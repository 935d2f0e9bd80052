//! Fuzz target for multipart upload parsing.
//!
//! Sends arbitrary bodies as `multipart/form-data` and verifies task
//! construction never panics.
//!
//! Run with: `cargo +nightly fuzz run fuzz_multipart`

#![no_main]
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use infer_adapters::transport::{task_from_http_request, HttpRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=fuzz"),
    );
    let request = HttpRequest::new(headers, Bytes::copy_from_slice(data));
    let _ = futures::executor::block_on(task_from_http_request(request));
});
