//! Fuzz target: self-URL derivation from forwarded headers.

#![no_main]

use axum::http::{header::HOST, HeaderMap, HeaderValue, Uri};
use libfuzzer_sys::fuzz_target;
use relay_gateway::routes::request_url;

fuzz_target!(|data: (&[u8], &[u8], &str)| {
    let (proto, host, path) = data;
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_bytes(proto) {
        headers.insert("x-forwarded-proto", v);
    }
    if let Ok(v) = HeaderValue::from_bytes(host) {
        headers.insert(HOST, v);
    }
    let uri: Uri = path.parse().unwrap_or_default();
    if let Ok(url) = request_url(&headers, &uri, None) {
        assert!(url.contains("://"), "derived URL must carry a scheme separator");
    }
});
