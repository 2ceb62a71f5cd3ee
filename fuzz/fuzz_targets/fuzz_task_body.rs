//! Fuzz target: validation of inbound task bodies.
//!
//! Arbitrary bytes go through the same parse / type / href checks the
//! handler runs. Errors are expected; panics are not.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_gateway::routes::{callback_base, parse_body, task_kind};

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = parse_body(data) {
        assert!(!body.is_null(), "null bodies must be reported as missing");
        if task_kind(&body).is_ok() {
            let _ = callback_base(&body);
        }
    }
});
