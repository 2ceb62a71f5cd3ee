//! Fuzz target: decoding of durable promise values and invocations.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_core::{codec, EncodedValue, Invocation};

fuzz_target!(|data: &str| {
    let encoded = EncodedValue { headers: None, data: Some(data.to_owned()) };
    let _ = codec::decode(&encoded);
    let _ = Invocation::decode(&encoded);
});
