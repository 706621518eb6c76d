// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use locoqc_spec::{JsonSpecificationSource, SpecificationStore};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = locoqc_core::engine_config_from_json(text);

    let Ok(source) = JsonSpecificationSource::from_json_str(text) else {
        return;
    };
    let Ok(store) = SpecificationStore::from_source(&source) else {
        return;
    };
    for range in store.snapshot().iter() {
        assert!(range.min <= range.max, "store accepted inverted range {}", range.key);
    }

    let exported = store
        .to_wire()
        .to_json_pretty()
        .expect("a loaded store must serialize");
    let reloaded = JsonSpecificationSource::from_json_str(&exported)
        .and_then(|source| SpecificationStore::from_source(&source))
        .expect("an exported store must reload");
    assert_eq!(*reloaded.snapshot(), *store.snapshot());
});
