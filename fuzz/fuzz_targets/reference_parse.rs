#![no_main]

use libfuzzer_sys::fuzz_target;

use waygate_core::{ContentReference, TxId};

// Reference parsing must never panic, and anything that parses must
// round-trip through its display form.
fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let _ = raw.parse::<TxId>();
        if let Ok(reference) = raw.parse::<ContentReference>() {
            let rendered = reference.to_string();
            let reparsed: ContentReference = rendered.parse().expect("display form reparses");
            assert_eq!(reparsed, reference);
        }
    }
});
