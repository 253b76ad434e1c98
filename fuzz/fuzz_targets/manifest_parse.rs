#![no_main]

use libfuzzer_sys::fuzz_target;

use waygate_manifest::{is_manifest_payload, parse_manifest};

// The parser must never panic, whatever the gateway serves; recovery may
// reduce the manifest but a parsed result must stay internally consistent.
fuzz_target!(|data: &[u8]| {
    let _ = is_manifest_payload(data);
    if let Ok(parsed) = parse_manifest(data) {
        for path in parsed.manifest.paths.keys() {
            assert!(!path.starts_with('/'));
            assert!(!path.is_empty());
        }
        if let Some(index) = &parsed.manifest.index {
            if let Some(path) = &index.path {
                assert!(parsed.manifest.paths.contains_key(path));
            }
        }
    }
});
