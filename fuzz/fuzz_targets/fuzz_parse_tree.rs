#![no_main]

use confwatch::file::{self, FileFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing should return Result, never panic
    for format in [FileFormat::Json, FileFormat::Toml, FileFormat::Yaml] {
        if let Ok(tree) = file::parse_str(text, format) {
            let _ = tree.digest();
            let _ = tree.flattened_paths();
        }
    }
});
