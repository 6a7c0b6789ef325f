#![no_main]

use libfuzzer_sys::fuzz_target;
use rindex::journal::JournalReader;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    // Journal parsing must fail cleanly on arbitrary bytes
    if let Ok(reader) = JournalReader::new(data, Path::new("page-index-0000.dat")) {
        for entry in reader.take(1024) {
            if entry.is_err() {
                break;
            }
        }
    }
});
