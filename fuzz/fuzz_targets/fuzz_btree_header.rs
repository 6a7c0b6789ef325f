#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rindex::algo::scalar;
use rindex::btree::{BTreeReader, DOCS_CONTEXT};

#[derive(Arbitrary, Debug)]
struct Input {
    words: Vec<u64>,
    offset: u8,
    probes: Vec<u64>,
}

fuzz_target!(|input: Input| {
    // Any store that passes validation must be safe to query
    let offset = input.offset as usize;
    if let Ok(reader) = BTreeReader::open(&input.words, offset, DOCS_CONTEXT, scalar()) {
        let mut probes = input.probes;
        probes.sort_unstable();
        probes.dedup();

        for &probe in &probes {
            let _ = reader.find_entry(probe);
        }
        let _ = reader.query_data(&probes, 1);
        let _ = reader.keys().count();
    }
});
