//! Shared helpers for integration tests.

#![allow(dead_code)]

use rindex::algo::{SearchBackend, detect, scalar};
use rindex::construction::{
    BuildOutcome, FinalizeReport, ReverseIndexConstructor, identity_rewriter,
};
use rindex::index::{ReaderOptions, ReverseIndexReader};
use rindex::journal::{JournalFileSource, JournalWriter, allocate_journal_name};
use std::path::{Path, PathBuf};

/// One journal shard: (doc id, [(term id, meta)])
pub type Shard = Vec<(u64, Vec<(u64, u64)>)>;

pub fn write_shards(dir: &Path, shards: &[Shard]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    shards
        .iter()
        .enumerate()
        .map(|(i, shard)| {
            let path = allocate_journal_name(dir, i);
            let mut writer = JournalWriter::create(&path).unwrap();
            for (doc, terms) in shard {
                writer.put(*doc, 0, terms).unwrap();
            }
            writer.finish().unwrap();
            path
        })
        .collect()
}

pub struct BuiltIndex {
    pub words: PathBuf,
    pub docs: PathBuf,
    pub report: FinalizeReport,
}

impl BuiltIndex {
    pub fn reader(&self) -> ReverseIndexReader {
        self.reader_with(scalar())
    }

    pub fn reader_with(&self, backend: &'static dyn SearchBackend) -> ReverseIndexReader {
        ReverseIndexReader::open_with(
            &self.words,
            &self.docs,
            ReaderOptions {
                backend,
                ..ReaderOptions::default()
            },
        )
        .unwrap()
    }

    /// One reader per search backend; on CPUs without a vector unit both
    /// are scalar
    pub fn readers(&self) -> Vec<ReverseIndexReader> {
        vec![self.reader_with(scalar()), self.reader_with(detect())]
    }
}

/// Write `shards` under `root/journal` and build into `root/index`
pub fn build_index(root: &Path, shards: &[Shard]) -> BuiltIndex {
    let input = root.join("journal");
    let output = root.join("index");
    write_shards(&input, shards);
    std::fs::create_dir_all(&output).unwrap();

    let words = output.join("words.dat");
    let docs = output.join("docs.dat");
    let outcome = ReverseIndexConstructor::new(
        &docs,
        &words,
        root.join("tmp"),
        JournalFileSource,
        identity_rewriter(),
    )
    .create_reverse_index(&input)
    .unwrap();

    match outcome {
        BuildOutcome::Built(report) => BuiltIndex { words, docs, report },
        BuildOutcome::NoInput => panic!("no input in {}", input.display()),
    }
}
