//! Index journal: the unsorted input to index construction.
//!
//! A journal shard is a file named `page-index-NNNN.dat` holding
//! document-major entries, all little-endian `u64` words:
//!
//! ```text
//! magic "RIDXJRN1"
//! entry count
//! repeated entry count times:
//!   doc id, doc meta, term count
//!   term count x (term id, term meta)
//! ```
//!
//! The constructor reads journals through [`JournalSource`], so other input
//! formats can be plugged in without touching the pipeline.

use crate::error::{IndexError, Result};
use crate::index::types::{DocId, TermId, TermMeta};
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const JOURNAL_MAGIC: u64 = u64::from_le_bytes(*b"RIDXJRN1");

/// Upper bound on terms per document, guards against reading garbage counts
pub const MAX_TERMS_PER_DOCUMENT: u64 = 1 << 24;

const JOURNAL_NAME_PATTERN: &str = r"^page-index-(\d{4,})\.dat$";

fn journal_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(JOURNAL_NAME_PATTERN).expect("valid regex"))
}

/// Path of journal shard `index` under `base_dir`
pub fn allocate_journal_name(base_dir: &Path, index: usize) -> PathBuf {
    base_dir.join(format!("page-index-{:04}.dat", index))
}

/// All journal shards under `base_dir`, ordered by shard number
pub fn find_journal_files(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();

    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = journal_name_pattern().captures(name) {
            if let Ok(number) = caps[1].parse::<u64>() {
                found.push((number, entry.path()));
            }
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// One document's worth of postings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub doc_id: DocId,
    pub doc_meta: u64,
    pub terms: Vec<(TermId, TermMeta)>,
}

/// Opens journal shards for the constructor
pub trait JournalSource: Sync {
    type Reader: Iterator<Item = Result<JournalEntry>>;

    fn open(&self, path: &Path) -> Result<Self::Reader>;
}

/// Reads shards in the on-disk journal format
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalFileSource;

impl JournalSource for JournalFileSource {
    type Reader = JournalReader<BufReader<File>>;

    fn open(&self, path: &Path) -> Result<Self::Reader> {
        JournalReader::open(path)
    }
}

/// Streaming reader over a journal shard
pub struct JournalReader<R: Read> {
    input: R,
    path: PathBuf,
    remaining: u64,
    failed: bool,
}

impl JournalReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::with_capacity(1 << 16, file), path)
    }
}

impl<R: Read> JournalReader<R> {
    pub fn new(mut input: R, path: &Path) -> Result<Self> {
        let bad = |reason: &str| IndexError::Journal {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let magic = read_word(&mut input).map_err(|_| bad("missing header"))?;
        if magic != JOURNAL_MAGIC {
            return Err(bad("bad magic"));
        }
        let remaining = read_word(&mut input).map_err(|_| bad("missing entry count"))?;

        Ok(Self {
            input,
            path: path.to_path_buf(),
            remaining,
            failed: false,
        })
    }

    /// Entries not yet read
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn read_entry(&mut self) -> Result<JournalEntry> {
        let truncated = |path: &Path| IndexError::Journal {
            path: path.to_path_buf(),
            reason: "truncated entry".to_string(),
        };

        let doc_id = read_word(&mut self.input).map_err(|_| truncated(&self.path))?;
        let doc_meta = read_word(&mut self.input).map_err(|_| truncated(&self.path))?;
        let count = read_word(&mut self.input).map_err(|_| truncated(&self.path))?;

        if count > MAX_TERMS_PER_DOCUMENT {
            return Err(IndexError::Journal {
                path: self.path.clone(),
                reason: format!("document {} claims {} terms", doc_id, count),
            });
        }

        // The count is untrusted until the terms are actually read
        let mut terms = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let term = read_word(&mut self.input).map_err(|_| truncated(&self.path))?;
            let meta = read_word(&mut self.input).map_err(|_| truncated(&self.path))?;
            terms.push((term, meta));
        }

        Ok(JournalEntry {
            doc_id,
            doc_meta,
            terms,
        })
    }
}

impl<R: Read> Iterator for JournalReader<R> {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        self.remaining -= 1;

        let entry = self.read_entry();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}

fn read_word<R: Read>(input: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Writes a journal shard. The entry count is patched in by [`JournalWriter::finish`].
pub struct JournalWriter {
    out: BufWriter<File>,
    entries: u64,
}

impl JournalWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&JOURNAL_MAGIC.to_le_bytes())?;
        out.write_all(&0u64.to_le_bytes())?;
        Ok(Self { out, entries: 0 })
    }

    pub fn put(
        &mut self,
        doc_id: DocId,
        doc_meta: u64,
        terms: &[(TermId, TermMeta)],
    ) -> Result<()> {
        self.out.write_all(&doc_id.to_le_bytes())?;
        self.out.write_all(&doc_meta.to_le_bytes())?;
        self.out.write_all(&(terms.len() as u64).to_le_bytes())?;
        for &(term, meta) in terms {
            self.out.write_all(&term.to_le_bytes())?;
            self.out.write_all(&meta.to_le_bytes())?;
        }
        self.entries += 1;
        Ok(())
    }

    /// Flush and record the entry count; returns it
    pub fn finish(mut self) -> Result<u64> {
        self.out.flush()?;
        let mut file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(8))?;
        file.write_all(&self.entries.to_le_bytes())?;
        file.sync_all()?;
        Ok(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = allocate_journal_name(dir.path(), 0);

        let mut writer = JournalWriter::create(&path).unwrap();
        writer.put(5, 1, &[(100, 0b01), (200, 0b10)]).unwrap();
        writer.put(9, 2, &[]).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let entries: Vec<JournalEntry> = JournalReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].terms, vec![(100, 0b01), (200, 0b10)]);
        assert_eq!(entries[1].doc_id, 9);
        assert!(entries[1].terms.is_empty());
    }

    #[test]
    fn test_truncated_journal_reports_error() {
        let dir = tempdir().unwrap();
        let path = allocate_journal_name(dir.path(), 1);

        let mut writer = JournalWriter::create(&path).unwrap();
        writer.put(5, 0, &[(100, 1), (101, 1)]).unwrap();
        writer.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let results: Vec<Result<JournalEntry>> = JournalReader::open(&path).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(IndexError::Journal { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page-index-0000.dat");
        fs::write(&path, [0u8; 16]).unwrap();
        assert!(JournalReader::open(&path).is_err());
    }

    #[test]
    fn test_find_journal_files_orders_by_number() {
        let dir = tempdir().unwrap();
        for name in [
            "page-index-0010.dat",
            "page-index-0002.dat",
            "page-index-12345.dat",
            "page-index-1.dat",
            "notes.txt",
            "page-index-0003.dat.tmp",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("page-index-0000.dat")).unwrap();

        let found: Vec<String> = find_journal_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            found,
            vec!["page-index-0002.dat", "page-index-0010.dat", "page-index-12345.dat"]
        );
    }
}
