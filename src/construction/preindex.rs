//! Preindex: a sorted, deduplicated intermediate built from one or more
//! journal shards.
//!
//! A preindex lives in three sibling temp files sharing one unique stem:
//!
//! - `*.words`  ascending term ids
//! - `*.counts` postings per term, parallel to `*.words`
//! - `*.docs`   `(doc id, meta)` pairs, grouped by term in term order
//!
//! Preindexes are created by [`Preindex::construct`], combined pairwise by
//! [`Preindex::merge`] and turned into the final files by
//! [`Preindex::finalize_index`]. Between steps they are parked as a
//! [`PreindexReference`], which holds no mappings.

use crate::algo::SearchBackend;
use crate::btree::region::write_words;
use crate::btree::{DOCS_CONTEXT, WORDS_CONTEXT, WordRegion, write_btree};
use crate::construction::DocIdRewriter;
use crate::error::{IndexError, Result};
use crate::index::types::{TermId, combine_meta};
use crate::journal::JournalEntry;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The three backing files of a preindex. Removed on drop unless deleted
/// explicitly first.
#[derive(Debug)]
struct PreindexFiles {
    words: PathBuf,
    counts: PathBuf,
    docs: PathBuf,
    live: bool,
}

impl PreindexFiles {
    /// Reserve a unique stem in `tmp_dir` and create all three files
    fn create(tmp_dir: &Path) -> Result<(Self, [File; 3])> {
        let (words_file, words) = tempfile::Builder::new()
            .prefix("preindex-")
            .suffix(".words")
            .tempfile_in(tmp_dir)?
            .keep()
            .map_err(|e| e.error)?;

        let files = Self {
            counts: words.with_extension("counts"),
            docs: words.with_extension("docs"),
            words,
            live: true,
        };
        let counts_file = File::create_new(&files.counts)?;
        let docs_file = File::create_new(&files.docs)?;

        Ok((files, [words_file, counts_file, docs_file]))
    }

    fn paths(&self) -> [&Path; 3] {
        [&self.words, &self.counts, &self.docs]
    }

    /// Remove all three files, reporting the first failure
    fn delete(mut self) -> Result<()> {
        self.live = false;
        let mut first_err = None;
        for path in self.paths() {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound && first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for PreindexFiles {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        log::debug!("Removing abandoned preindex {}", self.words.display());
        for path in self.paths() {
            let _ = fs::remove_file(path);
        }
    }
}

/// A preindex parked on disk with no open mappings.
///
/// Move-only: exactly one owner may open or discard it.
#[derive(Debug)]
pub struct PreindexReference {
    files: PreindexFiles,
}

impl PreindexReference {
    pub fn open(self) -> Result<Preindex> {
        Preindex::open_files(self.files)
    }

    /// Remove the backing files without opening them
    pub fn delete(self) -> Result<()> {
        self.files.delete()
    }

    pub fn words_path(&self) -> &Path {
        &self.files.words
    }
}

/// Size summary of a finished index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub terms: usize,
    pub postings: usize,
    pub words_bytes: u64,
    pub docs_bytes: u64,
}

/// An open preindex, mapped read-only
pub struct Preindex {
    words: WordRegion,
    counts: WordRegion,
    docs: WordRegion,
    /// Word offset of each term's postings within `docs`, plus a final end offset
    offsets: Vec<usize>,
    files: PreindexFiles,
}

impl Preindex {
    /// Build a preindex from one shard's entries.
    ///
    /// Doc ids pass through `rewriter` first. Postings are grouped by term,
    /// sorted by doc id, and repeated `(term, doc)` pairs are OR-combined.
    pub fn construct<I, R>(
        entries: I,
        rewriter: &R,
        tmp_dir: &Path,
        backend: &dyn SearchBackend,
    ) -> Result<Preindex>
    where
        I: IntoIterator<Item = Result<JournalEntry>>,
        R: DocIdRewriter + ?Sized,
    {
        let mut grouped: FxHashMap<TermId, Vec<u64>> = FxHashMap::default();
        for entry in entries {
            let entry = entry?;
            let doc_id = rewriter.rewrite(entry.doc_id);
            for (term, meta) in entry.terms {
                grouped.entry(term).or_default().extend_from_slice(&[doc_id, meta]);
            }
        }

        let mut grouped: Vec<(TermId, Vec<u64>)> = grouped.into_iter().collect();
        grouped.sort_unstable_by_key(|(term, _)| *term);

        let mut writer = PreindexWriter::create(tmp_dir)?;
        for (term, mut postings) in grouped {
            backend.sort_128(&mut postings);
            combine_duplicate_docs(&mut postings);
            writer.push_term(term, &postings)?;
        }
        writer.finish()
    }

    /// Union of two preindexes. A document under the same term in both has
    /// its metadata OR-combined. Neither input is modified.
    pub fn merge(tmp_dir: &Path, left: &Preindex, right: &Preindex) -> Result<Preindex> {
        let mut writer = PreindexWriter::create(tmp_dir)?;
        let (lt, rt) = (left.terms(), right.terms());
        let (mut i, mut j) = (0, 0);
        let mut merged = Vec::new();

        loop {
            match (lt.get(i), rt.get(j)) {
                (Some(&a), Some(&b)) if a < b => {
                    writer.push_term(a, left.postings(i))?;
                    i += 1;
                }
                (Some(&a), Some(&b)) if a > b => {
                    writer.push_term(b, right.postings(j))?;
                    j += 1;
                }
                (Some(&a), Some(_)) => {
                    merged.clear();
                    merge_postings(left.postings(i), right.postings(j), &mut merged);
                    writer.push_term(a, &merged)?;
                    i += 1;
                    j += 1;
                }
                (Some(&a), None) => {
                    writer.push_term(a, left.postings(i))?;
                    i += 1;
                }
                (None, Some(&b)) => {
                    writer.push_term(b, right.postings(j))?;
                    j += 1;
                }
                (None, None) => break,
            }
        }

        writer.finish()
    }

    /// Write the final postings file and term directory.
    ///
    /// Both are written to temp files beside their targets and renamed into
    /// place, postings first. Readers never observe a partial file.
    pub fn finalize_index(&self, docs_out: &Path, words_out: &Path) -> Result<FinalizeReport> {
        let mut directory = Vec::with_capacity(self.num_terms() * WORDS_CONTEXT.width);
        let mut offset = 0usize;

        let (docs_tmp, docs_bytes) = write_sibling(docs_out, |out| {
            for (i, &term) in self.terms().iter().enumerate() {
                directory.extend_from_slice(&[term, offset as u64]);
                offset += write_btree(out, &DOCS_CONTEXT, self.postings(i))?;
            }
            Ok(offset as u64 * 8)
        })?;

        let (words_tmp, words_bytes) = write_sibling(words_out, |out| {
            let written = write_btree(out, &WORDS_CONTEXT, &directory)?;
            Ok(written as u64 * 8)
        })?;

        // Nothing at the target paths changes until both files are complete.
        // The two renames are still separate steps, so generations that
        // replace a live index belong under fresh paths (see `IndexHandle`).
        docs_tmp.persist(docs_out).map_err(|e| e.error)?;
        words_tmp.persist(words_out).map_err(|e| e.error)?;

        Ok(FinalizeReport {
            terms: self.num_terms(),
            postings: self.num_postings(),
            words_bytes,
            docs_bytes,
        })
    }

    pub fn num_terms(&self) -> usize {
        self.words.len()
    }

    pub fn num_postings(&self) -> usize {
        self.docs.len() / 2
    }

    /// Ascending term ids
    pub fn terms(&self) -> &[TermId] {
        self.words.words()
    }

    /// Interleaved `(doc id, meta)` pairs of the `i`th term, ascending by doc id
    pub fn postings(&self, i: usize) -> &[u64] {
        &self.docs.words()[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Release the mappings and park the files
    pub fn close_to_reference(self) -> PreindexReference {
        PreindexReference { files: self.files }
    }

    /// Release the mappings and remove the files
    pub fn delete(self) -> Result<()> {
        let Preindex {
            words,
            counts,
            docs,
            files,
            ..
        } = self;
        drop((words, counts, docs));
        files.delete()
    }

    fn open_files(files: PreindexFiles) -> Result<Preindex> {
        let words = WordRegion::map(&files.words)?;
        let counts = WordRegion::map(&files.counts)?;
        let docs = WordRegion::map(&files.docs)?;

        if words.len() != counts.len() {
            return Err(IndexError::corrupt_file(
                &files.counts,
                format!("{} counts for {} terms", counts.len(), words.len()),
            ));
        }
        if words.words().windows(2).any(|w| w[0] >= w[1]) {
            return Err(IndexError::corrupt_file(&files.words, "terms not strictly ascending"));
        }

        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut end = 0usize;
        offsets.push(0);
        for &count in counts.words() {
            end = end.saturating_add((count as usize).saturating_mul(2));
            offsets.push(end);
        }
        if end != docs.len() {
            return Err(IndexError::corrupt_file(
                &files.docs,
                format!("counts cover {} words but file has {}", end, docs.len()),
            ));
        }

        Ok(Preindex {
            words,
            counts,
            docs,
            offsets,
            files,
        })
    }
}

impl std::fmt::Debug for Preindex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preindex")
            .field("words", &self.files.words)
            .field("terms", &self.num_terms())
            .field("postings", &self.num_postings())
            .finish()
    }
}

/// Streams terms into a new preindex, in ascending term order
struct PreindexWriter {
    files: PreindexFiles,
    words: BufWriter<File>,
    counts: BufWriter<File>,
    docs: BufWriter<File>,
    last_term: Option<TermId>,
}

impl PreindexWriter {
    fn create(tmp_dir: &Path) -> Result<Self> {
        let (files, [words, counts, docs]) = PreindexFiles::create(tmp_dir)?;
        Ok(Self {
            files,
            words: BufWriter::new(words),
            counts: BufWriter::new(counts),
            docs: BufWriter::new(docs),
            last_term: None,
        })
    }

    fn push_term(&mut self, term: TermId, postings: &[u64]) -> Result<()> {
        debug_assert!(self.last_term.is_none_or(|last| last < term));
        debug_assert!(postings.len() % 2 == 0);

        write_words(&mut self.words, &[term])?;
        write_words(&mut self.counts, &[(postings.len() / 2) as u64])?;
        write_words(&mut self.docs, postings)?;
        self.last_term = Some(term);
        Ok(())
    }

    fn finish(self) -> Result<Preindex> {
        let PreindexWriter {
            files,
            words,
            counts,
            docs,
            ..
        } = self;
        for out in [words, counts, docs] {
            out.into_inner().map_err(|e| e.into_error())?;
        }
        Preindex::open_files(files)
    }
}

/// Collapse runs of equal doc ids in sorted pairs, OR-ing their metadata
fn combine_duplicate_docs(pairs: &mut Vec<u64>) {
    let mut kept = 0;
    for read in 0..pairs.len() / 2 {
        let (doc, meta) = (pairs[2 * read], pairs[2 * read + 1]);
        if kept > 0 && pairs[2 * (kept - 1)] == doc {
            pairs[2 * (kept - 1) + 1] = combine_meta(pairs[2 * (kept - 1) + 1], meta);
        } else {
            pairs[2 * kept] = doc;
            pairs[2 * kept + 1] = meta;
            kept += 1;
        }
    }
    pairs.truncate(2 * kept);
}

/// Two-pointer union of sorted pairs
fn merge_postings(left: &[u64], right: &[u64], out: &mut Vec<u64>) {
    out.reserve(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        let (a, b) = (left[i], right[j]);
        if a < b {
            out.extend_from_slice(&left[i..i + 2]);
            i += 2;
        } else if a > b {
            out.extend_from_slice(&right[j..j + 2]);
            j += 2;
        } else {
            out.extend_from_slice(&[a, combine_meta(left[i + 1], right[j + 1])]);
            i += 2;
            j += 2;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
}

/// Write a synced temp file next to `target`, ready to be persisted over it
fn write_sibling<F>(target: &Path, write: F) -> Result<(NamedTempFile, u64)>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<u64>,
{
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;

    let bytes = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let bytes = write(&mut out)?;
        out.flush()?;
        bytes
    };
    tmp.as_file().sync_all()?;

    Ok((tmp, bytes))
}
