use crate::algo::SearchBackend;
use crate::btree::reader::DEFAULT_MERGE_RATIO;
use crate::btree::{
    BTreeHeader, BTreeReader, DOCS_CONTEXT, QueryStrategy, WORDS_CONTEXT, WordRegion,
};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::index::types::{DocId, TermId, TermMeta};
use crate::query::{
    LetThroughFilter, NoPassFilter, PostingsSource, QueryFilter, RejectFilter, RetainFilter,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Reader tuning
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub backend: &'static dyn SearchBackend,
    /// See [`QueryStrategy::choose`]
    pub merge_ratio: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            backend: crate::algo::detect(),
            merge_ratio: DEFAULT_MERGE_RATIO,
        }
    }
}

impl ReaderOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            backend: config.search_backend(),
            merge_ratio: config.query_merge_ratio,
        }
    }
}

/// Both final files, mapped and validated
struct LoadedIndex {
    words: WordRegion,
    docs: WordRegion,
}

/// Read side of a finished reverse index.
///
/// When either file is missing at open time the reader is *degraded*: every
/// query answers empty and a warning is logged on the first one. Corrupt
/// files are an error at open; once open, queries never fail.
pub struct ReverseIndexReader {
    loaded: Option<LoadedIndex>,
    words_path: PathBuf,
    docs_path: PathBuf,
    options: ReaderOptions,
    warned: AtomicBool,
}

impl ReverseIndexReader {
    pub fn open(words: &Path, docs: &Path) -> Result<Self> {
        Self::open_with(words, docs, ReaderOptions::default())
    }

    pub fn open_with(words: &Path, docs: &Path, options: ReaderOptions) -> Result<Self> {
        let loaded = if !words.exists() || !docs.exists() {
            log::info!(
                "Reverse index files not present ({}, {}), starting degraded",
                words.display(),
                docs.display()
            );
            None
        } else {
            log::info!("Switching reverse index");
            let (words_region, docs_region) =
                rayon::join(|| WordRegion::map(words), || WordRegion::map(docs));
            let loaded = LoadedIndex {
                words: words_region?,
                docs: docs_region?,
            };
            validate(&loaded, words, options.backend)?;
            Some(loaded)
        };

        Ok(Self {
            loaded,
            words_path: words.to_path_buf(),
            docs_path: docs.to_path_buf(),
            options,
            warned: AtomicBool::new(false),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn words_path(&self) -> &Path {
        &self.words_path
    }

    pub fn docs_path(&self) -> &Path {
        &self.docs_path
    }

    /// Directory store, or `None` (with a one-time warning) when degraded
    fn directory(&self) -> Option<(BTreeReader<'_>, &LoadedIndex)> {
        let Some(loaded) = &self.loaded else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                log::warn!("Reverse index is not ready, dropping queries");
            }
            return None;
        };
        let directory = BTreeReader::open_trusted(
            loaded.words.words(),
            0,
            WORDS_CONTEXT,
            self.options.backend,
        );
        Some((directory, loaded))
    }

    /// Postings store of `term_id`, if the term is indexed
    fn postings(&self, term_id: TermId) -> Option<BTreeReader<'_>> {
        let (directory, loaded) = self.directory()?;
        let entry = directory.find_entry(term_id)?;
        let offset = directory.record(entry)[1] as usize;
        Some(BTreeReader::open_trusted(
            loaded.docs.words(),
            offset,
            DOCS_CONTEXT,
            self.options.backend,
        ))
    }

    /// Documents containing the term, ascending
    pub fn documents(&self, term_id: TermId) -> PostingsSource<'_> {
        match self.postings(term_id) {
            Some(postings) => PostingsSource::new(term_id, &postings),
            None => PostingsSource::empty(term_id),
        }
    }

    /// Filter passing documents that contain the term. An unindexed term
    /// passes nothing.
    pub fn retain_filter(&self, term_id: TermId) -> Box<dyn QueryFilter + '_> {
        match self.postings(term_id) {
            Some(postings) => Box::new(RetainFilter::new(term_id, postings)),
            None => Box::new(NoPassFilter),
        }
    }

    /// Filter passing documents that do not contain the term. An unindexed
    /// term passes everything.
    pub fn reject_filter(&self, term_id: TermId) -> Box<dyn QueryFilter + '_> {
        match self.postings(term_id) {
            Some(postings) => Box::new(RejectFilter::new(term_id, postings)),
            None => Box::new(LetThroughFilter),
        }
    }

    /// Intersect with the term; alias of [`Self::retain_filter`]
    pub fn also(&self, term_id: TermId) -> Box<dyn QueryFilter + '_> {
        self.retain_filter(term_id)
    }

    /// Subtract the term; alias of [`Self::reject_filter`]
    pub fn not(&self, term_id: TermId) -> Box<dyn QueryFilter + '_> {
        self.reject_filter(term_id)
    }

    /// Number of documents containing the term
    pub fn num_documents(&self, term_id: TermId) -> usize {
        self.postings(term_id).map_or(0, |p| p.num_entries())
    }

    /// Metadata of the term in each of `doc_ids`, 0 where the term is absent.
    ///
    /// `doc_ids` must be strictly ascending; debug builds panic otherwise.
    pub fn get_term_meta(&self, term_id: TermId, doc_ids: &[DocId]) -> Vec<TermMeta> {
        debug_assert!(
            doc_ids.windows(2).all(|w| w[0] < w[1]),
            "doc ids must be strictly ascending"
        );

        match self.postings(term_id) {
            Some(postings) => {
                let strategy = QueryStrategy::choose(
                    doc_ids.len(),
                    postings.num_entries(),
                    self.options.merge_ratio,
                );
                postings.query_data_with(doc_ids, 1, strategy)
            }
            None => vec![0; doc_ids.len()],
        }
    }

    /// Number of indexed terms
    pub fn num_terms(&self) -> usize {
        self.directory().map_or(0, |(d, _)| d.num_entries())
    }

    /// `(term id, document count)` for every indexed term, ascending by term
    pub fn term_counts(&self) -> Vec<(TermId, usize)> {
        let Some((directory, loaded)) = self.directory() else {
            return Vec::new();
        };
        (0..directory.num_entries())
            .map(|i| {
                let record = directory.record(i);
                let postings = BTreeReader::open_trusted(
                    loaded.docs.words(),
                    record[1] as usize,
                    DOCS_CONTEXT,
                    self.options.backend,
                );
                (record[0], postings.num_entries())
            })
            .collect()
    }

    /// Bytes of (words, docs) mapped
    pub fn size_bytes(&self) -> (u64, u64) {
        self.loaded
            .as_ref()
            .map_or((0, 0), |l| (l.words.size_bytes(), l.docs.size_bytes()))
    }
}

impl std::fmt::Debug for ReverseIndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseIndexReader")
            .field("words_path", &self.words_path)
            .field("docs_path", &self.docs_path)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Check the directory and every postings header it points at, so queries
/// can open stores without re-validating
fn validate(
    loaded: &LoadedIndex,
    words_path: &Path,
    backend: &'static dyn SearchBackend,
) -> Result<()> {
    let words = loaded.words.words();
    let docs = loaded.docs.words();

    let directory = BTreeReader::open(words, 0, WORDS_CONTEXT, backend)?;
    if directory.size_words() != words.len() {
        return Err(IndexError::corrupt_file(
            words_path,
            format!(
                "directory covers {} of {} words",
                directory.size_words(),
                words.len()
            ),
        ));
    }

    (0..directory.num_entries()).into_par_iter().try_for_each(|i| {
        let record = directory.record(i);
        if i > 0 && directory.key_at(i - 1) >= record[0] {
            return Err(IndexError::corrupt_file(words_path, "terms not strictly ascending"));
        }
        let offset = usize::try_from(record[1]).unwrap_or(usize::MAX);
        BTreeHeader::read(docs, offset, &DOCS_CONTEXT).map(|_| ())
    })
}
