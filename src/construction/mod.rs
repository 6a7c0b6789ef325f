//! Reverse index construction.
//!
//! Every journal shard becomes a preindex in parallel; preindexes are merged
//! pairwise in whatever order rayon's reduction tree picks, and the single
//! survivor is finalized into `docs.dat` and `words.dat`. Merging is
//! commutative and associative, so the output does not depend on that order.

pub mod preindex;

pub use preindex::{FinalizeReport, Preindex, PreindexReference};

use crate::algo::SearchBackend;
use crate::config::IndexConfig;
use crate::index::types::DocId;
use crate::journal::{JournalSource, find_journal_files};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maps journal doc ids to the ids stored in the index
pub trait DocIdRewriter: Sync {
    fn rewrite(&self, doc_id: DocId) -> DocId;
}

impl<F> DocIdRewriter for F
where
    F: Fn(DocId) -> DocId + Sync,
{
    fn rewrite(&self, doc_id: DocId) -> DocId {
        self(doc_id)
    }
}

pub fn identity_rewriter() -> impl DocIdRewriter {
    |doc_id: DocId| doc_id
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionStep {
    Construct,
    Finalize,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// No journal shards were found; nothing was written
    NoInput,
    Built(FinalizeReport),
}

/// Cancels a running build. Shards not yet started are skipped; merges
/// already running finish, then the build fails without writing output.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type StepListener = Box<dyn Fn(ConstructionStep) + Send + Sync>;

pub struct ReverseIndexConstructor<S: JournalSource, R: DocIdRewriter> {
    output_docs: PathBuf,
    output_words: PathBuf,
    tmp_dir: PathBuf,
    source: S,
    rewriter: R,
    backend: &'static dyn SearchBackend,
    abort: AbortHandle,
    on_step: Option<StepListener>,
}

impl<S: JournalSource, R: DocIdRewriter> ReverseIndexConstructor<S, R> {
    pub fn new(
        output_docs: impl Into<PathBuf>,
        output_words: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
        source: S,
        rewriter: R,
    ) -> Self {
        Self {
            output_docs: output_docs.into(),
            output_words: output_words.into(),
            tmp_dir: tmp_dir.into(),
            source,
            rewriter,
            backend: crate::algo::detect(),
            abort: AbortHandle::new(),
            on_step: None,
        }
    }

    /// Constructor writing into `output_dir` with file names and temp
    /// directory taken from `config`
    pub fn from_config(config: &IndexConfig, output_dir: &Path, source: S, rewriter: R) -> Self {
        Self::new(
            config.docs_path(output_dir),
            config.words_path(output_dir),
            config.tmp_dir_for(output_dir),
            source,
            rewriter,
        )
        .with_backend(config.search_backend())
    }

    pub fn with_backend(mut self, backend: &'static dyn SearchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Called on every step transition, from the building thread
    pub fn with_step_listener(
        mut self,
        listener: impl Fn(ConstructionStep) + Send + Sync + 'static,
    ) -> Self {
        self.on_step = Some(Box::new(listener));
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Build from every journal shard in `source_dir`
    pub fn create_reverse_index(&self, source_dir: &Path) -> Result<BuildOutcome> {
        let inputs = find_journal_files(source_dir)
            .with_context(|| format!("Failed to list journal shards in {}", source_dir.display()))?;

        if inputs.is_empty() {
            log::error!("No journal files in base dir {}", source_dir.display());
            return Ok(BuildOutcome::NoInput);
        }

        self.build_from_paths(&inputs)
    }

    /// Build from an explicit list of shards
    pub fn build_from_paths(&self, inputs: &[PathBuf]) -> Result<BuildOutcome> {
        if inputs.is_empty() {
            return Ok(BuildOutcome::NoInput);
        }

        fs::create_dir_all(&self.tmp_dir)
            .with_context(|| format!("Failed to create temp dir {}", self.tmp_dir.display()))?;

        self.step(ConstructionStep::Construct);
        log::info!("Constructing preindexes from {} shards", inputs.len());

        let reduced = inputs
            .par_iter()
            .map(|path| self.construct(path))
            .try_reduce_with(|left, right| self.merge(left, right));

        let Some(merged) = reduced else {
            return Ok(BuildOutcome::NoInput);
        };
        let merged = merged?;

        if self.abort.is_aborted() {
            merged.delete().context("Failed to clean up after abort")?;
            bail!("Index construction aborted");
        }

        self.step(ConstructionStep::Finalize);
        let report = self.finalize(merged)?;

        self.step(ConstructionStep::Finished);
        log::info!(
            "Finished reverse index: {} terms, {} postings",
            report.terms,
            report.postings
        );
        Ok(BuildOutcome::Built(report))
    }

    fn step(&self, step: ConstructionStep) {
        log::debug!("Construction step {:?}", step);
        if let Some(listener) = &self.on_step {
            listener(step);
        }
    }

    fn construct(&self, path: &Path) -> Result<PreindexReference> {
        if self.abort.is_aborted() {
            bail!("Index construction aborted before shard {}", path.display());
        }

        let reader = self
            .source
            .open(path)
            .with_context(|| format!("CONSTRUCT: failed to open shard {}", path.display()))?;
        let preindex = Preindex::construct(reader, &self.rewriter, &self.tmp_dir, self.backend)
            .with_context(|| format!("CONSTRUCT: failed to index shard {}", path.display()))?;

        log::debug!(
            "Constructed preindex from {}: {} terms, {} postings",
            path.display(),
            preindex.num_terms(),
            preindex.num_postings()
        );
        Ok(preindex.close_to_reference())
    }

    /// Merge two preindexes; both inputs are deleted whether or not the merge succeeds
    fn merge(
        &self,
        left: PreindexReference,
        right: PreindexReference,
    ) -> Result<PreindexReference> {
        let left = left.open().context("MERGE: failed to open preindex")?;
        let right = right.open().context("MERGE: failed to open preindex")?;

        let merged = Preindex::merge(&self.tmp_dir, &left, &right);

        let cleanup = left.delete().and(right.delete());
        let merged = merged.context("MERGE: failed to merge preindexes")?;
        cleanup.context("MERGE: failed to delete merged inputs")?;

        log::debug!("Merged preindex: {} terms", merged.num_terms());
        Ok(merged.close_to_reference())
    }

    fn finalize(&self, merged: PreindexReference) -> Result<FinalizeReport> {
        let preindex = merged.open().context("FINALIZE: failed to open preindex")?;

        let report = preindex.finalize_index(&self.output_docs, &self.output_words);
        let cleanup = preindex.delete();

        let report = report.with_context(|| {
            format!(
                "FINALIZE: failed to write {} and {}",
                self.output_docs.display(),
                self.output_words.display()
            )
        })?;
        cleanup.context("FINALIZE: failed to delete preindex")?;

        Ok(report)
    }
}
