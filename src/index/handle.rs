//! Swapping index generations under live readers.
//!
//! Queries take a snapshot with [`IndexHandle::current`] and keep using it
//! even if a new generation is installed meanwhile; the old files stay
//! mapped until the last snapshot is dropped.

use super::reader::{ReaderOptions, ReverseIndexReader};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub struct IndexHandle {
    current: ArcSwap<ReverseIndexReader>,
    options: ReaderOptions,
}

impl IndexHandle {
    /// Open the generation at `words`/`docs`; degraded if they do not exist yet
    pub fn open(words: &Path, docs: &Path, options: ReaderOptions) -> Result<Self> {
        let reader = ReverseIndexReader::open_with(words, docs, options)
            .with_context(|| format!("Failed to open reverse index {}", words.display()))?;
        Ok(Self {
            current: ArcSwap::from_pointee(reader),
            options,
        })
    }

    pub fn current(&self) -> Arc<ReverseIndexReader> {
        self.current.load_full()
    }

    /// Install the generation at `words`/`docs`; returns the previous reader.
    ///
    /// On failure the current generation keeps serving.
    pub fn switch_to(&self, words: &Path, docs: &Path) -> Result<Arc<ReverseIndexReader>> {
        let reader = ReverseIndexReader::open_with(words, docs, self.options)
            .with_context(|| format!("Failed to open new generation {}", words.display()))?;
        if !reader.is_ready() {
            anyhow::bail!("New generation {} is missing", words.display());
        }
        Ok(self.current.swap(Arc::new(reader)))
    }

    /// Install a new generation, then remove the previous generation's files
    /// if they differ from the new ones
    pub fn retire_and_switch(&self, words: &Path, docs: &Path) -> Result<()> {
        let old = self.switch_to(words, docs)?;
        log::info!("Switched reverse index to {}", words.display());

        for (old_path, new_path) in [(old.words_path(), words), (old.docs_path(), docs)] {
            if old_path == new_path || !old_path.exists() {
                continue;
            }
            fs::remove_file(old_path)
                .with_context(|| format!("Failed to remove retired {}", old_path.display()))?;
            log::debug!("Removed retired {}", old_path.display());
        }
        Ok(())
    }
}
