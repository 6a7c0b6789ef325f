//! Index configuration, loaded from JSON.
//!
//! Every field has a default, so an empty object `{}` is a valid config.

use crate::algo::{BackendChoice, SearchBackend};
use crate::btree::reader::DEFAULT_MERGE_RATIO;
use crate::index::types::{DOCS_FILE, WORDS_FILE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File name of the term directory within the index directory
    pub words_file: String,
    /// File name of the postings blob within the index directory
    pub docs_file: String,
    /// Where preindex temp files go; defaults to the output directory
    pub tmp_dir: Option<PathBuf>,
    pub backend: BackendChoice,
    /// Batch metadata lookups with fewer than `entries / ratio` ids use search
    pub query_merge_ratio: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            words_file: WORDS_FILE.to_string(),
            docs_file: DOCS_FILE.to_string(),
            tmp_dir: None,
            backend: BackendChoice::Auto,
            query_merge_ratio: DEFAULT_MERGE_RATIO,
        }
    }
}

impl IndexConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config {}", path.display()))?;
        let config: IndexConfig = serde_json::from_reader(file)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn words_path(&self, index_dir: &Path) -> PathBuf {
        index_dir.join(&self.words_file)
    }

    pub fn docs_path(&self, index_dir: &Path) -> PathBuf {
        index_dir.join(&self.docs_file)
    }

    pub fn tmp_dir_for(&self, output_dir: &Path) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(|| output_dir.to_path_buf())
    }

    pub fn search_backend(&self) -> &'static dyn SearchBackend {
        self.backend.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_object_is_default() {
        let config: IndexConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.words_file, WORDS_FILE);
        assert_eq!(config.docs_file, DOCS_FILE);
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.query_merge_ratio, DEFAULT_MERGE_RATIO);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"backend": "scalar", "tmp_dir": "/scratch"}"#).unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.backend, BackendChoice::Scalar);
        assert_eq!(
            config.tmp_dir_for(Path::new("/out")),
            PathBuf::from("/scratch")
        );
        assert_eq!(
            config.words_path(Path::new("/out")),
            PathBuf::from("/out/words.dat")
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(IndexConfig::load(&dir.path().join("nope.json")).is_err());
    }
}
