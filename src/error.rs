//! Error types for the storage layer.
//!
//! Storage code (block stores, preindex files, journals) returns [`IndexError`].
//! The construction pipeline and the CLI wrap these in `anyhow::Result` and
//! attach shard/phase context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Header of a block store failed validation when it was opened.
    #[error("corrupt block store header at word {offset}: {reason}")]
    CorruptHeader { offset: usize, reason: &'static str },

    /// A file exists but its contents are structurally unusable.
    #[error("corrupt file {}: {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    /// Caller broke a precondition (unsorted keys, duplicate keys, bad width).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("journal {}: {reason}", path.display())]
    Journal { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub fn corrupt_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::CorruptFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by on-disk data rather than the caller or the OS
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IndexError::CorruptHeader { .. }
                | IndexError::CorruptFile { .. }
                | IndexError::Journal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexError::CorruptHeader {
            offset: 12,
            reason: "bad magic",
        };
        assert_eq!(
            err.to_string(),
            "corrupt block store header at word 12: bad magic"
        );
        assert!(err.is_corruption());

        let err = IndexError::InvalidInput("keys not ascending".to_string());
        assert!(!err.is_corruption());
    }
}
