//! Memory-mapped `u64` word arrays.
//!
//! Files are mapped read-only and viewed as `&[u64]`; callers address them
//! with word indices only, never raw pointers.

use crate::error::{IndexError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

enum Backing {
    Mapped(Mmap),
    /// Zero-length files cannot be mapped on every platform
    Empty,
    Owned(Vec<u64>),
}

/// A read-only array of words backed by a file mapping or an owned buffer
pub struct WordRegion {
    backing: Backing,
    path: Option<PathBuf>,
}

impl WordRegion {
    /// Map a file. Its length must be a whole number of words.
    pub fn map(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        if len % 8 != 0 {
            return Err(IndexError::corrupt_file(
                path,
                format!("length {} is not a multiple of 8", len),
            ));
        }

        let backing = if len == 0 {
            Backing::Empty
        } else {
            // SAFETY: index files are immutable once written; nothing truncates
            // them while mapped
            let mmap = unsafe { Mmap::map(&file)? };
            if bytemuck::try_cast_slice::<u8, u64>(&mmap).is_err() {
                return Err(IndexError::corrupt_file(path, "mapping is not word aligned"));
            }
            Backing::Mapped(mmap)
        };

        Ok(Self {
            backing,
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory word buffer
    pub fn from_vec(words: Vec<u64>) -> Self {
        Self {
            backing: Backing::Owned(words),
            path: None,
        }
    }

    pub fn words(&self) -> &[u64] {
        match &self.backing {
            // Alignment and length were checked in map()
            Backing::Mapped(mmap) => bytemuck::cast_slice(&mmap[..]),
            Backing::Empty => &[],
            Backing::Owned(words) => words,
        }
    }

    pub fn len(&self) -> usize {
        self.words().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the region in bytes
    pub fn size_bytes(&self) -> u64 {
        self.len() as u64 * 8
    }
}

impl std::fmt::Debug for WordRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordRegion")
            .field("path", &self.path)
            .field("words", &self.len())
            .finish()
    }
}

/// Write words as little-endian bytes
pub fn write_words<W: std::io::Write>(out: &mut W, words: &[u64]) -> std::io::Result<()> {
    out.write_all(bytemuck::cast_slice(words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_map_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("words.bin");
        let mut file = File::create(&path).unwrap();
        write_words(&mut file, &[1, 2, u64::MAX]).unwrap();
        file.flush().unwrap();

        let region = WordRegion::map(&path).unwrap();
        assert_eq!(region.words(), &[1, 2, u64::MAX]);
        assert_eq!(region.size_bytes(), 24);
    }

    #[test]
    fn test_map_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        File::create(&path).unwrap();

        let region = WordRegion::map(&path).unwrap();
        assert!(region.is_empty());
    }

    #[test]
    fn test_map_rejects_partial_word() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("odd.bin");
        std::fs::write(&path, [0u8; 12]).unwrap();

        let err = WordRegion::map(&path).unwrap_err();
        assert!(err.is_corruption());
    }
}
