//! Sorted block store ("btree") on-disk format.
//!
//! A store is a run of little-endian `u64` words and can sit at any word
//! offset inside a larger file; the postings file holds one store per term.
//!
//! ```text
//! word 0   magic            "RIDXBT01"
//! word 1   context tag      which kind of store this is
//! word 2   entry count      N
//! word 3   record width     W words per entry, W >= 1
//! word 4   data offset      relative to word 0
//! word 5.. block index      last key of each block of `block_entries` entries
//! data     N * W words      record word 0 is the key, keys strictly ascending
//! ```
//!
//! The header is validated once when a store is opened; lookups never
//! re-check it.

pub mod header;
pub mod reader;
pub mod region;
pub mod writer;

pub use header::BTreeHeader;
pub use reader::{BTreeReader, QueryStrategy};
pub use region::WordRegion;
pub use writer::{store_size_words, write_btree};

/// Shape of a family of stores, checked against each header on open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeContext {
    pub tag: u64,
    pub width: usize,
    pub block_entries: usize,
}

impl BTreeContext {
    pub const fn new(tag: u64, width: usize, block_entries: usize) -> Self {
        assert!(width >= 1 && block_entries >= 1);
        Self {
            tag,
            width,
            block_entries,
        }
    }

    /// Number of block index words for a store of `entries` records
    pub const fn index_words(&self, entries: usize) -> usize {
        entries.div_ceil(self.block_entries)
    }

    /// Data offset a well-formed store of `entries` records must declare
    pub const fn data_offset(&self, entries: usize) -> usize {
        BTreeHeader::WORDS + self.index_words(entries)
    }
}

/// Term directory: `(term id, postings offset in words)`
pub const WORDS_CONTEXT: BTreeContext = BTreeContext::new(0x5744_4952, 2, 64);

/// Per-term postings: `(document id, metadata word)`
pub const DOCS_CONTEXT: BTreeContext = BTreeContext::new(0x4344_4952, 2, 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_layout() {
        let ctx = BTreeContext::new(1, 2, 4);
        assert_eq!(ctx.index_words(0), 0);
        assert_eq!(ctx.index_words(4), 1);
        assert_eq!(ctx.index_words(5), 2);
        assert_eq!(ctx.data_offset(5), BTreeHeader::WORDS + 2);
    }
}
