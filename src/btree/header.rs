use super::BTreeContext;
use crate::error::{IndexError, Result};

pub const BTREE_MAGIC: u64 = u64::from_le_bytes(*b"RIDXBT01");

/// Decoded store header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeHeader {
    pub context_tag: u64,
    pub entry_count: usize,
    pub record_width: usize,
    pub data_offset: usize,
}

impl BTreeHeader {
    /// Size of the header in words
    pub const WORDS: usize = 5;

    pub fn new(ctx: &BTreeContext, entry_count: usize) -> Self {
        Self {
            context_tag: ctx.tag,
            entry_count,
            record_width: ctx.width,
            data_offset: ctx.data_offset(entry_count),
        }
    }

    pub fn to_words(&self) -> [u64; Self::WORDS] {
        [
            BTREE_MAGIC,
            self.context_tag,
            self.entry_count as u64,
            self.record_width as u64,
            self.data_offset as u64,
        ]
    }

    /// Total words occupied by the store, header included
    pub fn store_words(&self) -> usize {
        self.data_offset + self.entry_count * self.record_width
    }

    /// Read and validate the header of the store starting at `offset`.
    ///
    /// Checks magic, context, width, the declared data offset and that the
    /// whole store fits inside `words`.
    pub fn read(words: &[u64], offset: usize, ctx: &BTreeContext) -> Result<Self> {
        let corrupt = |reason| IndexError::CorruptHeader { offset, reason };

        let raw = offset
            .checked_add(Self::WORDS)
            .and_then(|end| words.get(offset..end))
            .ok_or_else(|| corrupt("header extends past end of region"))?;

        if raw[0] != BTREE_MAGIC {
            return Err(corrupt("bad magic"));
        }
        if raw[1] != ctx.tag {
            return Err(corrupt("context tag mismatch"));
        }

        let entry_count = usize::try_from(raw[2]).map_err(|_| corrupt("entry count overflow"))?;
        let record_width = usize::try_from(raw[3]).map_err(|_| corrupt("record width overflow"))?;
        let data_offset = usize::try_from(raw[4]).map_err(|_| corrupt("data offset overflow"))?;

        if record_width != ctx.width {
            return Err(corrupt("record width mismatch"));
        }

        // Bound entry_count before doing arithmetic with it
        let available = words.len() - offset;
        if entry_count > available {
            return Err(corrupt("entry count exceeds region"));
        }
        if data_offset != ctx.data_offset(entry_count) {
            return Err(corrupt("data offset inconsistent with entry count"));
        }

        let store_words = entry_count
            .checked_mul(record_width)
            .and_then(|data| data.checked_add(data_offset))
            .ok_or_else(|| corrupt("store size overflow"))?;
        if store_words > available {
            return Err(corrupt("data region extends past end of region"));
        }

        Ok(Self {
            context_tag: raw[1],
            entry_count,
            record_width,
            data_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: BTreeContext = BTreeContext::new(9, 2, 4);

    fn store_words(entries: usize) -> Vec<u64> {
        let header = BTreeHeader::new(&CTX, entries);
        let mut words = header.to_words().to_vec();
        words.resize(header.store_words(), 0);
        words
    }

    #[test]
    fn test_header_round_trip() {
        let words = store_words(10);
        let header = BTreeHeader::read(&words, 0, &CTX).unwrap();
        assert_eq!(header.entry_count, 10);
        assert_eq!(header.record_width, 2);
        assert_eq!(header.data_offset, BTreeHeader::WORDS + 3);
        assert_eq!(header.store_words(), words.len());
    }

    #[test]
    fn test_header_at_offset() {
        let mut words = vec![0u64; 3];
        words.extend(store_words(2));
        assert!(BTreeHeader::read(&words, 3, &CTX).is_ok());
        assert!(BTreeHeader::read(&words, 0, &CTX).is_err());
    }

    #[test]
    fn test_header_rejects_inconsistencies() {
        let good = store_words(6);

        let mut bad_magic = good.clone();
        bad_magic[0] ^= 1;
        assert!(matches!(
            BTreeHeader::read(&bad_magic, 0, &CTX),
            Err(IndexError::CorruptHeader { reason: "bad magic", .. })
        ));

        let mut bad_tag = good.clone();
        bad_tag[1] = 10;
        assert!(BTreeHeader::read(&bad_tag, 0, &CTX).is_err());

        let mut bad_offset = good.clone();
        bad_offset[4] += 1;
        assert!(matches!(
            BTreeHeader::read(&bad_offset, 0, &CTX),
            Err(IndexError::CorruptHeader {
                reason: "data offset inconsistent with entry count",
                ..
            })
        ));

        let mut bad_count = good.clone();
        bad_count[2] = u64::MAX;
        assert!(BTreeHeader::read(&bad_count, 0, &CTX).is_err());

        let truncated = &good[..good.len() - 1];
        assert!(BTreeHeader::read(truncated, 0, &CTX).is_err());

        assert!(BTreeHeader::read(&good[..3], 0, &CTX).is_err());
    }
}
