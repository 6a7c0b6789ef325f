use super::region::write_words;
use super::{BTreeContext, BTreeHeader};
use crate::error::{IndexError, Result};
use std::io::Write;

/// Words a store of `entries` records occupies on disk
pub fn store_size_words(ctx: &BTreeContext, entries: usize) -> usize {
    BTreeHeader::new(ctx, entries).store_words()
}

/// Write one store holding `records` (interleaved, `ctx.width` words each).
///
/// Keys must be strictly ascending. Input is never sorted or deduplicated
/// here; a violation is reported as [`IndexError::InvalidInput`].
///
/// Returns the number of words written.
pub fn write_btree<W: Write>(out: &mut W, ctx: &BTreeContext, records: &[u64]) -> Result<usize> {
    if records.len() % ctx.width != 0 {
        return Err(IndexError::InvalidInput(format!(
            "{} words is not a whole number of width-{} records",
            records.len(),
            ctx.width
        )));
    }

    let entries = records.len() / ctx.width;
    let mut prev: Option<u64> = None;
    for (i, record) in records.chunks_exact(ctx.width).enumerate() {
        let key = record[0];
        if prev.is_some_and(|p| p >= key) {
            return Err(IndexError::InvalidInput(format!(
                "key {} at entry {} is not greater than its predecessor",
                key, i
            )));
        }
        prev = Some(key);
    }

    let header = BTreeHeader::new(ctx, entries);
    write_words(out, &header.to_words())?;

    let index: Vec<u64> = (0..ctx.index_words(entries))
        .map(|block| {
            let last = ((block + 1) * ctx.block_entries).min(entries) - 1;
            records[last * ctx.width]
        })
        .collect();
    write_words(out, &index)?;
    write_words(out, records)?;

    Ok(header.store_words())
}
