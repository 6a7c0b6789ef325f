use super::{BTreeContext, BTreeHeader};
use crate::algo::SearchBackend;
use crate::error::Result;

/// Iterator over the keys of a store, in ascending order
pub type KeyIter<'a> = std::iter::Copied<std::iter::StepBy<std::slice::Iter<'a, u64>>>;

/// Batch lookups with fewer than `entries / DEFAULT_MERGE_RATIO` keys use search
pub const DEFAULT_MERGE_RATIO: usize = 32;

/// How a batch of sorted keys is matched against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStrategy {
    /// One coordinated scan over both sorted sequences, O(N + M)
    Merge,
    /// A forward-moving binary search per key, O(M log N)
    Search,
}

impl QueryStrategy {
    /// Tuning only: both strategies return the same answers
    pub fn choose(query_len: usize, entries: usize, merge_ratio: usize) -> Self {
        if query_len.saturating_mul(merge_ratio.max(1)) < entries {
            QueryStrategy::Search
        } else {
            QueryStrategy::Merge
        }
    }
}

/// Read view of one store inside a word region
#[derive(Clone, Copy)]
pub struct BTreeReader<'a> {
    header: BTreeHeader,
    ctx: BTreeContext,
    index: &'a [u64],
    data: &'a [u64],
    backend: &'static dyn SearchBackend,
}

impl<'a> BTreeReader<'a> {
    /// Open the store at word `offset`, validating its header
    pub fn open(
        words: &'a [u64],
        offset: usize,
        ctx: BTreeContext,
        backend: &'static dyn SearchBackend,
    ) -> Result<Self> {
        let header = BTreeHeader::read(words, offset, &ctx)?;
        Ok(Self::from_header(words, offset, header, ctx, backend))
    }

    /// Open a store whose header has already been validated.
    ///
    /// Panics on a header that [`BTreeReader::open`] would have rejected.
    pub fn open_trusted(
        words: &'a [u64],
        offset: usize,
        ctx: BTreeContext,
        backend: &'static dyn SearchBackend,
    ) -> Self {
        debug_assert!(BTreeHeader::read(words, offset, &ctx).is_ok());
        let raw = &words[offset..offset + BTreeHeader::WORDS];
        let header = BTreeHeader {
            context_tag: raw[1],
            entry_count: raw[2] as usize,
            record_width: raw[3] as usize,
            data_offset: raw[4] as usize,
        };
        Self::from_header(words, offset, header, ctx, backend)
    }

    fn from_header(
        words: &'a [u64],
        offset: usize,
        header: BTreeHeader,
        ctx: BTreeContext,
        backend: &'static dyn SearchBackend,
    ) -> Self {
        let index_start = offset + BTreeHeader::WORDS;
        let data_start = offset + header.data_offset;
        let data_end = data_start + header.entry_count * header.record_width;
        Self {
            header,
            ctx,
            index: &words[index_start..data_start],
            data: &words[data_start..data_end],
            backend,
        }
    }

    pub fn header(&self) -> &BTreeHeader {
        &self.header
    }

    pub fn num_entries(&self) -> usize {
        self.header.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Words occupied by this store, header included
    pub fn size_words(&self) -> usize {
        self.header.store_words()
    }

    #[inline]
    pub fn key_at(&self, entry: usize) -> u64 {
        self.data[entry * self.ctx.width]
    }

    /// All words of one record; word 0 is the key
    #[inline]
    pub fn record(&self, entry: usize) -> &'a [u64] {
        let start = entry * self.ctx.width;
        &self.data[start..start + self.ctx.width]
    }

    pub fn keys(&self) -> KeyIter<'a> {
        self.data.iter().step_by(self.ctx.width).copied()
    }

    /// Entry index holding `key`, if present
    pub fn find_entry(&self, key: u64) -> Option<usize> {
        let entries = self.num_entries();
        if entries == 0 {
            return None;
        }

        let block = match self.backend.binary_search_64(key, self.index, 0, self.index.len()) {
            Ok(b) | Err(b) => b,
        };
        if block == self.index.len() {
            return None;
        }

        let start = block * self.ctx.block_entries;
        let end = (start + self.ctx.block_entries).min(entries);
        self.search_entries(key, start, end, true).ok()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.find_entry(key).is_some()
    }

    /// Search entries `[start, end)` with the backend matching the record width
    fn search_entries(
        &self,
        key: u64,
        start: usize,
        end: usize,
        linear: bool,
    ) -> std::result::Result<usize, usize> {
        match (self.ctx.width, linear) {
            (1, true) => self.backend.linear_search_64(key, self.data, start, end),
            (1, false) => self.backend.binary_search_64(key, self.data, start, end),
            (2, true) => self.backend.linear_search_128(key, self.data, start, end),
            (2, false) => self.backend.binary_search_128(key, self.data, start, end),
            _ => {
                let (mut lo, mut hi) = (start, end);
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.key_at(mid) < key {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                if lo < end && self.key_at(lo) == key { Ok(lo) } else { Err(lo) }
            }
        }
    }

    /// For each key, word `column` of its record, or 0 when absent.
    ///
    /// `keys` must be strictly ascending. This is checked only in debug builds.
    pub fn query_data(&self, keys: &[u64], column: usize) -> Vec<u64> {
        let strategy = QueryStrategy::choose(keys.len(), self.num_entries(), DEFAULT_MERGE_RATIO);
        self.query_data_with(keys, column, strategy)
    }

    pub fn query_data_with(
        &self,
        keys: &[u64],
        column: usize,
        strategy: QueryStrategy,
    ) -> Vec<u64> {
        assert!(
            column < self.ctx.width,
            "column {} out of record width",
            column
        );
        debug_assert!(
            keys.windows(2).all(|w| w[0] < w[1]),
            "query keys must be strictly ascending"
        );

        let mut out = vec![0u64; keys.len()];
        let width = self.ctx.width;
        self.for_each_match(keys, strategy, |i, entry| {
            out[i] = self.data[entry * width + column];
        });
        out
    }

    /// Calls `found(query_index, entry_index)` for every key present in the store
    fn for_each_match(
        &self,
        keys: &[u64],
        strategy: QueryStrategy,
        mut found: impl FnMut(usize, usize),
    ) {
        let entries = self.num_entries();
        let mut pos = 0;

        match strategy {
            QueryStrategy::Merge => {
                for (i, &key) in keys.iter().enumerate() {
                    while pos < entries && self.key_at(pos) < key {
                        pos += 1;
                    }
                    if pos == entries {
                        break;
                    }
                    if self.key_at(pos) == key {
                        found(i, pos);
                    }
                }
            }
            QueryStrategy::Search => {
                for (i, &key) in keys.iter().enumerate() {
                    if pos == entries {
                        break;
                    }
                    match self.search_entries(key, pos, entries, false) {
                        Ok(entry) => {
                            found(i, entry);
                            pos = entry;
                        }
                        Err(insert) => pos = insert,
                    }
                }
            }
        }
    }

    /// Keep only candidates present in the store. `candidates` must be sorted.
    pub fn retain_entries(&self, candidates: &mut Vec<u64>) {
        self.filter_candidates(candidates, true);
    }

    /// Drop candidates present in the store. `candidates` must be sorted.
    pub fn reject_entries(&self, candidates: &mut Vec<u64>) {
        self.filter_candidates(candidates, false);
    }

    fn filter_candidates(&self, candidates: &mut Vec<u64>, keep_present: bool) {
        debug_assert!(candidates.windows(2).all(|w| w[0] <= w[1]));

        let strategy =
            QueryStrategy::choose(candidates.len(), self.num_entries(), DEFAULT_MERGE_RATIO);
        let mut present = vec![false; candidates.len()];
        self.for_each_match(candidates, strategy, |i, _| present[i] = true);

        let mut flags = present.into_iter();
        candidates.retain(|_| flags.next() == Some(keep_present));
    }
}

impl std::fmt::Debug for BTreeReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTreeReader")
            .field("header", &self.header)
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{detect, scalar};
    use crate::btree::write_btree;
    use crate::error::IndexError;

    const CTX2: BTreeContext = BTreeContext::new(1, 2, 8);
    const CTX1: BTreeContext = BTreeContext::new(2, 1, 8);
    const CTX3: BTreeContext = BTreeContext::new(3, 3, 4);

    fn build(ctx: &BTreeContext, records: &[u64]) -> Vec<u64> {
        let mut buf = Vec::new();
        write_btree(&mut buf, ctx, records).unwrap();
        buf.chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    fn even_keys(n: u64) -> Vec<u64> {
        (0..n).flat_map(|i| [i * 2, i * 2 + 1000]).collect()
    }

    #[test]
    fn test_find_entry_all_widths() {
        let backends = [scalar(), detect()];
        for backend in backends {
            let words = build(&CTX2, &even_keys(100));
            let reader = BTreeReader::open(&words, 0, CTX2, backend).unwrap();
            assert_eq!(reader.num_entries(), 100);
            for i in 0..100u64 {
                assert_eq!(reader.find_entry(i * 2), Some(i as usize));
                assert_eq!(reader.find_entry(i * 2 + 1), None);
            }
            assert_eq!(reader.find_entry(10_000), None);

            let keys: Vec<u64> = (0..50).map(|i| i * 3).collect();
            let words = build(&CTX1, &keys);
            let reader = BTreeReader::open(&words, 0, CTX1, backend).unwrap();
            assert_eq!(reader.find_entry(27), Some(9));
            assert_eq!(reader.find_entry(28), None);

            let records: Vec<u64> = (0..20).flat_map(|i| [i * 5, i, i + 1]).collect();
            let words = build(&CTX3, &records);
            let reader = BTreeReader::open(&words, 0, CTX3, backend).unwrap();
            assert_eq!(reader.find_entry(45), Some(9));
            assert_eq!(reader.record(9), &[45, 9, 10]);
            assert_eq!(reader.find_entry(46), None);
        }
    }

    #[test]
    fn test_empty_store() {
        let words = build(&CTX2, &[]);
        let reader = BTreeReader::open(&words, 0, CTX2, scalar()).unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.find_entry(0), None);
        assert_eq!(reader.query_data(&[1, 2], 1), vec![0, 0]);
        assert_eq!(reader.keys().count(), 0);
    }

    #[test]
    fn test_open_rejects_corrupt_header() {
        let mut words = build(&CTX2, &even_keys(4));
        words[4] = 1;
        assert!(matches!(
            BTreeReader::open(&words, 0, CTX2, scalar()),
            Err(IndexError::CorruptHeader { .. })
        ));
        // Wrong context for the same bytes
        let words = build(&CTX2, &even_keys(4));
        assert!(BTreeReader::open(&words, 0, CTX1, scalar()).is_err());
    }

    #[test]
    fn test_query_data_strategies_agree() {
        let words = build(&CTX2, &even_keys(1000));
        let reader = BTreeReader::open(&words, 0, CTX2, detect()).unwrap();

        let queries: Vec<Vec<u64>> = vec![
            vec![],
            vec![0],
            vec![1, 2, 3, 1998, 1999, 5000],
            (0..3000).step_by(7).collect(),
            (0..2000).collect(),
        ];

        for keys in queries {
            let merged = reader.query_data_with(&keys, 1, QueryStrategy::Merge);
            let searched = reader.query_data_with(&keys, 1, QueryStrategy::Search);
            assert_eq!(merged, searched);
            for (&k, &v) in keys.iter().zip(&merged) {
                let expected = if k % 2 == 0 && k < 2000 { k + 1000 } else { 0 };
                assert_eq!(v, expected, "key {}", k);
            }
        }
    }

    #[test]
    fn test_query_data_key_column() {
        let words = build(&CTX2, &even_keys(10));
        let reader = BTreeReader::open(&words, 0, CTX2, scalar()).unwrap();
        assert_eq!(reader.query_data(&[2, 3, 4], 0), vec![2, 0, 4]);
    }

    #[test]
    fn test_retain_and_reject() {
        let words = build(&CTX2, &even_keys(50));
        let reader = BTreeReader::open(&words, 0, CTX2, scalar()).unwrap();

        let mut kept: Vec<u64> = (0..120).collect();
        reader.retain_entries(&mut kept);
        assert_eq!(kept, (0..50).map(|i| i * 2).collect::<Vec<_>>());

        let mut rest: Vec<u64> = (0..120).collect();
        reader.reject_entries(&mut rest);
        let mut expected: Vec<u64> = (0..100).filter(|i| i % 2 == 1).collect();
        expected.extend(100..120);
        assert_eq!(rest, expected);
    }

    #[test]
    fn test_store_at_offset_in_shared_region() {
        let mut words = build(&CTX2, &even_keys(3));
        let second = words.len();
        words.extend(build(&CTX2, &[7, 70, 9, 90]));

        let first = BTreeReader::open(&words, 0, CTX2, scalar()).unwrap();
        assert_eq!(first.size_words(), second);
        assert_eq!(first.keys().collect::<Vec<_>>(), vec![0, 2, 4]);

        let other = BTreeReader::open_trusted(&words, second, CTX2, scalar());
        assert_eq!(other.query_data(&[7, 8, 9], 1), vec![70, 0, 90]);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn test_query_data_rejects_unsorted_in_debug() {
        let words = build(&CTX2, &even_keys(10));
        let reader = BTreeReader::open(&words, 0, CTX2, scalar()).unwrap();
        reader.query_data(&[4, 2], 1);
    }
}
