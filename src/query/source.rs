use crate::btree::BTreeReader;
use crate::btree::reader::KeyIter;
use crate::index::types::{DocId, TermId};

/// Lazy, ascending stream of the documents containing one term
pub struct PostingsSource<'a> {
    term_id: TermId,
    docs: KeyIter<'a>,
    remaining: usize,
}

impl<'a> PostingsSource<'a> {
    pub(crate) fn new(term_id: TermId, postings: &BTreeReader<'a>) -> Self {
        Self {
            term_id,
            docs: postings.keys(),
            remaining: postings.num_entries(),
        }
    }

    /// Source for a term with no postings
    pub fn empty(term_id: TermId) -> Self {
        let none: &'a [u64] = &[];
        Self {
            term_id,
            docs: none.iter().step_by(1).copied(),
            remaining: 0,
        }
    }

    pub fn term_id(&self) -> TermId {
        self.term_id
    }

    /// Documents not yet produced
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn has_more(&self) -> bool {
        self.remaining > 0
    }

    /// Append up to `max` doc ids to `buf`; returns how many were added
    pub fn read_into(&mut self, buf: &mut Vec<DocId>, max: usize) -> usize {
        let n = max.min(self.remaining);
        buf.extend(self.docs.by_ref().take(n));
        self.remaining -= n;
        n
    }
}

impl Iterator for PostingsSource<'_> {
    type Item = DocId;

    fn next(&mut self) -> Option<DocId> {
        let doc = self.docs.next()?;
        self.remaining -= 1;
        Some(doc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PostingsSource<'_> {}

impl std::fmt::Debug for PostingsSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingsSource")
            .field("term_id", &self.term_id)
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::scalar;
    use crate::btree::{DOCS_CONTEXT, write_btree};

    fn words(records: &[u64]) -> Vec<u64> {
        let mut buf = Vec::new();
        write_btree(&mut buf, &DOCS_CONTEXT, records).unwrap();
        buf.chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_iterates_doc_ids_in_order() {
        let words = words(&[5, 1, 9, 3, 20, 1]);
        let reader = BTreeReader::open(&words, 0, DOCS_CONTEXT, scalar()).unwrap();
        let source = PostingsSource::new(100, &reader);

        assert_eq!(source.term_id(), 100);
        assert_eq!(source.len(), 3);
        assert_eq!(source.collect::<Vec<_>>(), vec![5, 9, 20]);
    }

    #[test]
    fn test_read_into_batches() {
        let records: Vec<u64> = (0..10).flat_map(|d| [d * 10, 0]).collect();
        let words = words(&records);
        let reader = BTreeReader::open(&words, 0, DOCS_CONTEXT, scalar()).unwrap();
        let mut source = PostingsSource::new(1, &reader);

        let mut buf = Vec::new();
        assert_eq!(source.read_into(&mut buf, 4), 4);
        assert_eq!(buf, vec![0, 10, 20, 30]);
        assert_eq!(source.remaining(), 6);

        assert_eq!(source.read_into(&mut buf, 100), 6);
        assert_eq!(buf.len(), 10);
        assert!(!source.has_more());
        assert_eq!(source.read_into(&mut buf, 4), 0);
    }

    #[test]
    fn test_empty_source() {
        let mut source = PostingsSource::empty(7);
        assert_eq!(source.term_id(), 7);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.next(), None);
    }
}
