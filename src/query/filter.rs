//! Candidate filters.
//!
//! A filter either tests one document at a time or narrows a sorted buffer
//! of candidates in place. Filters backed by a term's postings run the
//! buffer form as a single ordered pass over the store.

use crate::btree::BTreeReader;
use crate::index::types::{DocId, TermId};

pub trait QueryFilter: Send + Sync {
    fn test(&self, doc_id: DocId) -> bool;

    /// Keep only passing candidates. `candidates` must be sorted ascending.
    fn apply(&self, candidates: &mut Vec<DocId>) {
        candidates.retain(|&doc| self.test(doc));
    }

    /// Relative cost of running this filter; lower runs first
    fn cost(&self) -> f64;

    fn describe(&self) -> String;
}

/// Passes documents that contain the term
pub struct RetainFilter<'a> {
    term_id: TermId,
    postings: BTreeReader<'a>,
}

impl<'a> RetainFilter<'a> {
    pub(crate) fn new(term_id: TermId, postings: BTreeReader<'a>) -> Self {
        Self { term_id, postings }
    }
}

impl QueryFilter for RetainFilter<'_> {
    fn test(&self, doc_id: DocId) -> bool {
        self.postings.contains(doc_id)
    }

    fn apply(&self, candidates: &mut Vec<DocId>) {
        self.postings.retain_entries(candidates);
    }

    fn cost(&self) -> f64 {
        self.postings.num_entries() as f64
    }

    fn describe(&self) -> String {
        format!("Retain:{}", self.term_id)
    }
}

/// Passes documents that do not contain the term
pub struct RejectFilter<'a> {
    term_id: TermId,
    postings: BTreeReader<'a>,
}

impl<'a> RejectFilter<'a> {
    pub(crate) fn new(term_id: TermId, postings: BTreeReader<'a>) -> Self {
        Self { term_id, postings }
    }
}

impl QueryFilter for RejectFilter<'_> {
    fn test(&self, doc_id: DocId) -> bool {
        !self.postings.contains(doc_id)
    }

    fn apply(&self, candidates: &mut Vec<DocId>) {
        self.postings.reject_entries(candidates);
    }

    fn cost(&self) -> f64 {
        self.postings.num_entries() as f64
    }

    fn describe(&self) -> String {
        format!("Reject:{}", self.term_id)
    }
}

/// Passes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassFilter;

impl QueryFilter for NoPassFilter {
    fn test(&self, _doc_id: DocId) -> bool {
        false
    }

    fn apply(&self, candidates: &mut Vec<DocId>) {
        candidates.clear();
    }

    fn cost(&self) -> f64 {
        0.0
    }

    fn describe(&self) -> String {
        "NoPass".to_string()
    }
}

/// Passes everything
#[derive(Debug, Clone, Copy, Default)]
pub struct LetThroughFilter;

impl QueryFilter for LetThroughFilter {
    fn test(&self, _doc_id: DocId) -> bool {
        true
    }

    fn apply(&self, _candidates: &mut Vec<DocId>) {}

    fn cost(&self) -> f64 {
        0.0
    }

    fn describe(&self) -> String {
        "LetThrough".to_string()
    }
}

/// Conjunction. Children run cheapest first and stop once nothing is left.
pub struct AllOf<'a> {
    filters: Vec<Box<dyn QueryFilter + 'a>>,
}

impl<'a> AllOf<'a> {
    pub fn new(mut filters: Vec<Box<dyn QueryFilter + 'a>>) -> Self {
        filters.sort_by(|a, b| a.cost().total_cmp(&b.cost()));
        Self { filters }
    }

    pub fn filters(&self) -> &[Box<dyn QueryFilter + 'a>] {
        &self.filters
    }
}

impl QueryFilter for AllOf<'_> {
    fn test(&self, doc_id: DocId) -> bool {
        self.filters.iter().all(|f| f.test(doc_id))
    }

    fn apply(&self, candidates: &mut Vec<DocId>) {
        for filter in &self.filters {
            if candidates.is_empty() {
                break;
            }
            filter.apply(candidates);
        }
    }

    fn cost(&self) -> f64 {
        self.filters.iter().map(|f| f.cost()).sum()
    }

    fn describe(&self) -> String {
        describe_children("AllOf", &self.filters)
    }
}

/// Disjunction
pub struct AnyOf<'a> {
    filters: Vec<Box<dyn QueryFilter + 'a>>,
}

impl<'a> AnyOf<'a> {
    pub fn new(filters: Vec<Box<dyn QueryFilter + 'a>>) -> Self {
        Self { filters }
    }
}

impl QueryFilter for AnyOf<'_> {
    fn test(&self, doc_id: DocId) -> bool {
        self.filters.iter().any(|f| f.test(doc_id))
    }

    fn cost(&self) -> f64 {
        self.filters.iter().map(|f| f.cost()).sum()
    }

    fn describe(&self) -> String {
        describe_children("AnyOf", &self.filters)
    }
}

fn describe_children(name: &str, filters: &[Box<dyn QueryFilter + '_>]) -> String {
    let parts: Vec<String> = filters.iter().map(|f| f.describe()).collect();
    format!("{}({})", name, parts.join(", "))
}
