//! Identifier types and the document id bit layout.
//!
//! A document id is a `u64`:
//!
//! ```text
//!  63                    32 31                     0
//! +------------------------+------------------------+
//! |   domain / shard id    |  local document ordinal|
//! +------------------------+------------------------+
//! ```
//!
//! Use the accessors below instead of masking ids by hand.

/// Term identifier, assigned upstream
pub type TermId = u64;

/// Document identifier, see the module docs for its layout
pub type DocId = u64;

/// Opaque per-posting payload (position bits, flags). Never interpreted here.
pub type TermMeta = u64;

pub const LOCAL_ORDINAL_BITS: u32 = 32;
pub const LOCAL_ORDINAL_MASK: u64 = (1 << LOCAL_ORDINAL_BITS) - 1;

/// Lower 32 bits: the document's ordinal within its domain
#[inline]
pub fn local_ordinal(doc_id: DocId) -> u32 {
    (doc_id & LOCAL_ORDINAL_MASK) as u32
}

/// Upper 32 bits: domain or shard identifier
#[inline]
pub fn domain_id(doc_id: DocId) -> u32 {
    (doc_id >> LOCAL_ORDINAL_BITS) as u32
}

#[inline]
pub fn make_doc_id(domain: u32, ordinal: u32) -> DocId {
    ((domain as u64) << LOCAL_ORDINAL_BITS) | ordinal as u64
}

/// Combine metadata for the same (term, document) seen twice.
///
/// Metadata words are treated as independent flag bits, so OR loses nothing.
/// This is an assumption about upstream encoding: counts or other numeric
/// fields would not survive it.
#[inline]
pub fn combine_meta(a: TermMeta, b: TermMeta) -> TermMeta {
    a | b
}

/// Default file name of the term directory inside an index directory
pub const WORDS_FILE: &str = "words.dat";

/// Default file name of the postings blob inside an index directory
pub const DOCS_FILE: &str = "docs.dat";
