//! # rindex - on-disk reverse index
//!
//! Builds a term → documents index from journal shards and serves it from
//! memory-mapped files.
//!
//! ## Architecture
//!
//! - [`journal`] - Construction input: per-document term lists
//! - [`construction`] - Parallel preindex construction, merge and finalize
//! - [`btree`] - Sorted block store format shared by both index files
//! - [`index`] - Reader over the final files, generation rotation, stats
//! - [`query`] - Postings iteration and candidate filters
//! - [`algo`] - Scalar and vector search/sort backends
//!
//! ## Quick Start
//!
//! ```ignore
//! use rindex::construction::{ReverseIndexConstructor, identity_rewriter};
//! use rindex::index::ReverseIndexReader;
//! use rindex::journal::JournalFileSource;
//! use std::path::Path;
//!
//! let out = Path::new("/data/index");
//! ReverseIndexConstructor::new(
//!     out.join("docs.dat"),
//!     out.join("words.dat"),
//!     out,
//!     JournalFileSource,
//!     identity_rewriter(),
//! )
//! .create_reverse_index(Path::new("/data/journal"))?;
//!
//! let reader = ReverseIndexReader::open(&out.join("words.dat"), &out.join("docs.dat"))?;
//! for doc in reader.documents(42) {
//!     println!("{}", doc);
//! }
//! ```
//!
//! ## File format
//!
//! All files are arrays of little-endian `u64` words, mapped and read in
//! place, so only little-endian targets are supported.

#[cfg(not(target_endian = "little"))]
compile_error!("rindex maps little-endian index files directly and needs a little-endian target");

pub mod algo;
pub mod btree;
pub mod config;
pub mod construction;
pub mod error;
pub mod index;
pub mod journal;
pub mod logging;
pub mod progress;
pub mod query;

pub use error::{IndexError, Result};
