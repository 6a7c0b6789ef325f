//! Search and sort primitives over sorted `u64` arrays.
//!
//! Two layouts are supported:
//!
//! - **64**: a plain array of keys.
//! - **128**: interleaved `(key, payload)` word pairs. `start`/`end` and the
//!   returned positions count entries, not words.
//!
//! Every search returns `Ok(i)` when `data[i] == key` (first such entry) and
//! `Err(i)` with the insertion point otherwise, exactly like
//! [`slice::binary_search`] on a sorted slice. The range searched is
//! `[start, end)` and must be sorted ascending; positions are absolute.
//!
//! [`ScalarBackend`] is portable. [`VectorBackend`] uses AVX2 where the CPU
//! has it and is only ever constructed after a successful capability probe.
//! Both produce identical results for every input that honors the sort
//! precondition, so a backend can be swapped without changing query output.

mod scalar;
mod simd;

pub use scalar::ScalarBackend;
pub use simd::VectorBackend;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::OnceLock;

/// Pluggable search/sort implementation injected into stores and builders
pub trait SearchBackend: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn linear_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize>;

    fn binary_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize>;

    fn linear_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize>;

    fn binary_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize>;

    /// Sort keys ascending in place
    fn sort_64(&self, data: &mut [u64]);

    /// Sort `(key, payload)` pairs by key, then payload. `data.len()` must be even.
    fn sort_128(&self, data: &mut [u64]);
}

/// Which backend to use; `Auto` probes the CPU once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Auto,
    Scalar,
}

impl BackendChoice {
    pub fn resolve(self) -> &'static dyn SearchBackend {
        match self {
            BackendChoice::Auto => detect(),
            BackendChoice::Scalar => scalar(),
        }
    }
}

/// The portable backend
pub fn scalar() -> &'static dyn SearchBackend {
    &ScalarBackend
}

/// Best backend for this CPU, probed on first call.
///
/// Falls back to [`ScalarBackend`] silently when no vector unit is usable.
pub fn detect() -> &'static dyn SearchBackend {
    static DETECTED: OnceLock<Option<VectorBackend>> = OnceLock::new();

    let probed = DETECTED.get_or_init(|| {
        let backend = VectorBackend::probe();
        match &backend {
            Some(b) => log::debug!("search backend: {}", b.name()),
            None => log::debug!("search backend: scalar (no vector unit)"),
        }
        backend
    });

    match probed {
        Some(backend) => backend,
        None => scalar(),
    }
}
