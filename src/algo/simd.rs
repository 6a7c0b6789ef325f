use super::SearchBackend;
use rayon::prelude::*;

/// Below this many elements a parallel sort costs more than it saves
const PARALLEL_SORT_THRESHOLD: usize = 1 << 16;

/// Binary search narrows to a window this wide before switching to a vector scan
const LINEAR_WINDOW: usize = 16;

/// AVX2 accelerated backend.
///
/// Only obtainable through [`VectorBackend::probe`], which checks the CPU, so
/// holding a value proves the target features are present.
#[derive(Debug)]
pub struct VectorBackend {
    _probed: (),
}

impl VectorBackend {
    /// Returns the backend if this CPU supports it
    pub fn probe() -> Option<Self> {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                return Some(Self { _probed: () });
            }
        }
        None
    }
}

#[inline]
fn check_range(data_words: usize, width: usize, start: usize, end: usize) {
    assert!(
        start <= end && end * width <= data_words,
        "search range {start}..{end} out of bounds"
    );
}

impl SearchBackend for VectorBackend {
    fn name(&self) -> &'static str {
        "avx2"
    }

    fn linear_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        check_range(data.len(), 1, start, end);
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: probe() verified avx2; range checked above
            unsafe { x86::linear_search_64_avx2(key, data, start, end) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            super::scalar::linear_search_64(key, data, start, end)
        }
    }

    fn binary_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        check_range(data.len(), 1, start, end);
        let (mut lo, mut hi) = (start, end);
        while hi - lo > LINEAR_WINDOW {
            let mid = lo + (hi - lo) / 2;
            if data[mid] < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        // data[hi] >= key when hi < end, so hi itself may be the match
        self.linear_search_64(key, data, lo, (hi + 1).min(end))
    }

    fn linear_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        check_range(data.len(), 2, start, end);
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: probe() verified avx2; range checked above
            unsafe { x86::linear_search_128_avx2(key, data, start, end) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            super::scalar::linear_search_128(key, data, start, end)
        }
    }

    fn binary_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        check_range(data.len(), 2, start, end);
        let (mut lo, mut hi) = (start, end);
        while hi - lo > LINEAR_WINDOW {
            let mid = lo + (hi - lo) / 2;
            if data[2 * mid] < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.linear_search_128(key, data, lo, (hi + 1).min(end))
    }

    fn sort_64(&self, data: &mut [u64]) {
        if data.len() >= PARALLEL_SORT_THRESHOLD {
            data.par_sort_unstable();
        } else {
            data.sort_unstable();
        }
    }

    fn sort_128(&self, data: &mut [u64]) {
        assert!(data.len() % 2 == 0, "128-bit sort needs whole pairs");
        let pairs: &mut [[u64; 2]] = bytemuck::cast_slice_mut(data);
        if pairs.len() >= PARALLEL_SORT_THRESHOLD {
            pairs.par_sort_unstable();
        } else {
            pairs.sort_unstable();
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use crate::algo::scalar;
    use std::arch::x86_64::{
        __m256i, _mm256_castsi256_pd, _mm256_cmpgt_epi64, _mm256_loadu_si256, _mm256_movemask_pd,
        _mm256_set1_epi64x, _mm256_xor_si256,
    };

    /// Flipping the sign bit turns the signed 64-bit compare into an unsigned one
    const SIGN_BIT: i64 = i64::MIN;

    /// Bit per lane, set where the lane is strictly less than `key`
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn less_than_mask(needle: __m256i, ptr: *const u64) -> u32 {
        let bias = _mm256_set1_epi64x(SIGN_BIT);
        let v = unsafe { _mm256_loadu_si256(ptr.cast::<__m256i>()) };
        let v = _mm256_xor_si256(v, bias);
        let lt = _mm256_cmpgt_epi64(needle, v);
        _mm256_movemask_pd(_mm256_castsi256_pd(lt)) as u32
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn linear_search_64_avx2(
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        let needle = _mm256_xor_si256(_mm256_set1_epi64x(key as i64), _mm256_set1_epi64x(SIGN_BIT));
        let mut i = start;
        while i + 4 <= end {
            let mask = unsafe { less_than_mask(needle, data.as_ptr().add(i)) };
            if mask != 0b1111 {
                // Sorted input: the lanes below key form a prefix
                let j = i + mask.trailing_ones() as usize;
                return if data[j] == key { Ok(j) } else { Err(j) };
            }
            i += 4;
        }
        scalar::linear_search_64(key, data, i, end)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn linear_search_128_avx2(
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        let needle = _mm256_xor_si256(_mm256_set1_epi64x(key as i64), _mm256_set1_epi64x(SIGN_BIT));
        let mut i = start;
        while i + 2 <= end {
            // Lanes 0 and 2 hold the keys of entries i and i + 1
            let mask = unsafe { less_than_mask(needle, data.as_ptr().add(2 * i)) } & 0b0101;
            if mask != 0b0101 {
                let j = if mask & 0b0001 == 0 { i } else { i + 1 };
                return if data[2 * j] == key { Ok(j) } else { Err(j) };
            }
            i += 2;
        }
        scalar::linear_search_128(key, data, i, end)
    }
}
