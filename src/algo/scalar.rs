use super::SearchBackend;

/// Portable implementation; always available
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

#[inline]
fn found_or_insert(found: bool, pos: usize) -> Result<usize, usize> {
    if found { Ok(pos) } else { Err(pos) }
}

pub(crate) fn linear_search_64(
    key: u64,
    data: &[u64],
    start: usize,
    end: usize,
) -> Result<usize, usize> {
    for (i, &value) in data[start..end].iter().enumerate() {
        if value >= key {
            return found_or_insert(value == key, start + i);
        }
    }
    Err(end)
}

pub(crate) fn binary_search_64(
    key: u64,
    data: &[u64],
    start: usize,
    end: usize,
) -> Result<usize, usize> {
    let pos = start + data[start..end].partition_point(|&v| v < key);
    found_or_insert(pos < end && data[pos] == key, pos)
}

pub(crate) fn linear_search_128(
    key: u64,
    data: &[u64],
    start: usize,
    end: usize,
) -> Result<usize, usize> {
    let pairs: &[[u64; 2]] = bytemuck::cast_slice(&data[2 * start..2 * end]);
    for (i, pair) in pairs.iter().enumerate() {
        if pair[0] >= key {
            return found_or_insert(pair[0] == key, start + i);
        }
    }
    Err(end)
}

pub(crate) fn binary_search_128(
    key: u64,
    data: &[u64],
    start: usize,
    end: usize,
) -> Result<usize, usize> {
    let pairs: &[[u64; 2]] = bytemuck::cast_slice(&data[2 * start..2 * end]);
    let rel = pairs.partition_point(|p| p[0] < key);
    found_or_insert(rel < pairs.len() && pairs[rel][0] == key, start + rel)
}

impl SearchBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn linear_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        linear_search_64(key, data, start, end)
    }

    fn binary_search_64(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        binary_search_64(key, data, start, end)
    }

    fn linear_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        linear_search_128(key, data, start, end)
    }

    fn binary_search_128(
        &self,
        key: u64,
        data: &[u64],
        start: usize,
        end: usize,
    ) -> Result<usize, usize> {
        binary_search_128(key, data, start, end)
    }

    fn sort_64(&self, data: &mut [u64]) {
        data.sort_unstable();
    }

    fn sort_128(&self, data: &mut [u64]) {
        assert!(data.len() % 2 == 0, "128-bit sort needs whole pairs");
        let pairs: &mut [[u64; 2]] = bytemuck::cast_slice_mut(data);
        pairs.sort_unstable();
    }
}
