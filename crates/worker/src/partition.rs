//! Static partitioning of a fixed work list

/// Split `items` into exactly `workers` contiguous chunks of `⌈len/workers⌉`
/// items each.
///
/// Chunks keep the input order. Trailing chunks are shorter or empty when the
/// list does not divide evenly, so concatenating the chunks always gives back
/// `items`. Returns no chunks when `workers == 0`.
pub fn partition<I: Clone>(items: &[I], workers: usize) -> Vec<Vec<I>> {
    if workers == 0 {
        return Vec::new();
    }

    let chunk_len = items.len().div_ceil(workers).max(1);
    let mut chunks: Vec<Vec<I>> = items.chunks(chunk_len).map(<[I]>::to_vec).collect();
    chunks.resize_with(workers, Vec::new);
    chunks
}
