//! Parallel processing utilities using Rayon.

use rayon::prelude::*;

/// Markers per parallel batch. Large enough to amortize task dispatch,
/// small enough to keep the streaming memory bound.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Below this many items a batch is mapped sequentially; thread dispatch
/// costs more than it saves.
pub const PARALLEL_THRESHOLD: usize = 64;

/// Map `f` over `items` on the current Rayon pool, preserving input order.
pub fn map_ordered<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if items.len() < PARALLEL_THRESHOLD {
        return items.iter().map(f).collect();
    }
    items.par_iter().map(f).collect()
}

/// Build the global Rayon pool with `threads` workers.
///
/// A pool that was already initialized is left as is.
pub fn init_thread_pool(threads: usize) {
    if threads > 1 {
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global();
    }
}
