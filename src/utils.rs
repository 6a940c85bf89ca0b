//! Common utilities used across the crate.
//!
//! This module provides the parallelism configuration shared by the top-N
//! and permutation drivers, and the cooperative cancellation token honored
//! between search steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// This is a simple boolean flag passed through the drivers. When `Parallel`,
/// components may use `rayon` parallel iterators; when `Sequential`, they must
/// iterate in order.
///
/// The actual thread pool is set up at the driver API level via `n_threads`.
/// Components don't manage thread pools - they just respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map over the items, in parallel when allowed.
    ///
    /// Output order matches input order in both modes, so results are
    /// deterministic regardless of the flag.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .expect("failed to create thread pool");
            pool.install(|| f(Parallelism::Parallel))
        }
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation token.
///
/// Workers check the token between search steps and between permutations;
/// they never interrupt a kernel mid-computation. A cancelled run discards
/// partial results and surfaces [`SearchError::Cancelled`].
///
/// Cloning is cheap; all clones observe the same flag.
///
/// [`SearchError::Cancelled`]: crate::search::SearchError::Cancelled
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe the change.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Indices that sort `values` in descending order; stable for equal values.
pub(crate) fn argsort_desc(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    order
}
