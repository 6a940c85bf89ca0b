//! metafeat: greedy meta-feature search over binary feature matrices.
//!
//! Given an M×N binary feature matrix and a continuous score per sample,
//! the crate finds a small subset of features whose logical OR (the
//! "meta-feature") is maximally associated with the scores, via a bounded
//! forward/backward greedy search, and estimates an empirical p-value for
//! the result with a permutation null.
//!
//! # Key Types
//!
//! - [`FeatureMatrix`] / [`SampleScores`] - Validated, labeled inputs
//! - [`Scorer`] - The six score kernels (KS, Wilcoxon, REVEALER, k-NN MI,
//!   correlation, custom)
//! - [`SearchConfig`] / [`candidate_search`] - Configure and run a top-N
//!   search
//! - [`PermutationConfig`] / [`permutation_test`] - Empirical null for the
//!   best score
//!
//! # Search
//!
//! Use `SearchConfig::builder()` to configure, then [`candidate_search`].
//! See the [`search`] module for details.
//!
//! # Example
//!
//! ```
//! use metafeat::{candidate_search, SearchConfig};
//! use metafeat::scoring::{Alternative, Scorer};
//! use metafeat::testing::{normal_scores, random_binary_matrix};
//!
//! let matrix = random_binary_matrix(40, 24, 0.2, 7);
//! let scores = normal_scores(24, 11);
//!
//! let config = SearchConfig::builder()
//!     .scorer(Scorer::ks_pval(Alternative::Less))
//!     .top_n(3)
//!     .build()
//!     .unwrap();
//! let result = candidate_search(&matrix, &scores, &config).unwrap();
//! assert_eq!(result.records.len(), 3);
//! ```

// Re-export approx traits for users who want to compare scores
pub use approx;

pub mod data;
pub mod permutation;
pub mod scoring;
pub mod search;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Input types
pub use data::{BitRow, DataError, FeatureMatrix, LabeledAssay, SampleScores, SampleWeights};

// Kernels
pub use scoring::{Alternative, CorrelationMethod, ScoreMode, Scorer, ScorerFn};

// Search surface (most users want these)
pub use search::{
    candidate_search, candidate_search_cancellable, ConfigError, SearchConfig, SearchError,
    SearchMethod, SearchRecord, TopNResult, Verbosity,
};

// Permutation surface
pub use permutation::{
    permutation_test, permutation_test_cancellable, PermutationConfig, PermutationResult,
};

// Shared utilities
pub use utils::{run_with_threads, CancelToken, Parallelism};
