//! Greedy meta-feature search.
//!
//! [`SearchConfig`] selects the kernel and the search shape;
//! [`candidate_search`] resolves seeds (top-N or explicit labels), fans the
//! per-seed engine out over the configured thread count, and returns one
//! [`SearchRecord`] per seed.
//!
//! # Example
//!
//! ```
//! use metafeat::data::{FeatureMatrix, SampleScores};
//! use metafeat::scoring::{Alternative, Scorer};
//! use metafeat::search::{candidate_search, SearchConfig};
//! use ndarray::array;
//!
//! let values = array![
//!     [1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
//!     [0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
//!     [0.0, 0.0, 0.0, 0.0, 1.0, 1.0],
//! ];
//! let matrix = FeatureMatrix::from_array(
//!     values.view(),
//!     &["a", "b", "c"],
//!     &["s0", "s1", "s2", "s3", "s4", "s5"],
//! )
//! .unwrap();
//! let scores = SampleScores::from_pairs(&[
//!     ("s0", 2.1), ("s1", 1.8), ("s2", 0.7),
//!     ("s3", 0.2), ("s4", -0.9), ("s5", -1.4),
//! ])
//! .unwrap();
//!
//! let config = SearchConfig::builder()
//!     .scorer(Scorer::ks_stat(Alternative::Greater))
//!     .top_n(1)
//!     .build()
//!     .unwrap();
//! let result = candidate_search(&matrix, &scores, &config).unwrap();
//! assert_eq!(result.records.len(), 1);
//! ```

mod engine;
mod logger;
mod meta;
mod topn;

pub use engine::SearchEngine;
pub use logger::{SearchLogger, Verbosity};
pub use meta::{MetaFeature, SearchRecord, SearchStep, StepAction};
pub use topn::{TopNDriver, TopNResult};

use std::num::NonZeroUsize;

use bon::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{DataError, FeatureMatrix, SampleScores, SampleWeights};
use crate::scoring::{ScoreContext, ScoreError, Scorer};
use crate::utils::{run_with_threads, CancelToken, Parallelism};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised while validating a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `top_n` and `search_start` are mutually exclusive.
    ConflictingSeedSpec,
    /// `top_n` must be at least 1.
    InvalidTopN,
    /// `search_start` must name at least one feature.
    EmptySearchStart,
    /// `max_size` must be at least 1.
    InvalidMaxSize,
    /// `n_perm` must be at least 1.
    InvalidNPerm,
    /// `max_fail_fraction` must lie in [0, 1].
    InvalidFailFraction(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictingSeedSpec => {
                write!(f, "top_n and search_start are mutually exclusive")
            }
            Self::InvalidTopN => write!(f, "top_n must be at least 1"),
            Self::EmptySearchStart => write!(f, "search_start must name at least one feature"),
            Self::InvalidMaxSize => write!(f, "max_size must be at least 1"),
            Self::InvalidNPerm => write!(f, "n_perm must be at least 1"),
            Self::InvalidFailFraction(v) => {
                write!(f, "max_fail_fraction must be in [0, 1], got {}", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// SearchError
// =============================================================================

/// Top-level error type for searches and permutation runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("search_start names unknown feature '{label}'")]
    UnknownFeature { label: String },

    #[error("top_n ({top_n}) exceeds the number of features ({n_features})")]
    TopNExceedsRows { top_n: usize, n_features: usize },

    #[error("run cancelled")]
    Cancelled,

    #[error("cannot draw {n_perm} distinct permutations of {n_samples} samples")]
    ImpossibleDistinct { n_perm: usize, n_samples: usize },

    #[error("failed to draw {n_perm} distinct permutations within {attempts} attempts")]
    PermutationRetriesExhausted { n_perm: usize, attempts: usize },

    #[error("{failed} of {total} permutations failed (threshold {threshold})")]
    TooManyFailures {
        failed: usize,
        total: usize,
        threshold: f64,
    },
}

// =============================================================================
// SearchConfig
// =============================================================================

/// Whether the engine may take backward steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    /// Forward additions only.
    #[default]
    Forward,
    /// Forward additions with backward removals.
    Both,
}

/// Configuration for a candidate search.
///
/// Built with the `bon` builder; `build()` validates cross-field
/// constraints.
///
/// # Example
///
/// ```
/// use metafeat::search::{SearchConfig, SearchMethod};
///
/// let config = SearchConfig::builder()
///     .top_n(5)
///     .search_method(SearchMethod::Both)
///     .max_size(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_size, 10);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct SearchConfig {
    /// Score kernel. Default: KS `-log(p)`, alternative `less`.
    #[builder(default)]
    pub scorer: Scorer,

    /// Optional sample weights (weighted KS only).
    pub weights: Option<SampleWeights>,

    /// Number of top-ranked seeds to try. Mutually exclusive with
    /// `search_start`; when neither is given, one seed is used.
    pub top_n: Option<usize>,

    /// Explicit seed feature labels.
    pub search_start: Option<Vec<String>>,

    /// Forward-only or bidirectional stepping. Default: forward.
    #[builder(default)]
    pub search_method: SearchMethod,

    /// Maximum number of features in the meta-feature. Default: 7.
    #[builder(default = 7)]
    pub max_size: usize,

    /// Also report the single best seed.
    #[builder(default = false)]
    pub best_score_only: bool,

    /// Number of worker threads. `None` uses all available cores.
    pub n_threads: Option<NonZeroUsize>,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: search_config_builder::IsComplete> SearchConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `top_n` and `search_start` are both
    /// supplied, `top_n` is zero, `search_start` is empty, or `max_size`
    /// is zero.
    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n.is_some() && self.search_start.is_some() {
            return Err(ConfigError::ConflictingSeedSpec);
        }
        if self.top_n == Some(0) {
            return Err(ConfigError::InvalidTopN);
        }
        if let Some(start) = &self.search_start {
            if start.is_empty() {
                return Err(ConfigError::EmptySearchStart);
            }
        }
        if self.max_size == 0 {
            return Err(ConfigError::InvalidMaxSize);
        }
        Ok(())
    }

    /// Thread count with `0 = auto` semantics.
    pub(crate) fn thread_count(&self) -> usize {
        self.n_threads.map(NonZeroUsize::get).unwrap_or(0)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Resolve the configured seeds against a context.
pub(crate) fn resolve_seeds(
    ctx: &ScoreContext<'_>,
    config: &SearchConfig,
    driver: &TopNDriver<'_>,
) -> Result<Vec<usize>, SearchError> {
    let matrix = ctx.matrix();
    if let Some(labels) = &config.search_start {
        labels
            .iter()
            .map(|label| {
                matrix
                    .row_index(label)
                    .ok_or_else(|| SearchError::UnknownFeature {
                        label: label.clone(),
                    })
            })
            .collect()
    } else {
        let top_n = config.top_n.unwrap_or(1);
        if top_n > matrix.n_features() {
            return Err(SearchError::TopNExceedsRows {
                top_n,
                n_features: matrix.n_features(),
            });
        }
        driver.rank_seeds(top_n)
    }
}

/// Run a top-N candidate search inside an existing thread-pool scope.
pub(crate) fn run_search(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    config: &SearchConfig,
    parallelism: Parallelism,
    cancel: Option<&CancelToken>,
) -> Result<TopNResult, SearchError> {
    let ctx = ScoreContext::new(matrix, scores, config.weights.as_ref())?;
    let logger = SearchLogger::new(config.verbosity);
    let driver = TopNDriver::new(
        &ctx,
        &config.scorer,
        config.search_method,
        config.max_size,
        config.best_score_only,
        parallelism,
        logger,
    );
    let seeds = resolve_seeds(&ctx, config, &driver)?;
    driver.run(&seeds, cancel)
}

/// Run a candidate search end to end.
///
/// Validates inputs, resolves seeds, and runs every seed to termination on
/// the configured thread count.
///
/// # Errors
///
/// Input-validation, configuration, contract, and cancellation errors per
/// [`SearchError`]; degenerate runs terminate cleanly with the last state.
pub fn candidate_search(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    config: &SearchConfig,
) -> Result<TopNResult, SearchError> {
    run_with_threads(config.thread_count(), |parallelism| {
        run_search(matrix, scores, config, parallelism, None)
    })
}

/// [`candidate_search`] with a cooperative cancellation token.
pub fn candidate_search_cancellable(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    config: &SearchConfig,
    cancel: &CancelToken,
) -> Result<TopNResult, SearchError> {
    run_with_threads(config.thread_count(), |parallelism| {
        run_search(matrix, scores, config, parallelism, Some(cancel))
    })
}
