//! Permutation-based empirical null for the best search score.
//!
//! Shuffles the score values over the sample labels K times, re-runs the
//! full top-N search against every shuffle, and reports the smoothed
//! empirical p-value of the observed best score:
//!
//! `p = (1 + #{k : S_k >= S*}) / (1 + K)`
//!
//! All permutations are drawn up front from one master RNG, so the null
//! distribution depends only on the seed, never on the thread count.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use bon::Builder;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::data::{FeatureMatrix, SampleScores};
use crate::search::{
    run_search, ConfigError, SearchConfig, SearchError, SearchLogger, TopNResult, Verbosity,
};
use crate::utils::{run_with_threads, CancelToken, Parallelism};

/// Retries allowed per requested permutation before giving up.
const RETRY_FACTOR: usize = 100;

// =============================================================================
// PermutationConfig
// =============================================================================

/// Configuration for a permutation run.
///
/// # Example
///
/// ```
/// use metafeat::permutation::PermutationConfig;
///
/// let config = PermutationConfig::builder()
///     .n_perm(1000)
///     .seed(7)
///     .build()
///     .unwrap();
/// assert_eq!(config.n_perm, 1000);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
pub struct PermutationConfig {
    /// Number of label permutations. Default: 100.
    #[builder(default = 100)]
    pub n_perm: usize,

    /// Master RNG seed. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Abort when more than this fraction of permutations fail.
    /// Default: 0.25.
    #[builder(default = 0.25)]
    pub max_fail_fraction: f64,

    /// Number of worker threads. `None` uses all available cores.
    pub n_threads: Option<NonZeroUsize>,

    /// Verbosity level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

/// Custom finishing function that validates the config.
impl<S: permutation_config_builder::IsComplete> PermutationConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `n_perm` is zero or the fail fraction
    /// is outside `[0, 1]`.
    pub fn build(self) -> Result<PermutationConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl PermutationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_perm == 0 {
            return Err(ConfigError::InvalidNPerm);
        }
        if !(0.0..=1.0).contains(&self.max_fail_fraction) {
            return Err(ConfigError::InvalidFailFraction(self.max_fail_fraction));
        }
        Ok(())
    }

    fn thread_count(&self) -> usize {
        self.n_threads.map(NonZeroUsize::get).unwrap_or(0)
    }
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// PermutationResult
// =============================================================================

/// Outcome of a permutation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PermutationResult {
    /// Best score of the unpermuted search.
    pub observed_score: f64,
    /// Smoothed empirical p-value, in `[1/(K+1), 1]`.
    pub p_value: f64,
    /// The K null scores, sorted ascending; failed permutations
    /// contribute `-inf`.
    pub null_scores: Vec<f64>,
    /// Number of failed permutations.
    pub n_failed: usize,
    /// The unpermuted top-N result the observed score came from.
    pub observed: TopNResult,
}

// =============================================================================
// Driver
// =============================================================================

/// Run the permutation test end to end.
///
/// The unpermuted search runs first; its maximum best score across seeds is
/// the observed statistic. Each permutation then re-runs the full top-N
/// search against shuffled scores.
///
/// # Errors
///
/// Everything [`candidate_search`](crate::search::candidate_search) can
/// raise, plus [`SearchError::ImpossibleDistinct`] /
/// [`SearchError::PermutationRetriesExhausted`] when K distinct shuffles
/// cannot be drawn, and [`SearchError::TooManyFailures`] past the failure
/// threshold.
pub fn permutation_test(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    search: &SearchConfig,
    permutation: &PermutationConfig,
) -> Result<PermutationResult, SearchError> {
    permutation_test_impl(matrix, scores, search, permutation, None)
}

/// [`permutation_test`] with a cooperative cancellation token.
pub fn permutation_test_cancellable(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    search: &SearchConfig,
    permutation: &PermutationConfig,
    cancel: &CancelToken,
) -> Result<PermutationResult, SearchError> {
    permutation_test_impl(matrix, scores, search, permutation, Some(cancel))
}

fn permutation_test_impl(
    matrix: &FeatureMatrix,
    scores: &SampleScores,
    search: &SearchConfig,
    permutation: &PermutationConfig,
    cancel: Option<&CancelToken>,
) -> Result<PermutationResult, SearchError> {
    let perms = draw_permutations(permutation.n_perm, matrix.n_samples(), permutation.seed)?;
    let logger = SearchLogger::new(permutation.verbosity);

    run_with_threads(permutation.thread_count(), |parallelism| {
        let observed = run_search(matrix, scores, search, parallelism, cancel)?;
        let observed_score = observed.max_score();

        let null_results: Vec<Option<f64>> = parallelism.maybe_par_map(perms, |perm| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let shuffled = scores.permuted_values(&perm);
            match run_search(matrix, &shuffled, search, Parallelism::Sequential, None) {
                Ok(result) => {
                    let score = result.max_score();
                    score.is_finite().then_some(score)
                }
                Err(_) => None,
            }
        });

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SearchError::Cancelled);
        }

        let total = null_results.len();
        let mut null_scores = Vec::with_capacity(total);
        let mut n_failed = 0usize;
        for (done, result) in null_results.into_iter().enumerate() {
            match result {
                Some(score) => null_scores.push(score),
                None => {
                    n_failed += 1;
                    null_scores.push(f64::NEG_INFINITY);
                }
            }
            logger.log_permutation(done + 1, total);
        }

        if n_failed as f64 > permutation.max_fail_fraction * total as f64 {
            return Err(SearchError::TooManyFailures {
                failed: n_failed,
                total,
                threshold: permutation.max_fail_fraction,
            });
        }

        null_scores.sort_by(f64::total_cmp);
        let exceed = null_scores
            .iter()
            .filter(|&&s| s >= observed_score)
            .count();
        let p_value = (1 + exceed) as f64 / (1 + total) as f64;

        Ok(PermutationResult {
            observed_score,
            p_value,
            null_scores,
            n_failed,
            observed,
        })
    })
}

/// Draw `n_perm` pairwise-distinct index permutations of `0..n_samples`
/// from a seeded master RNG.
fn draw_permutations(
    n_perm: usize,
    n_samples: usize,
    seed: u64,
) -> Result<Vec<Vec<usize>>, SearchError> {
    if !enough_permutations(n_samples, n_perm) {
        return Err(SearchError::ImpossibleDistinct { n_perm, n_samples });
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(n_perm);
    let mut perms = Vec::with_capacity(n_perm);
    let budget = n_perm.saturating_mul(RETRY_FACTOR);
    let mut attempts = 0usize;

    while perms.len() < n_perm {
        if attempts >= budget {
            return Err(SearchError::PermutationRetriesExhausted {
                n_perm,
                attempts,
            });
        }
        attempts += 1;
        let mut perm: Vec<usize> = (0..n_samples).collect();
        perm.shuffle(&mut rng);
        if seen.insert(perm.clone()) {
            perms.push(perm);
        }
    }
    Ok(perms)
}

/// Whether `n!` is at least `n_perm`.
fn enough_permutations(n: usize, n_perm: usize) -> bool {
    let mut factorial: u128 = 1;
    for i in 2..=n.min(34) {
        factorial = factorial.saturating_mul(i as u128);
        if factorial >= n_perm as u128 {
            return true;
        }
    }
    factorial >= n_perm as u128
}
