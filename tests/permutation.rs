//! End-to-end permutation-null tests.

use std::num::NonZeroUsize;

use metafeat::data::{BitRow, FeatureMatrix, SampleScores};
use metafeat::permutation::{permutation_test, permutation_test_cancellable, PermutationConfig};
use metafeat::scoring::{Alternative, RowScores, ScoreContext, ScoreError, Scorer, ScorerFn};
use metafeat::search::{SearchConfig, SearchError};
use metafeat::testing::{normal_scores, sample_labels};
use metafeat::CancelToken;

fn toy_matrix() -> FeatureMatrix {
    let rows = vec![
        BitRow::from_bools(&[
            true, false, true, false, false, false, false, false, true, false,
        ]),
        BitRow::from_bools(&[
            false, false, true, false, true, false, true, false, false, false,
        ]),
        BitRow::from_bools(&[
            false, false, false, false, true, false, true, false, true, false,
        ]),
    ];
    FeatureMatrix::from_rows(
        rows,
        vec!["TP_1".into(), "TP_2".into(), "TP_3".into()],
        sample_labels(10),
    )
    .unwrap()
}

fn search_config() -> SearchConfig {
    SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(1)
        .build()
        .unwrap()
}

#[test]
fn thousand_permutations_give_a_bounded_deterministic_p() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 20260802);
    let config = search_config();
    let perm = PermutationConfig::builder().n_perm(1000).seed(3).build().unwrap();

    let first = permutation_test(&matrix, &scores, &config, &perm).unwrap();
    let second = permutation_test(&matrix, &scores, &config, &perm).unwrap();

    // determinism: identical p and identical sorted null
    assert_eq!(first.p_value, second.p_value);
    assert_eq!(first.null_scores, second.null_scores);

    // smoothing bounds: p in [1/(K+1), 1]
    assert!(first.p_value >= 1.0 / 1001.0);
    assert!(first.p_value <= 1.0);

    // exactly K finite null scores, sorted ascending
    assert_eq!(first.null_scores.len(), 1000);
    assert_eq!(first.n_failed, 0);
    assert!(first.null_scores.iter().all(|s| s.is_finite()));
    for pair in first.null_scores.windows(2) {
        assert!(pair[0] <= pair[1]);
    }

    // the observed search is echoed
    assert_eq!(first.observed.records.len(), 1);
    assert_eq!(first.observed_score, first.observed.max_score());
}

#[test]
fn thread_count_does_not_change_the_null() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 5);
    let config = search_config();

    let perm_1 = PermutationConfig::builder()
        .n_perm(64)
        .seed(11)
        .n_threads(NonZeroUsize::new(1).unwrap())
        .build()
        .unwrap();
    let perm_4 = PermutationConfig::builder()
        .n_perm(64)
        .seed(11)
        .n_threads(NonZeroUsize::new(4).unwrap())
        .build()
        .unwrap();

    let a = permutation_test(&matrix, &scores, &config, &perm_1).unwrap();
    let b = permutation_test(&matrix, &scores, &config, &perm_4).unwrap();
    assert_eq!(a.p_value, b.p_value);
    assert_eq!(a.null_scores, b.null_scores);
}

#[test]
fn different_seeds_change_the_null() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 5);
    let config = search_config();

    let a = permutation_test(
        &matrix,
        &scores,
        &config,
        &PermutationConfig::builder().n_perm(64).seed(1).build().unwrap(),
    )
    .unwrap();
    let b = permutation_test(
        &matrix,
        &scores,
        &config,
        &PermutationConfig::builder().n_perm(64).seed(2).build().unwrap(),
    )
    .unwrap();
    assert_ne!(a.null_scores, b.null_scores);
}

#[test]
fn requesting_more_permutations_than_exist_is_fatal() {
    let matrix = FeatureMatrix::from_rows(
        vec![BitRow::from_bools(&[true, false, true])],
        vec!["f".into()],
        sample_labels(3),
    )
    .unwrap();
    let scores = SampleScores::from_pairs(&[("S0", 1.0), ("S1", 0.0), ("S2", -1.0)]).unwrap();
    let config = search_config();
    let perm = PermutationConfig::builder().n_perm(10).build().unwrap();

    let err = permutation_test(&matrix, &scores, &config, &perm).unwrap_err();
    assert!(matches!(
        err,
        SearchError::ImpossibleDistinct {
            n_perm: 10,
            n_samples: 3
        }
    ));
}

#[test]
fn cancellation_surfaces_before_any_result() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 5);
    let config = search_config();
    let perm = PermutationConfig::builder().n_perm(16).build().unwrap();

    let token = CancelToken::new();
    token.cancel();
    let err =
        permutation_test_cancellable(&matrix, &scores, &config, &perm, &token).unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
}

/// Fails the kernel contract for every score vector except the one it was
/// built against, so only permuted runs fail.
struct OriginalOnly {
    original: Vec<f64>,
    inner: Scorer,
}

impl OriginalOnly {
    fn new(matrix: &FeatureMatrix, scores: &SampleScores) -> Self {
        Self {
            original: scores.aligned_to(matrix).unwrap(),
            inner: Scorer::ks_pval(Alternative::Less),
        }
    }
}

impl ScorerFn for OriginalOnly {
    fn name(&self) -> &'static str {
        "original-only"
    }
    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        self.inner.score_row(ctx, row)
    }
    fn score_all(
        &self,
        ctx: &ScoreContext<'_>,
        exclude: &[usize],
        union: Option<&BitRow>,
    ) -> Result<RowScores, ScoreError> {
        if ctx.values() != self.original.as_slice() {
            return Err(ScoreError::NotSorted { index: 0 });
        }
        self.inner.score_all(ctx, exclude, union)
    }
}

#[test]
fn failure_fraction_threshold_aborts_the_run() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 5);
    let config = SearchConfig::builder()
        .scorer(Scorer::custom(OriginalOnly::new(&matrix, &scores)))
        .top_n(1)
        .build()
        .unwrap();
    let perm = PermutationConfig::builder().n_perm(8).build().unwrap();

    let err = permutation_test(&matrix, &scores, &config, &perm).unwrap_err();
    assert!(matches!(
        err,
        SearchError::TooManyFailures {
            failed: 8,
            total: 8,
            ..
        }
    ));
}

#[test]
fn failed_permutations_contribute_negative_infinity_below_threshold() {
    let matrix = toy_matrix();
    let scores = normal_scores(10, 5);
    let config = SearchConfig::builder()
        .scorer(Scorer::custom(OriginalOnly::new(&matrix, &scores)))
        .top_n(1)
        .build()
        .unwrap();
    // threshold of 1.0 tolerates every failure
    let perm = PermutationConfig::builder()
        .n_perm(8)
        .max_fail_fraction(1.0)
        .build()
        .unwrap();

    let result = permutation_test(&matrix, &scores, &config, &perm).unwrap();
    assert_eq!(result.n_failed, 8);
    assert!(result.null_scores.iter().all(|s| *s == f64::NEG_INFINITY));
    // every null is -inf, so nothing reaches the observed score
    assert_eq!(result.p_value, 1.0 / 9.0);
}
