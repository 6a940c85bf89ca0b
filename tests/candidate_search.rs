//! End-to-end candidate-search tests.

use metafeat::data::{BitRow, DataError, FeatureMatrix, SampleScores, SampleWeights};
use metafeat::scoring::{
    Alternative, CorrelationMethod, RowScores, ScoreContext, ScoreError, ScoreMode, Scorer,
    ScorerFn,
};
use metafeat::search::{candidate_search, SearchConfig, SearchError, SearchMethod, StepAction};
use metafeat::testing::{matrix_from_rank_sets, normal_scores, sample_labels};
use rstest::rstest;

/// The toy 3x10 matrix shared by the first scenarios.
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

fn toy_scores() -> SampleScores {
    normal_scores(10, 20260802)
}

#[rstest]
#[case::ks(Scorer::ks_pval(Alternative::Less))]
#[case::wilcoxon(Scorer::wilcoxon_pval(Alternative::Less))]
#[case::spearman(Scorer::correlation(CorrelationMethod::Spearman, None))]
fn toy_search_is_deterministic_and_seeded_from_the_top_row(#[case] scorer: Scorer) {
    let matrix = toy_matrix();
    let scores = toy_scores();

    let config = SearchConfig::builder()
        .scorer(scorer.clone())
        .top_n(1)
        .build()
        .unwrap();

    let first = candidate_search(&matrix, &scores, &config).unwrap();
    let second = candidate_search(&matrix, &scores, &config).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.records.len(), 1);
    let record = &first.records[0];

    // the seed is the best-scoring single feature
    let ctx = ScoreContext::new(&matrix, &scores, None).unwrap();
    let ranked = scorer.score_all(&ctx, &[], None).unwrap();
    assert_eq!(record.seed_row, ranked[0].row);

    // the final score never falls below the seed score
    assert!(record.best_score >= ranked[0].score);
    assert!(!record.selected_labels.is_empty());
    assert!(record.selected.len() <= 3);
}

#[test]
fn search_invariants_hold_along_the_trajectory() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(3)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();

    for record in &result.records {
        // score monotonicity: every accepted step strictly improves, and
        // the final score is the trajectory maximum
        for pair in record.cumulative_scores.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        let max = record
            .cumulative_scores
            .iter()
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        assert_eq!(record.best_score, max);

        // union monotonicity: popcount non-decreasing over forward steps
        let mut selected = Vec::new();
        let mut last_pop = 0usize;
        for step in &record.trajectory {
            match step.action {
                StepAction::Added => selected.push(step.row),
                StepAction::Removed => selected.retain(|&r| r != step.row),
            }
            let pop = matrix.or_union(&selected).count_ones();
            match step.action {
                StepAction::Added => assert!(pop >= last_pop),
                StepAction::Removed => assert!(pop <= last_pop),
            }
            last_pop = pop;
        }

        // the recorded union is the OR of the recorded selection
        assert_eq!(matrix.or_union(&record.selected), record.union);

        // marginal and cumulative trajectories are step-aligned
        assert_eq!(record.marginal_scores.len(), record.cumulative_scores.len());
        assert_eq!(record.marginal_scores.len(), record.trajectory.len());
    }
}

#[test]
fn spearman_kernel_labels_cover_all_rows() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let kernel = Scorer::correlation(CorrelationMethod::Spearman, None);
    let ctx = ScoreContext::new(&matrix, &scores, None).unwrap();
    let ranked = kernel.score_all(&ctx, &[], None).unwrap();

    let mut labels: Vec<_> = ranked.iter().map(|r| r.label.clone()).collect();
    labels.sort();
    assert_eq!(labels, vec!["TP_1", "TP_2", "TP_3"]);
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

/// A user kernel implementing the KS contract by hand, used to check that
/// custom dispatch reproduces the built-in result.
#[derive(Clone)]
struct UserKs {
    inner: metafeat::scoring::KsScorer,
}

impl UserKs {
    fn new() -> Self {
        Self {
            inner: metafeat::scoring::KsScorer::new(Alternative::Less, ScoreMode::Pval),
        }
    }
}

impl ScorerFn for UserKs {
    fn name(&self) -> &'static str {
        "user-ks"
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
        self.inner.score_all(ctx, exclude, union)
    }
}

#[test]
fn custom_kernel_matches_builtin_ks() {
    let matrix = toy_matrix();
    let scores = toy_scores();

    let builtin = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(1)
        .build()
        .unwrap();
    let custom = SearchConfig::builder()
        .scorer(Scorer::custom(UserKs::new()))
        .top_n(1)
        .build()
        .unwrap();

    let a = candidate_search(&matrix, &scores, &builtin).unwrap();
    let b = candidate_search(&matrix, &scores, &custom).unwrap();

    let (a, b) = (&a.records[0], &b.records[0]);
    assert_eq!(a.selected_labels, b.selected_labels);
    assert_eq!(a.best_score, b.best_score);
    assert_eq!(a.trajectory.len(), b.trajectory.len());
}

#[test]
fn backward_step_is_taken_exactly_once() {
    // After seeding A and adding B, C, D, dropping B strictly improves the
    // statistic; the backward branch must fire exactly once.
    let (matrix, scores) = matrix_from_rank_sets(
        20,
        &[
            ("A", &[1, 2, 3, 4, 20]),
            ("B", &[5, 6, 7, 8, 9, 19]),
            ("C", &[10, 11, 12, 13, 14, 18]),
            ("D", &[5, 6, 7, 8, 9, 15, 18]),
        ],
    );
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_stat(Alternative::Greater))
        .top_n(1)
        .search_method(SearchMethod::Both)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();
    let record = &result.records[0];

    let removals: Vec<_> = record
        .trajectory
        .iter()
        .filter(|s| s.action == StepAction::Removed)
        .collect();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].label, "B");
    assert_eq!(record.selected_labels, vec!["A", "C", "D"]);
    approx::assert_relative_eq!(record.best_score, 15.0 / 17.0, max_relative = 1e-12);
}

#[test]
fn replaying_the_returned_seed_reproduces_the_meta_feature() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(1)
        .build()
        .unwrap();
    let first = candidate_search(&matrix, &scores, &config).unwrap();
    let seed_label = first.records[0].seed_label.clone();

    let replay = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .search_start(vec![seed_label])
        .build()
        .unwrap();
    let second = candidate_search(&matrix, &scores, &replay).unwrap();

    assert_eq!(
        first.records[0].selected_labels,
        second.records[0].selected_labels
    );
    assert_eq!(first.records[0].best_score, second.records[0].best_score);
    assert_eq!(first.records[0].union, second.records[0].union);
}

#[test]
fn score_label_storage_order_does_not_matter() {
    let matrix = toy_matrix();
    let scores = toy_scores();

    // the same label -> value mapping, stored back to front
    let mut pairs: Vec<(String, f64)> = scores
        .labels()
        .iter()
        .cloned()
        .zip(scores.values().iter().copied())
        .collect();
    pairs.reverse();
    let reordered = SampleScores::new(
        pairs.iter().map(|(l, _)| l.clone()).collect(),
        pairs.iter().map(|(_, v)| *v).collect(),
    )
    .unwrap();

    let config = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(1)
        .build()
        .unwrap();
    let a = candidate_search(&matrix, &scores, &config).unwrap();
    let b = candidate_search(&matrix, &reordered, &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn smallest_non_degenerate_input_runs() {
    let matrix = FeatureMatrix::from_rows(
        vec![BitRow::from_bools(&[true, false])],
        vec!["only".into()],
        sample_labels(2),
    )
    .unwrap();
    let scores = SampleScores::from_pairs(&[("S0", 1.0), ("S1", -1.0)]).unwrap();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_stat(Alternative::Greater))
        .top_n(1)
        .max_size(1)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();
    assert_eq!(result.records[0].selected_labels, vec!["only"]);
    assert_eq!(result.records[0].trajectory.len(), 1);
}

#[test]
fn max_size_one_stops_at_the_seed() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(1)
        .max_size(1)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();
    assert_eq!(result.records[0].selected.len(), 1);
}

#[test]
fn top_n_beyond_row_count_is_fatal() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder().top_n(4).build().unwrap();
    let err = candidate_search(&matrix, &scores, &config).unwrap_err();
    assert!(matches!(
        err,
        SearchError::TopNExceedsRows {
            top_n: 4,
            n_features: 3
        }
    ));
}

#[test]
fn unknown_search_start_label_is_fatal() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .search_start(vec!["TP_1".into(), "missing".into()])
        .build()
        .unwrap();
    let err = candidate_search(&matrix, &scores, &config).unwrap_err();
    assert!(matches!(err, SearchError::UnknownFeature { label } if label == "missing"));
}

#[test]
fn mismatched_weight_labels_are_fatal() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let weights =
        SampleWeights::from_pairs(&[("S0", 1.0), ("S1", 2.0), ("nope", 1.0)]).unwrap();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_stat(Alternative::Less))
        .weights(weights)
        .top_n(1)
        .build()
        .unwrap();
    let err = candidate_search(&matrix, &scores, &config).unwrap_err();
    assert!(matches!(
        err,
        SearchError::Data(DataError::LabelSetMismatch { .. })
    ));
}

#[test]
fn all_zero_weights_are_rejected_at_construction() {
    let err = SampleWeights::new(sample_labels(3), vec![0.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, DataError::AllZeroWeights));
}

#[test]
fn best_score_only_reports_the_argmax_seed() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .scorer(Scorer::ks_pval(Alternative::Less))
        .top_n(3)
        .best_score_only(true)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();
    let best = result.best_record().unwrap();
    assert_eq!(best.best_score, result.max_score());
}

#[test]
fn result_record_round_trips_through_json() {
    let matrix = toy_matrix();
    let scores = toy_scores();
    let config = SearchConfig::builder()
        .scorer(Scorer::wilcoxon_pval(Alternative::Less))
        .top_n(2)
        .build()
        .unwrap();
    let result = candidate_search(&matrix, &scores, &config).unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: metafeat::TopNResult = serde_json::from_str(&json).unwrap();
    assert_eq!(result, back);
}
