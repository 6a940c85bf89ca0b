//! Score kernels.
//!
//! Every kernel ranks candidate feature rows against the sample scores
//! under a uniform contract: higher is better, candidates already in the
//! meta-feature are excluded, candidates are OR-combined with the current
//! union before scoring, and composites that become all-ones are dropped.
//!
//! # Available kernels
//!
//! - [`KsScorer`]: weighted one-sided two-sample Kolmogorov-Smirnov
//!   (statistic or `-log p`)
//! - [`WilcoxonScorer`]: rank-sum (statistic or `-log p`, exact
//!   distribution for small tie-free inputs)
//! - [`RevealerScorer`]: conditional information coefficient from kernel
//!   density estimates
//! - [`KnnMiScorer`]: k-nearest-neighbor mutual information
//! - [`CorrelationScorer`]: Pearson or Spearman correlation
//! - [`Scorer::Custom`]: user-supplied implementation of [`ScorerFn`]
//!
//! Kernels implement [`ScorerFn::score_row`] (and override
//! [`ScorerFn::score_with_meta`] when conditioning matters, as REVEALER
//! does); the candidate enumeration in [`ScorerFn::score_all`] is shared.

mod correlation;
mod knn_mi;
mod ks;
mod revealer;
pub(crate) mod stats;
mod wilcoxon;

pub use correlation::{CorrelationMethod, CorrelationScorer};
pub use knn_mi::KnnMiScorer;
pub use ks::KsScorer;
pub use revealer::RevealerScorer;
pub use wilcoxon::WilcoxonScorer;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{BitRow, DataError, FeatureMatrix, SampleScores, SampleWeights};
use crate::utils::argsort_desc;

// =============================================================================
// Options shared across kernels
// =============================================================================

/// Directional alternative for the rank-based and correlation kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alternative {
    /// Favor features whose 1-group sits at the low end of the ranking.
    Less,
    /// Favor features whose 1-group sits at the high end of the ranking.
    Greater,
    /// Direction-free alternative.
    TwoSided,
}

/// Whether a test kernel reports its statistic or `-log(p)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreMode {
    Stat,
    Pval,
}

// =============================================================================
// Ranked output
// =============================================================================

/// One scored candidate row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowScore {
    /// Row index in the feature matrix.
    pub row: usize,
    /// Row label.
    pub label: String,
    /// Kernel score; higher is better.
    pub score: f64,
}

/// Candidate rows sorted descending by score (label-ascending within exact
/// ties).
pub type RowScores = Vec<RowScore>;

/// Kernel contract violations.
///
/// Built-in kernels cannot violate the contract; these arise from custom
/// scorers and are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("custom scorer returned unknown row label '{label}'")]
    UnknownLabel { label: String },

    #[error("custom scorer returned meta-feature row '{label}' as a candidate")]
    ExcludedLabel { label: String },

    #[error("custom scorer returned duplicate row label '{label}'")]
    DuplicateLabel { label: String },

    #[error("custom scorer output not sorted descending at position {index}")]
    NotSorted { index: usize },
}

// =============================================================================
// Score context
// =============================================================================

/// Precomputed scoring state for one (matrix, scores, weights) triple.
///
/// Built once per search (and once per permutation); kernels read the
/// descending sample order and rank assignments from here instead of
/// re-sorting per candidate.
pub struct ScoreContext<'a> {
    matrix: &'a FeatureMatrix,
    values: Vec<f64>,
    weights: Option<Vec<f64>>,
    /// Sample indices sorted by descending score, stable on ties.
    order: Vec<usize>,
    /// Tie-averaged descending rank per sample.
    avg_ranks: Vec<f64>,
    has_ties: bool,
    /// `sum(t^3 - t)` over tie groups, for the rank-sum variance.
    tie_correction: f64,
    /// Score values sorted ascending (for neighbor searches).
    sorted_asc: Vec<f64>,
}

impl<'a> ScoreContext<'a> {
    /// Align scores (and optional weights) to the matrix and precompute
    /// rank state.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] when labels do not bijectively match the
    /// matrix columns.
    pub fn new(
        matrix: &'a FeatureMatrix,
        scores: &SampleScores,
        weights: Option<&SampleWeights>,
    ) -> Result<Self, DataError> {
        let values = scores.aligned_to(matrix)?;
        let weights = weights.map(|w| w.aligned_to(matrix)).transpose()?;
        Ok(Self::from_aligned(matrix, values, weights))
    }

    fn from_aligned(
        matrix: &'a FeatureMatrix,
        values: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Self {
        let n = values.len();
        let order = argsort_desc(&values);

        // tie-averaged ranks over groups of equal score values
        let mut avg_ranks = vec![0.0; n];
        let mut has_ties = false;
        let mut tie_correction = 0.0;
        let mut start = 0;
        while start < n {
            let mut end = start + 1;
            while end < n && values[order[end]] == values[order[start]] {
                end += 1;
            }
            let group = (end - start) as f64;
            if end - start > 1 {
                has_ties = true;
                tie_correction += group * group * group - group;
            }
            let avg = (start + end + 1) as f64 / 2.0;
            for &sample in &order[start..end] {
                avg_ranks[sample] = avg;
            }
            start = end;
        }

        let mut sorted_asc = values.clone();
        sorted_asc.sort_by(f64::total_cmp);

        Self {
            matrix,
            values,
            weights,
            order,
            avg_ranks,
            has_ties,
            tie_correction,
            sorted_asc,
        }
    }

    /// The matrix being scored.
    #[inline]
    pub fn matrix(&self) -> &FeatureMatrix {
        self.matrix
    }

    /// Number of samples.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.values.len()
    }

    /// Scores aligned to matrix column order.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Weights aligned to matrix column order, if supplied.
    #[inline]
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Sample indices in descending score order.
    #[inline]
    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    /// Tie-averaged descending rank per sample.
    #[inline]
    pub(crate) fn avg_ranks(&self) -> &[f64] {
        &self.avg_ranks
    }

    #[inline]
    pub(crate) fn has_ties(&self) -> bool {
        self.has_ties
    }

    #[inline]
    pub(crate) fn tie_correction(&self) -> f64 {
        self.tie_correction
    }

    #[inline]
    pub(crate) fn sorted_values(&self) -> &[f64] {
        &self.sorted_asc
    }
}

// =============================================================================
// Scorer trait
// =============================================================================

/// A score kernel.
///
/// Implementors provide [`score_row`](ScorerFn::score_row); conditioning
/// kernels additionally override
/// [`score_with_meta`](ScorerFn::score_with_meta). The default
/// [`score_all`](ScorerFn::score_all) handles candidate enumeration,
/// all-ones dropping, and the descending sort shared by every kernel.
pub trait ScorerFn: Send + Sync {
    /// Kernel name (for logging and result records).
    fn name(&self) -> &'static str;

    /// Score a single composite row against the sample scores.
    ///
    /// Also used to score the bare meta-feature union for the stopping
    /// check, and removal candidates during backward steps.
    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64;

    /// Score candidate `row` in the context of the current meta-feature
    /// `union`.
    ///
    /// The default OR-combines and delegates to
    /// [`score_row`](ScorerFn::score_row); conditional kernels override.
    fn score_with_meta(&self, ctx: &ScoreContext<'_>, row: &BitRow, union: &BitRow) -> f64 {
        self.score_row(ctx, &union.or(row))
    }

    /// Score every candidate row not in `exclude`, sorted descending.
    ///
    /// With a `union`, each candidate is OR-combined first and candidates
    /// whose composite is all-ones are dropped.
    ///
    /// # Errors
    ///
    /// Built-in kernels never fail; custom kernels fail on contract
    /// violations.
    fn score_all(
        &self,
        ctx: &ScoreContext<'_>,
        exclude: &[usize],
        union: Option<&BitRow>,
    ) -> Result<RowScores, ScoreError> {
        let matrix = ctx.matrix();
        let mut scores = Vec::with_capacity(matrix.n_features().saturating_sub(exclude.len()));
        for i in 0..matrix.n_features() {
            if exclude.contains(&i) {
                continue;
            }
            let row = matrix.row(i);
            let score = match union {
                Some(union) => {
                    if union.or(row).is_all_ones() {
                        continue;
                    }
                    self.score_with_meta(ctx, row, union)
                }
                None => self.score_row(ctx, row),
            };
            scores.push(RowScore {
                row: i,
                label: matrix.row_label(i).to_string(),
                score,
            });
        }
        sort_row_scores(&mut scores);
        Ok(scores)
    }
}

/// Sort descending by score, label-ascending within exact ties.
pub(crate) fn sort_row_scores(scores: &mut RowScores) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.label.cmp(&b.label)));
}

// =============================================================================
// Scorer enum
// =============================================================================

/// Score kernel selection for a search.
///
/// Wraps the built-in kernels plus user-supplied custom scorers behind a
/// single configurable type; delegates [`ScorerFn`] to the inner kernel.
///
/// # Example
///
/// ```
/// use metafeat::scoring::{Alternative, Scorer, ScorerFn};
///
/// let kernel = Scorer::ks_pval(Alternative::Less);
/// assert_eq!(kernel.name(), "ks");
/// ```
#[derive(Clone)]
pub enum Scorer {
    /// Kolmogorov-Smirnov kernel.
    Ks(KsScorer),
    /// Wilcoxon rank-sum kernel.
    Wilcoxon(WilcoxonScorer),
    /// REVEALER conditional-information-coefficient kernel.
    Revealer(RevealerScorer),
    /// k-nearest-neighbor mutual information kernel.
    KnnMi(KnnMiScorer),
    /// Correlation kernel.
    Correlation(CorrelationScorer),
    /// User-supplied kernel; output is contract-checked by the core.
    Custom(Arc<dyn ScorerFn>),
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ks(inner) => f.debug_tuple("Ks").field(inner).finish(),
            Self::Wilcoxon(inner) => f.debug_tuple("Wilcoxon").field(inner).finish(),
            Self::Revealer(inner) => f.debug_tuple("Revealer").field(inner).finish(),
            Self::KnnMi(inner) => f.debug_tuple("KnnMi").field(inner).finish(),
            Self::Correlation(inner) => f.debug_tuple("Correlation").field(inner).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<dyn ScorerFn>").finish(),
        }
    }
}

/// Convenience constructors for the built-in kernels.
impl Scorer {
    /// KS kernel reporting the statistic.
    pub fn ks_stat(alternative: Alternative) -> Self {
        Self::Ks(KsScorer::new(alternative, ScoreMode::Stat))
    }

    /// KS kernel reporting `-log(p)`.
    pub fn ks_pval(alternative: Alternative) -> Self {
        Self::Ks(KsScorer::new(alternative, ScoreMode::Pval))
    }

    /// Wilcoxon kernel reporting the statistic.
    pub fn wilcoxon_stat(alternative: Alternative) -> Self {
        Self::Wilcoxon(WilcoxonScorer::new(alternative, ScoreMode::Stat))
    }

    /// Wilcoxon kernel reporting `-log(p)`.
    pub fn wilcoxon_pval(alternative: Alternative) -> Self {
        Self::Wilcoxon(WilcoxonScorer::new(alternative, ScoreMode::Pval))
    }

    /// REVEALER conditional-IC kernel.
    pub fn revealer() -> Self {
        Self::Revealer(RevealerScorer::default())
    }

    /// k-NN mutual information kernel with the given neighbor count.
    pub fn knn_mi(k: usize) -> Self {
        Self::KnnMi(KnnMiScorer::new(k))
    }

    /// Correlation kernel. `alternative = None` reports `|corr|`.
    pub fn correlation(method: CorrelationMethod, alternative: Option<Alternative>) -> Self {
        Self::Correlation(CorrelationScorer::new(method, alternative))
    }

    /// Custom kernel with a user-provided implementation.
    pub fn custom<S: ScorerFn + 'static>(scorer: S) -> Self {
        Self::Custom(Arc::new(scorer))
    }

    /// Validate a custom kernel's output against the contract.
    fn validate_contract(
        ctx: &ScoreContext<'_>,
        exclude: &[usize],
        scores: &RowScores,
    ) -> Result<(), ScoreError> {
        let matrix = ctx.matrix();
        let mut seen = std::collections::HashSet::with_capacity(scores.len());
        for (i, entry) in scores.iter().enumerate() {
            let row = matrix.row_index(&entry.label).ok_or_else(|| {
                ScoreError::UnknownLabel {
                    label: entry.label.clone(),
                }
            })?;
            if row != entry.row {
                return Err(ScoreError::UnknownLabel {
                    label: entry.label.clone(),
                });
            }
            if exclude.contains(&row) {
                return Err(ScoreError::ExcludedLabel {
                    label: entry.label.clone(),
                });
            }
            if !seen.insert(row) {
                return Err(ScoreError::DuplicateLabel {
                    label: entry.label.clone(),
                });
            }
            if i > 0 && scores[i - 1].score < entry.score {
                return Err(ScoreError::NotSorted { index: i });
            }
        }
        Ok(())
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::ks_pval(Alternative::Less)
    }
}

impl ScorerFn for Scorer {
    fn name(&self) -> &'static str {
        match self {
            Self::Ks(inner) => inner.name(),
            Self::Wilcoxon(inner) => inner.name(),
            Self::Revealer(inner) => inner.name(),
            Self::KnnMi(inner) => inner.name(),
            Self::Correlation(inner) => inner.name(),
            Self::Custom(inner) => inner.name(),
        }
    }

    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        match self {
            Self::Ks(inner) => inner.score_row(ctx, row),
            Self::Wilcoxon(inner) => inner.score_row(ctx, row),
            Self::Revealer(inner) => inner.score_row(ctx, row),
            Self::KnnMi(inner) => inner.score_row(ctx, row),
            Self::Correlation(inner) => inner.score_row(ctx, row),
            Self::Custom(inner) => inner.score_row(ctx, row),
        }
    }

    fn score_with_meta(&self, ctx: &ScoreContext<'_>, row: &BitRow, union: &BitRow) -> f64 {
        match self {
            Self::Ks(inner) => inner.score_with_meta(ctx, row, union),
            Self::Wilcoxon(inner) => inner.score_with_meta(ctx, row, union),
            Self::Revealer(inner) => inner.score_with_meta(ctx, row, union),
            Self::KnnMi(inner) => inner.score_with_meta(ctx, row, union),
            Self::Correlation(inner) => inner.score_with_meta(ctx, row, union),
            Self::Custom(inner) => inner.score_with_meta(ctx, row, union),
        }
    }

    fn score_all(
        &self,
        ctx: &ScoreContext<'_>,
        exclude: &[usize],
        union: Option<&BitRow>,
    ) -> Result<RowScores, ScoreError> {
        match self {
            Self::Ks(inner) => inner.score_all(ctx, exclude, union),
            Self::Wilcoxon(inner) => inner.score_all(ctx, exclude, union),
            Self::Revealer(inner) => inner.score_all(ctx, exclude, union),
            Self::KnnMi(inner) => inner.score_all(ctx, exclude, union),
            Self::Correlation(inner) => inner.score_all(ctx, exclude, union),
            Self::Custom(inner) => {
                let scores = inner.score_all(ctx, exclude, union)?;
                Self::validate_contract(ctx, exclude, &scores)?;
                Ok(scores)
            }
        }
    }
}
