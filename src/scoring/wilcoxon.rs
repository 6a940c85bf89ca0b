//! Wilcoxon rank-sum score kernel.
//!
//! The statistic is the Mann-Whitney count
//! `W = sum(ranks where r = 1) - n1(n1+1)/2` over tie-averaged descending
//! ranks. P-values come from the exact distribution when both groups are
//! small and the scores are tie-free, and from the normal approximation
//! with continuity and tie corrections otherwise.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::data::BitRow;

use super::stats::{neg_log_p, normal_cdf, normal_sf};
use super::{Alternative, ScoreContext, ScoreMode, ScorerFn};

/// Both group sizes must be below this for the exact path.
const EXACT_LIMIT: usize = 50;

thread_local! {
    /// Cache of exact cumulative distributions keyed by (n1, n0).
    ///
    /// Thread-local so permutation workers never contend on it.
    static EXACT_CDF_CACHE: RefCell<HashMap<(usize, usize), Rc<Vec<f64>>>> =
        RefCell::new(HashMap::new());
}

/// Rank-sum kernel.
///
/// Alternatives select the tail: `Less` is the lower tail of `W`, `Greater`
/// the upper, `TwoSided` twice the smaller. In [`ScoreMode::Stat`] the
/// reported statistic is oriented so that higher is better under the chosen
/// alternative: `W` for `Greater`, `n1*n0 - W` for `Less`, and
/// `|W - n1*n0/2|` for `TwoSided`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WilcoxonScorer {
    pub alternative: Alternative,
    pub mode: ScoreMode,
}

impl WilcoxonScorer {
    pub fn new(alternative: Alternative, mode: ScoreMode) -> Self {
        Self { alternative, mode }
    }

    fn p_value(&self, ctx: &ScoreContext<'_>, w: f64, n1: usize, n0: usize) -> f64 {
        if n1 < EXACT_LIMIT && n0 < EXACT_LIMIT && !ctx.has_ties() {
            self.exact_p(w, n1, n0)
        } else {
            self.normal_p(ctx, w, n1, n0)
        }
    }

    /// Exact tail probability from the Mann-Whitney count distribution.
    fn exact_p(&self, w: f64, n1: usize, n0: usize) -> f64 {
        let cdf = exact_cdf(n1, n0);
        let max_w = n1 * n0;
        // tie-free ranks make W an integer
        let w = (w.round() as usize).min(max_w);

        let p_less = cdf[w];
        let p_greater = if w == 0 { 1.0 } else { 1.0 - cdf[w - 1] };
        match self.alternative {
            Alternative::Less => p_less,
            Alternative::Greater => p_greater,
            Alternative::TwoSided => (2.0 * p_less.min(p_greater)).min(1.0),
        }
    }

    /// Normal approximation with continuity and tie corrections.
    fn normal_p(&self, ctx: &ScoreContext<'_>, w: f64, n1: usize, n0: usize) -> f64 {
        let (n1, n0) = (n1 as f64, n0 as f64);
        let n = n1 + n0;
        let mean = n1 * n0 / 2.0;
        let var = n1 * n0 / 12.0 * ((n + 1.0) - ctx.tie_correction() / (n * (n - 1.0)));
        if var <= 0.0 {
            return 1.0;
        }
        let sd = var.sqrt();

        match self.alternative {
            Alternative::Greater => normal_sf((w - mean - 0.5) / sd),
            Alternative::Less => normal_cdf((w - mean + 0.5) / sd),
            Alternative::TwoSided => {
                let z = w - mean;
                let z = (z - 0.5 * z.signum()) / sd;
                (2.0 * normal_sf(z.abs())).min(1.0)
            }
        }
    }
}

impl ScorerFn for WilcoxonScorer {
    fn name(&self) -> &'static str {
        "wilcoxon"
    }

    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        let n1 = row.count_ones();
        let n0 = ctx.n_samples() - n1;
        if n1 == 0 || n0 == 0 {
            return f64::NEG_INFINITY;
        }

        let rank_sum: f64 = row.iter_ones().map(|i| ctx.avg_ranks()[i]).sum();
        let w = rank_sum - (n1 * (n1 + 1)) as f64 / 2.0;
        let max_w = (n1 * n0) as f64;

        match self.mode {
            ScoreMode::Stat => match self.alternative {
                Alternative::Greater => w,
                Alternative::Less => max_w - w,
                Alternative::TwoSided => (w - max_w / 2.0).abs(),
            },
            ScoreMode::Pval => neg_log_p(self.p_value(ctx, w, n1, n0)),
        }
    }
}

/// Cumulative distribution `P(W <= w)` of the Mann-Whitney count for group
/// sizes (n1, n0), computed by subset-sum counting and cached per thread.
fn exact_cdf(n1: usize, n0: usize) -> Rc<Vec<f64>> {
    EXACT_CDF_CACHE.with(|cache| {
        if let Some(cdf) = cache.borrow().get(&(n1, n0)) {
            return Rc::clone(cdf);
        }

        let n = n1 + n0;
        let min_sum = n1 * (n1 + 1) / 2;
        let max_sum = min_sum + n1 * n0;

        // ways[m][s]: subsets of {1..n} of size m with rank sum s
        let mut ways = vec![vec![0.0f64; max_sum + 1]; n1 + 1];
        ways[0][0] = 1.0;
        for v in 1..=n {
            for m in (1..=n1).rev() {
                for s in (v..=max_sum).rev() {
                    let add = ways[m - 1][s - v];
                    if add > 0.0 {
                        ways[m][s] += add;
                    }
                }
            }
        }

        let total: f64 = ways[n1][min_sum..=max_sum].iter().sum();
        let mut cdf = Vec::with_capacity(n1 * n0 + 1);
        let mut cum = 0.0;
        for u in 0..=n1 * n0 {
            cum += ways[n1][min_sum + u] / total;
            cdf.push(cum.min(1.0));
        }

        let cdf = Rc::new(cdf);
        cache.borrow_mut().insert((n1, n0), Rc::clone(&cdf));
        cdf
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureMatrix, SampleScores};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn fixture(n: usize, rank_sets: &[&[usize]]) -> (FeatureMatrix, SampleScores) {
        let mut values = Array2::zeros((rank_sets.len(), n));
        for (i, set) in rank_sets.iter().enumerate() {
            for &rank in *set {
                values[[i, rank - 1]] = 1.0;
            }
        }
        let row_labels: Vec<String> = (0..rank_sets.len()).map(|i| format!("f{i}")).collect();
        let col_labels: Vec<String> = (0..n).map(|j| format!("s{j}")).collect();
        let matrix = FeatureMatrix::from_array(
            values.view(),
            &row_labels.iter().map(String::as_str).collect::<Vec<_>>(),
            &col_labels.iter().map(String::as_str).collect::<Vec<_>>(),
        )
        .unwrap();
        let scores =
            SampleScores::new(col_labels, (0..n).map(|j| (n - j) as f64).collect()).unwrap();
        (matrix, scores)
    }

    #[test]
    fn statistic_is_mann_whitney_count() {
        // 1s at ranks {1, 3}: rank sum 4, W = 4 - 3 = 1
        let (m, s) = fixture(6, &[&[1, 3]]);
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = WilcoxonScorer::new(Alternative::Greater, ScoreMode::Stat);
        assert_relative_eq!(kernel.score_row(&ctx, m.row(0)), 1.0, max_relative = 1e-12);

        // `less` reflects: n1*n0 - W = 8 - 1 = 7
        let kernel = WilcoxonScorer::new(Alternative::Less, ScoreMode::Stat);
        assert_relative_eq!(kernel.score_row(&ctx, m.row(0)), 7.0, max_relative = 1e-12);
    }

    #[test]
    fn exact_distribution_small_case() {
        // n1 = 2, n0 = 2: W uniform over {0,1,2,3,4} with weights 1,1,2,1,1
        let cdf = exact_cdf(2, 2);
        let expected = [1.0 / 6.0, 2.0 / 6.0, 4.0 / 6.0, 5.0 / 6.0, 1.0];
        for (got, want) in cdf.iter().zip(expected) {
            assert_relative_eq!(*got, want, max_relative = 1e-12);
        }
    }

    #[test]
    fn exact_p_lower_tail() {
        // ranks {1, 2} of 4: W = 0; P(W <= 0) = 1/6
        let (m, s) = fixture(4, &[&[1, 2]]);
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = WilcoxonScorer::new(Alternative::Less, ScoreMode::Pval);
        let score = kernel.score_row(&ctx, m.row(0));
        assert_relative_eq!(score, -(1.0f64 / 6.0).ln(), max_relative = 1e-12);

        // upper tail of the same row: P(W >= 0) = 1
        let kernel = WilcoxonScorer::new(Alternative::Greater, ScoreMode::Pval);
        assert_relative_eq!(kernel.score_row(&ctx, m.row(0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn normal_path_taken_with_ties() {
        let (m, _) = fixture(6, &[&[1, 3]]);
        // tied scores force the normal approximation
        let s = SampleScores::new(
            m.col_labels().to_vec(),
            vec![5.0, 5.0, 4.0, 3.0, 2.0, 1.0],
        )
        .unwrap();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        assert!(ctx.has_ties());
        let kernel = WilcoxonScorer::new(Alternative::Less, ScoreMode::Pval);
        let score = kernel.score_row(&ctx, m.row(0));
        assert!(score.is_finite());
        assert!(score > 0.0);
    }

    #[test]
    fn two_sided_pval_caps_at_one() {
        // perfectly balanced row: W = n1*n0/2, two-sided p = 1
        let (m, s) = fixture(4, &[&[1, 4]]);
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = WilcoxonScorer::new(Alternative::TwoSided, ScoreMode::Pval);
        assert_relative_eq!(kernel.score_row(&ctx, m.row(0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn pval_orders_like_enrichment() {
        let (m, s) = fixture(12, &[&[1, 2, 3], &[5, 6, 7], &[10, 11, 12]]);
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = WilcoxonScorer::new(Alternative::Less, ScoreMode::Pval);
        let top = kernel.score_row(&ctx, m.row(0));
        let mid = kernel.score_row(&ctx, m.row(1));
        let bottom = kernel.score_row(&ctx, m.row(2));
        assert!(top > mid);
        assert!(mid > bottom);
    }
}
