//! Correlation score kernel.
//!
//! Pearson correlates the raw scores with the 0/1 row (point-biserial);
//! Spearman correlates tie-averaged ranks on both sides. Without an
//! alternative the kernel reports `|corr|`; with one it reports the signed
//! correlation oriented so that higher is better.

use crate::data::BitRow;

use super::{Alternative, ScoreContext, ScorerFn};

/// Correlation flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

/// Pearson/Spearman kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorrelationScorer {
    pub method: CorrelationMethod,
    pub alternative: Option<Alternative>,
}

impl CorrelationScorer {
    pub fn new(method: CorrelationMethod, alternative: Option<Alternative>) -> Self {
        Self {
            method,
            alternative,
        }
    }
}

impl ScorerFn for CorrelationScorer {
    fn name(&self) -> &'static str {
        match self.method {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
        }
    }

    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        let n = ctx.n_samples();
        let n1 = row.count_ones();
        if n1 == 0 || n1 == n {
            return f64::NEG_INFINITY;
        }

        let corr = match self.method {
            CorrelationMethod::Pearson => binary_corr(ctx.values(), row),
            CorrelationMethod::Spearman => {
                // ascending score ranks, so the sign convention matches
                // Pearson on the raw values
                let n1f = (n + 1) as f64;
                let asc: Vec<f64> = ctx.avg_ranks().iter().map(|r| n1f - r).collect();
                binary_corr(&asc, row)
            }
        };

        match self.alternative {
            None | Some(Alternative::TwoSided) => corr.abs(),
            Some(Alternative::Greater) => corr,
            Some(Alternative::Less) => -corr,
        }
    }
}

/// Pearson correlation of `x` with a 0/1 indicator.
///
/// Near-zero variance on either side returns 0.
fn binary_corr(x: &[f64], row: &BitRow) -> f64 {
    let n = x.len() as f64;
    let n1 = row.count_ones() as f64;

    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = n1 / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (i, &xi) in x.iter().enumerate() {
        let dx = xi - mean_x;
        let dy = f64::from(u8::from(row.get(i))) - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
    }
    let var_y = n1 * (1.0 - mean_y);

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-12 {
        return 0.0;
    }
    cov / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureMatrix, SampleScores};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn fixture() -> (FeatureMatrix, SampleScores) {
        let values = array![
            [1.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0, 0.0],
        ];
        let m = FeatureMatrix::from_array(
            values.view(),
            &["high", "low", "mixed"],
            &["s0", "s1", "s2", "s3"],
        )
        .unwrap();
        let s =
            SampleScores::from_pairs(&[("s0", 4.0), ("s1", 3.0), ("s2", 2.0), ("s3", 1.0)])
                .unwrap();
        (m, s)
    }

    #[test]
    fn pearson_point_biserial() {
        let (m, s) = fixture();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = CorrelationScorer::new(CorrelationMethod::Pearson, Some(Alternative::Greater));
        // x = [4,3,2,1], y = [1,1,0,0]: r = cov/sqrt(var_x var_y)
        // cov = 1.5+0.5+0.5+1.5 -> signed: (1.5)(.5)+(0.5)(.5)+(-0.5)(-.5)+(-1.5)(-.5) = 2
        // var_x = 5, var_y = 1 -> r = 2/sqrt(5)
        let expected = 2.0 / 5.0f64.sqrt();
        assert_relative_eq!(kernel.score_row(&ctx, m.row(0)), expected, max_relative = 1e-12);
        // the complementary row is perfectly anti-correlated with it
        assert_relative_eq!(
            kernel.score_row(&ctx, m.row(1)),
            -expected,
            max_relative = 1e-12
        );
    }

    #[test]
    fn alternative_orients_the_sign() {
        let (m, s) = fixture();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let greater =
            CorrelationScorer::new(CorrelationMethod::Pearson, Some(Alternative::Greater));
        let less = CorrelationScorer::new(CorrelationMethod::Pearson, Some(Alternative::Less));
        let unsigned = CorrelationScorer::new(CorrelationMethod::Pearson, None);

        let g = greater.score_row(&ctx, m.row(1));
        let l = less.score_row(&ctx, m.row(1));
        let u = unsigned.score_row(&ctx, m.row(1));
        assert!(g < 0.0);
        assert_relative_eq!(l, -g, max_relative = 1e-12);
        assert_relative_eq!(u, g.abs(), max_relative = 1e-12);
    }

    #[test]
    fn spearman_matches_pearson_on_monotone_scores() {
        let (m, _) = fixture();
        // monotone but non-linear scores: ranks are what matter
        let s = SampleScores::from_pairs(&[
            ("s0", 100.0),
            ("s1", 10.0),
            ("s2", 1.0),
            ("s3", 0.1),
        ])
        .unwrap();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let spearman =
            CorrelationScorer::new(CorrelationMethod::Spearman, Some(Alternative::Greater));
        // spearman on any strictly decreasing score vector equals pearson
        // against the rank vector [4,3,2,1]
        let expected = 2.0 / 5.0f64.sqrt();
        assert_relative_eq!(
            spearman.score_row(&ctx, m.row(0)),
            expected,
            max_relative = 1e-12
        );
    }

    #[test]
    fn zero_variance_returns_zero() {
        let (m, _) = fixture();
        let s = SampleScores::from_pairs(&[("s0", 2.0), ("s1", 2.0), ("s2", 2.0), ("s3", 2.0)])
            .unwrap();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = CorrelationScorer::new(CorrelationMethod::Pearson, Some(Alternative::Greater));
        assert_eq!(kernel.score_row(&ctx, m.row(0)), 0.0);
    }

    #[test]
    fn contract_labels_cover_all_rows() {
        let (m, s) = fixture();
        let ctx = ScoreContext::new(&m, &s, None).unwrap();
        let kernel = CorrelationScorer::new(CorrelationMethod::Spearman, None);
        let all = kernel.score_all(&ctx, &[], None).unwrap();
        let mut labels: Vec<_> = all.iter().map(|r| r.label.as_str()).collect();
        labels.sort_unstable();
        assert_eq!(labels, vec!["high", "low", "mixed"]);
    }
}
