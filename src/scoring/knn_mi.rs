//! k-nearest-neighbor mutual information kernel.
//!
//! Kraskov-style estimator for the mixed case: the composite row is a
//! discrete marginal, the sample scores are continuous. For each sample the
//! radius to its k-th neighbor *within its own group* is measured on the
//! score axis, then the neighbor count within that radius over *all*
//! samples enters a digamma average:
//!
//! `I = psi(N) - <psi(N_group(i))> + <psi(k_i)> - <psi(m_i)>`

use crate::data::BitRow;

use super::stats::digamma;
use super::{ScoreContext, ScorerFn};

/// k-NN MI kernel. Higher MI is better; no p-value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KnnMiScorer {
    pub k: usize,
}

impl Default for KnnMiScorer {
    fn default() -> Self {
        Self { k: 3 }
    }
}

impl KnnMiScorer {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }
}

impl ScorerFn for KnnMiScorer {
    fn name(&self) -> &'static str {
        "knnmi"
    }

    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        let n = ctx.n_samples();
        let n1 = row.count_ones();
        let n0 = n - n1;
        if n1 == 0 || n0 == 0 {
            return f64::NEG_INFINITY;
        }

        // group score values in ascending order
        let mut group1 = Vec::with_capacity(n1);
        let mut group0 = Vec::with_capacity(n0);
        for &sample in ctx.order().iter().rev() {
            let v = ctx.values()[sample];
            if row.get(sample) {
                group1.push(v);
            } else {
                group0.push(v);
            }
        }
        let all = ctx.sorted_values();

        let mut psi_group = 0.0;
        let mut psi_k = 0.0;
        let mut psi_m = 0.0;
        let mut counted = 0usize;

        for (group, size) in [(&group1, n1), (&group0, n0)] {
            if size < 2 {
                // a singleton group has no within-group neighbors
                continue;
            }
            let k = self.k.min(size - 1);
            for (pos, &v) in group.iter().enumerate() {
                let radius = kth_neighbor_radius(group, pos, k);
                let m = count_within(all, v, radius) - 1; // exclude self
                psi_group += digamma(size as f64);
                psi_k += digamma(k as f64);
                psi_m += digamma(m.max(1) as f64);
                counted += 1;
            }
        }

        if counted == 0 {
            return 0.0;
        }
        let inv = 1.0 / counted as f64;
        digamma(n as f64) - psi_group * inv + psi_k * inv - psi_m * inv
    }
}

/// Distance from `values[pos]` to its k-th nearest neighbor within the
/// sorted slice, excluding itself.
fn kth_neighbor_radius(values: &[f64], pos: usize, k: usize) -> f64 {
    let center = values[pos];
    let (mut lo, mut hi) = (pos, pos);
    for _ in 0..k {
        let left = if lo > 0 {
            center - values[lo - 1]
        } else {
            f64::INFINITY
        };
        let right = if hi + 1 < values.len() {
            values[hi + 1] - center
        } else {
            f64::INFINITY
        };
        if left <= right {
            lo -= 1;
        } else {
            hi += 1;
        }
    }
    let left = if lo < pos { center - values[lo] } else { 0.0 };
    let right = if hi > pos { values[hi] - center } else { 0.0 };
    left.max(right)
}

/// Number of entries of the sorted slice within `radius` of `center`
/// (inclusive).
fn count_within(sorted: &[f64], center: f64, radius: f64) -> usize {
    let lo = sorted.partition_point(|&v| v < center - radius);
    let hi = sorted.partition_point(|&v| v <= center + radius);
    hi - lo
}
