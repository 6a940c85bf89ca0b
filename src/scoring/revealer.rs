//! REVEALER-style conditional information coefficient kernel.
//!
//! Scores a candidate row by the mutual information between the sample
//! scores and the row, conditioned on the current meta-feature union:
//!
//! `I(S;R|U) = H(S,U) + H(R,U) - H(U) - H(S,R,U)`
//!
//! Joint densities over the continuous score come from Gaussian kernel
//! density estimates (Silverman bandwidth) evaluated on a fixed grid; the
//! information is then rescaled to the correlation-like coefficient
//! `IC = sign(rho) * sqrt(1 - exp(-2I))`.

use crate::data::BitRow;

use super::{ScoreContext, ScorerFn};

/// Conditional-IC kernel. Higher IC is better; no p-value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealerScorer {
    /// Number of integration grid points on the score axis.
    pub grid_size: usize,
}

impl Default for RevealerScorer {
    fn default() -> Self {
        Self { grid_size: 64 }
    }
}

impl RevealerScorer {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size: grid_size.max(8),
        }
    }

    /// Information coefficient of `s` against `row`, conditioned on
    /// `union` when present.
    fn ic(&self, ctx: &ScoreContext<'_>, row: &BitRow, union: Option<&BitRow>) -> f64 {
        let values = ctx.values();
        let n = values.len();

        let h = silverman_bandwidth(ctx.sorted_values());
        if h <= 0.0 {
            // constant scores carry no information
            return 0.0;
        }

        // stratum id per sample: bit 0 = row, bit 1 = union
        let stratum = |i: usize| -> usize {
            let r = usize::from(row.get(i));
            let u = union.map_or(0, |u| usize::from(u.get(i)));
            r | (u << 1)
        };
        let n_strata = if union.is_some() { 4 } else { 2 };

        // joint KDE p(s, stratum) on the grid
        let lo = ctx.sorted_values()[0] - 3.0 * h;
        let hi = ctx.sorted_values()[n - 1] + 3.0 * h;
        let grid = self.grid_size;
        let step = (hi - lo) / (grid - 1) as f64;
        let norm = 1.0 / (n as f64 * h * (2.0 * std::f64::consts::PI).sqrt());

        let mut joint = vec![vec![0.0f64; grid]; n_strata];
        let mut counts = vec![0usize; n_strata];
        for i in 0..n {
            let sid = stratum(i);
            counts[sid] += 1;
            let v = values[i];
            for (g, cell) in joint[sid].iter_mut().enumerate() {
                let z = (lo + g as f64 * step - v) / h;
                *cell += norm * (-0.5 * z * z).exp();
            }
        }

        // entropies from the grid and the discrete marginals
        let h_sru = joint
            .iter()
            .map(|density| entropy_grid(density, step))
            .sum::<f64>();

        // p(s, u): collapse the row bit
        let h_su = if union.is_some() {
            let mut acc = 0.0;
            for u in 0..2 {
                let merged: Vec<f64> = (0..grid)
                    .map(|g| joint[u << 1][g] + joint[1 | (u << 1)][g])
                    .collect();
                acc += entropy_grid(&merged, step);
            }
            acc
        } else {
            let merged: Vec<f64> = (0..grid).map(|g| joint[0][g] + joint[1][g]).collect();
            entropy_grid(&merged, step)
        };

        let h_ru = discrete_entropy(&counts, n);
        let h_u = if union.is_some() {
            let u_counts = [counts[0] + counts[1], counts[2] + counts[3]];
            discrete_entropy(&u_counts, n)
        } else {
            0.0
        };

        let info = (h_su + h_ru - h_u - h_sru).max(0.0);

        let sign = pearson_sign(values, row, union);
        sign * (1.0 - (-2.0 * info).exp()).max(0.0).sqrt()
    }
}

impl ScorerFn for RevealerScorer {
    fn name(&self) -> &'static str {
        "revealer"
    }

    fn score_row(&self, ctx: &ScoreContext<'_>, row: &BitRow) -> f64 {
        let n1 = row.count_ones();
        if n1 == 0 || n1 == ctx.n_samples() {
            return f64::NEG_INFINITY;
        }
        self.ic(ctx, row, None)
    }

    fn score_with_meta(&self, ctx: &ScoreContext<'_>, row: &BitRow, union: &BitRow) -> f64 {
        if union.or(row).is_all_ones() {
            return f64::NEG_INFINITY;
        }
        self.ic(ctx, row, Some(union))
    }
}

/// Silverman's rule-of-thumb bandwidth over sorted values.
fn silverman_bandwidth(sorted: &[f64]) -> f64 {
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let var = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    let sd = var.sqrt();

    let q1 = sorted[sorted.len() / 4];
    let q3 = sorted[(sorted.len() * 3) / 4];
    let iqr = (q3 - q1) / 1.34;

    let spread = if iqr > 0.0 { sd.min(iqr) } else { sd };
    0.9 * spread * n.powf(-0.2)
}

/// `-sum p ln p` over the grid via the trapezoid rule.
fn entropy_grid(density: &[f64], step: f64) -> f64 {
    let term = |p: f64| {
        if p > 0.0 {
            -p * p.max(f64::MIN_POSITIVE).ln()
        } else {
            0.0
        }
    };
    let mut acc = 0.0;
    for pair in density.windows(2) {
        acc += 0.5 * (term(pair[0]) + term(pair[1])) * step;
    }
    acc
}

/// `-sum p ln p` for discrete counts.
fn discrete_entropy(counts: &[usize], n: usize) -> f64 {
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.ln()
        })
        .sum()
}

/// Sign of the correlation between the scores and the row being judged
/// (the composite when a meta-feature is present).
fn pearson_sign(values: &[f64], row: &BitRow, union: Option<&BitRow>) -> f64 {
    let judged = match union {
        Some(u) => u.or(row),
        None => row.clone(),
    };
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    for (i, &v) in values.iter().enumerate() {
        if judged.get(i) {
            cov += v - mean;
        }
    }
    if cov < 0.0 {
        -1.0
    } else {
        1.0
    }
}
