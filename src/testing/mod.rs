//! Seeded synthetic data for tests and examples.

use rand::prelude::*;
use rand_distr::Normal;

use crate::data::{BitRow, FeatureMatrix, SampleScores};

/// Sample labels `S0..Sn`.
pub fn sample_labels(n: usize) -> Vec<String> {
    (0..n).map(|j| format!("S{j}")).collect()
}

/// Random binary matrix with roughly the given density of ones.
///
/// Constant rows are repaired by flipping one deterministic bit, so every
/// generated matrix passes input validation.
pub fn random_binary_matrix(
    n_features: usize,
    n_samples: usize,
    density: f64,
    seed: u64,
) -> FeatureMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_features);
    for i in 0..n_features {
        let mut row = BitRow::zeros(n_samples);
        for j in 0..n_samples {
            if rng.gen::<f64>() < density {
                row.set(j);
            }
        }
        if row.is_all_zeros() {
            row.set(i % n_samples);
        } else if row.is_all_ones() {
            row = BitRow::from_bools(
                &(0..n_samples).map(|j| j != i % n_samples).collect::<Vec<_>>(),
            );
        }
        rows.push(row);
    }
    let row_labels = (0..n_features).map(|i| format!("F{i}")).collect();
    FeatureMatrix::from_rows(rows, row_labels, sample_labels(n_samples))
        .expect("generated matrix is valid")
}

/// Standard-normal scores labeled `S0..Sn`.
pub fn normal_scores(n_samples: usize, seed: u64) -> SampleScores {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).expect("valid normal");
    let values: Vec<f64> = (0..n_samples).map(|_| normal.sample(&mut rng)).collect();
    SampleScores::new(sample_labels(n_samples), values).expect("generated scores are valid")
}

/// Matrix whose rows have 1s exactly at the given descending-rank
/// positions (1-based), paired with strictly decreasing scores so that
/// rank `r` is sample `r - 1`.
pub fn matrix_from_rank_sets(
    n_samples: usize,
    named_sets: &[(&str, &[usize])],
) -> (FeatureMatrix, SampleScores) {
    let mut rows = Vec::with_capacity(named_sets.len());
    for (_, set) in named_sets {
        let mut row = BitRow::zeros(n_samples);
        for &rank in *set {
            row.set(rank - 1);
        }
        rows.push(row);
    }
    let row_labels = named_sets.iter().map(|(l, _)| l.to_string()).collect();
    let matrix = FeatureMatrix::from_rows(rows, row_labels, sample_labels(n_samples))
        .expect("rank-set matrix is valid");
    let scores = SampleScores::new(
        sample_labels(n_samples),
        (0..n_samples).map(|j| (n_samples - j) as f64).collect(),
    )
    .expect("rank scores are valid");
    (matrix, scores)
}
