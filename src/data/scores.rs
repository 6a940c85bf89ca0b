//! Labeled sample scores and weights.
//!
//! [`SampleScores`] is the continuous per-sample response the kernels score
//! against; [`SampleWeights`] is the optional weighting used by the weighted
//! KS kernel. Both carry labels that must be a permutation of the matrix
//! column labels, and both are validated on construction and aligned to
//! matrix column order on entry to a search.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::DataError;
use super::matrix::FeatureMatrix;

/// A labeled vector of finite real scores, one per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleScores {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl SampleScores {
    /// Build from labels and values.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] on length mismatch, empty or duplicate labels,
    /// or non-finite values.
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> Result<Self, DataError> {
        if labels.len() != values.len() {
            return Err(DataError::LabelCountMismatch {
                kind: "score",
                expected: values.len(),
                got: labels.len(),
            });
        }
        validate_unique(&labels, "score")?;
        for (label, &v) in labels.iter().zip(&values) {
            if !v.is_finite() {
                return Err(DataError::NonFiniteScore {
                    label: label.clone(),
                });
            }
        }
        Ok(Self { labels, values })
    }

    /// Convenience constructor from `&str` labels.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self, DataError> {
        Self::new(
            pairs.iter().map(|(l, _)| l.to_string()).collect(),
            pairs.iter().map(|(_, v)| *v).collect(),
        )
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample labels in storage order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Score values in storage order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values rearranged into the matrix's column order.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::LabelSetMismatch`] unless the score labels are
    /// exactly a permutation of the matrix column labels.
    pub fn aligned_to(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DataError> {
        align(&self.labels, &self.values, matrix, "scores")
    }

    /// Same values under a permuted label assignment: entry `j` of the
    /// result is `values[perm[j]]` with labels unchanged.
    ///
    /// This is the label-shuffle primitive of the permutation driver; the
    /// caller guarantees `perm` is a permutation.
    pub(crate) fn permuted_values(&self, perm: &[usize]) -> Self {
        debug_assert_eq!(perm.len(), self.values.len());
        Self {
            labels: self.labels.clone(),
            values: perm.iter().map(|&i| self.values[i]).collect(),
        }
    }
}

/// A labeled vector of non-negative sample weights.
///
/// Used by the weighted KS kernel; labels follow the same bijection
/// contract as [`SampleScores`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleWeights {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl SampleWeights {
    /// Build from labels and values.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] on length mismatch, bad labels, negative or
    /// non-finite weights, or an all-zero vector.
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> Result<Self, DataError> {
        if labels.len() != values.len() {
            return Err(DataError::LabelCountMismatch {
                kind: "weight",
                expected: values.len(),
                got: labels.len(),
            });
        }
        validate_unique(&labels, "weight")?;
        for (label, &v) in labels.iter().zip(&values) {
            if !v.is_finite() || v < 0.0 {
                return Err(DataError::InvalidWeight {
                    label: label.clone(),
                });
            }
        }
        if values.iter().all(|&v| v == 0.0) {
            return Err(DataError::AllZeroWeights);
        }
        Ok(Self { labels, values })
    }

    /// Convenience constructor from `&str` labels.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self, DataError> {
        Self::new(
            pairs.iter().map(|(l, _)| l.to_string()).collect(),
            pairs.iter().map(|(_, v)| *v).collect(),
        )
    }

    /// Values rearranged into the matrix's column order.
    pub fn aligned_to(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DataError> {
        align(&self.labels, &self.values, matrix, "weights")
    }
}

fn validate_unique(labels: &[String], kind: &'static str) -> Result<(), DataError> {
    let mut seen = std::collections::HashSet::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        if label.is_empty() {
            return Err(DataError::EmptyLabel { kind, index: i });
        }
        if !seen.insert(label.as_str()) {
            return Err(DataError::DuplicateLabel {
                kind,
                label: label.clone(),
            });
        }
    }
    Ok(())
}

fn align(
    labels: &[String],
    values: &[f64],
    matrix: &FeatureMatrix,
    side: &'static str,
) -> Result<Vec<f64>, DataError> {
    let by_label: HashMap<&str, f64> = labels
        .iter()
        .map(String::as_str)
        .zip(values.iter().copied())
        .collect();

    let mut aligned = Vec::with_capacity(matrix.n_samples());
    for col in matrix.col_labels() {
        match by_label.get(col.as_str()) {
            Some(&v) => aligned.push(v),
            None => {
                return Err(DataError::LabelSetMismatch {
                    label: col.clone(),
                    missing_from: side,
                })
            }
        }
    }
    if labels.len() != matrix.n_samples() {
        // every column was found, so the extra label is on the score side
        let extra = labels
            .iter()
            .find(|l| matrix.col_labels().iter().all(|c| c.as_str() != l.as_str()))
            .cloned()
            .unwrap_or_default();
        return Err(DataError::LabelSetMismatch {
            label: extra,
            missing_from: "matrix columns",
        });
    }
    Ok(aligned)
}
