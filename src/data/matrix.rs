//! The binary feature matrix.
//!
//! [`FeatureMatrix`] owns M bit-packed feature rows over N labeled sample
//! columns. Construction validates everything the search relies on: cells
//! are strictly 0/1, no row is constant, and labels are unique and
//! non-empty. After that the matrix is immutable and shared by reference
//! for the lifetime of a run.

use std::collections::{HashMap, HashSet};

use ndarray::ArrayView2;

use super::bits::BitRow;
use super::error::DataError;

/// An M×N binary feature matrix with row and column labels.
///
/// Rows are features, columns are samples. Row indices are stable for the
/// lifetime of the matrix; [`FeatureMatrix::reorder_cols`] returns a new
/// matrix and never mutates in place.
///
/// # Example
///
/// ```
/// use metafeat::data::FeatureMatrix;
/// use ndarray::array;
///
/// let values = array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]];
/// let m = FeatureMatrix::from_array(
///     values.view(),
///     &["TP53", "KRAS"],
///     &["s1", "s2", "s3"],
/// )
/// .unwrap();
///
/// assert_eq!(m.n_features(), 2);
/// assert_eq!(m.n_samples(), 3);
/// assert_eq!(m.row_count_ones(0), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    rows: Vec<BitRow>,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    row_index: HashMap<String, usize>,
}

impl FeatureMatrix {
    /// Build from a dense 0/1 matrix with labels.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] if the matrix is empty, any cell is not exactly
    /// 0 or 1, any row is all-zero or all-one, or labels are missing,
    /// empty, or duplicated.
    pub fn from_array(
        values: ArrayView2<'_, f64>,
        row_labels: &[&str],
        col_labels: &[&str],
    ) -> Result<Self, DataError> {
        let (n_rows, n_cols) = values.dim();
        if n_rows == 0 || n_cols == 0 {
            return Err(DataError::EmptyMatrix);
        }

        let mut rows = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            let mut row = BitRow::zeros(n_cols);
            for j in 0..n_cols {
                let v = values[[i, j]];
                if v == 1.0 {
                    row.set(j);
                } else if v != 0.0 {
                    return Err(DataError::NonBinaryValue {
                        row: i,
                        col: j,
                        value: v,
                    });
                }
            }
            rows.push(row);
        }

        Self::from_rows(
            rows,
            row_labels.iter().map(|s| s.to_string()).collect(),
            col_labels.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Build from pre-packed rows with owned labels.
    ///
    /// This is the primary constructor; all other constructors funnel into
    /// it so validation happens exactly once.
    ///
    /// # Errors
    ///
    /// Same contract as [`FeatureMatrix::from_array`].
    pub fn from_rows(
        rows: Vec<BitRow>,
        row_labels: Vec<String>,
        col_labels: Vec<String>,
    ) -> Result<Self, DataError> {
        if rows.is_empty() {
            return Err(DataError::EmptyMatrix);
        }
        let n_cols = rows[0].len();
        if n_cols == 0 {
            return Err(DataError::EmptyMatrix);
        }

        if row_labels.len() != rows.len() {
            return Err(DataError::LabelCountMismatch {
                kind: "row",
                expected: rows.len(),
                got: row_labels.len(),
            });
        }
        if col_labels.len() != n_cols {
            return Err(DataError::LabelCountMismatch {
                kind: "column",
                expected: n_cols,
                got: col_labels.len(),
            });
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(DataError::RowLengthMismatch {
                    index: i,
                    expected: n_cols,
                    got: row.len(),
                });
            }
            if row.is_all_zeros() {
                return Err(DataError::ConstantRow {
                    label: row_labels[i].clone(),
                    value: 0,
                });
            }
            if row.is_all_ones() {
                return Err(DataError::ConstantRow {
                    label: row_labels[i].clone(),
                    value: 1,
                });
            }
        }

        validate_labels("row", &row_labels)?;
        validate_labels("column", &col_labels)?;

        let row_index = row_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();

        Ok(Self {
            rows,
            row_labels,
            col_labels,
            row_index,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.rows.len()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.rows[0].len()
    }

    /// Constant-time row reference.
    #[inline]
    pub fn row(&self, i: usize) -> &BitRow {
        &self.rows[i]
    }

    /// Popcount of row `i`.
    #[inline]
    pub fn row_count_ones(&self, i: usize) -> usize {
        self.rows[i].count_ones()
    }

    /// Fraction of ones in row `i`.
    pub fn prevalence(&self, i: usize) -> f64 {
        self.row_count_ones(i) as f64 / self.n_samples() as f64
    }

    /// Row labels, in row order.
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    /// Column labels, in column order.
    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    /// Label of row `i`.
    #[inline]
    pub fn row_label(&self, i: usize) -> &str {
        &self.row_labels[i]
    }

    /// Index of the row with the given label, if present.
    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.row_index.get(label).copied()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Elementwise OR across a set of row indices.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is empty or any index is out of range.
    pub fn or_union(&self, rows: &[usize]) -> BitRow {
        assert!(!rows.is_empty(), "or_union over an empty row set");
        let mut union = self.rows[rows[0]].clone();
        for &i in &rows[1..] {
            union.or_assign(&self.rows[i]);
        }
        union
    }

    /// Matrix with columns permuted: new column `j` is old column `perm[j]`.
    ///
    /// Row labels, row indices, and column labels all travel with their
    /// data, so the permuted matrix is fully equivalent to the original.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidPermutation`] if `perm` is not a
    /// permutation of `0..n_samples`.
    pub fn reorder_cols(&self, perm: &[usize]) -> Result<Self, DataError> {
        let n = self.n_samples();
        let invalid = || DataError::InvalidPermutation {
            expected: n,
            got: perm.len(),
        };
        if perm.len() != n {
            return Err(invalid());
        }
        let mut seen = vec![false; n];
        for &j in perm {
            if j >= n || seen[j] {
                return Err(invalid());
            }
            seen[j] = true;
        }

        let rows = self.rows.iter().map(|r| r.permuted(perm)).collect();
        let col_labels = perm.iter().map(|&j| self.col_labels[j].clone()).collect();
        Ok(Self {
            rows,
            row_labels: self.row_labels.clone(),
            col_labels,
            row_index: self.row_index.clone(),
        })
    }

    /// Restrict to rows whose fraction of ones lies in `[min_cutoff, max_cutoff]`.
    ///
    /// This is the prevalence pre-filter applied before a search; row order
    /// and labels are preserved for the surviving rows.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidCutoffs`] for cutoffs outside `[0, 1]` or
    /// `min > max`, and [`DataError::FilterRemovedAllRows`] when nothing
    /// survives.
    pub fn prefilter(&self, min_cutoff: f64, max_cutoff: f64) -> Result<Self, DataError> {
        if !(0.0..=1.0).contains(&min_cutoff)
            || !(0.0..=1.0).contains(&max_cutoff)
            || min_cutoff > max_cutoff
        {
            return Err(DataError::InvalidCutoffs {
                min: min_cutoff,
                max: max_cutoff,
            });
        }

        let keep: Vec<usize> = (0..self.n_features())
            .filter(|&i| {
                let p = self.prevalence(i);
                p >= min_cutoff && p <= max_cutoff
            })
            .collect();
        if keep.is_empty() {
            return Err(DataError::FilterRemovedAllRows {
                min: min_cutoff,
                max: max_cutoff,
            });
        }

        let rows = keep.iter().map(|&i| self.rows[i].clone()).collect();
        let row_labels: Vec<String> = keep.iter().map(|&i| self.row_labels[i].clone()).collect();
        let row_index = row_labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Ok(Self {
            rows,
            row_labels,
            col_labels: self.col_labels.clone(),
            row_index,
        })
    }
}

fn validate_labels(kind: &'static str, labels: &[String]) -> Result<(), DataError> {
    let mut seen = HashSet::with_capacity(labels.len());
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
