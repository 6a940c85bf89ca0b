//! Input validation errors for matrices, scores, and weights.

use thiserror::Error;

/// Errors raised while validating input data.
///
/// All of these are fatal: they come out of constructors before any search
/// state exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("feature matrix has no rows or no columns")]
    EmptyMatrix,

    #[error("matrix cell ({row}, {col}) is {value}, expected 0 or 1")]
    NonBinaryValue { row: usize, col: usize, value: f64 },

    #[error("feature row '{label}' is all-{value}; constant rows carry no signal")]
    ConstantRow { label: String, value: u8 },

    #[error("row {index} has length {got}, expected {expected}")]
    RowLengthMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("{kind} label at position {index} is empty")]
    EmptyLabel { kind: &'static str, index: usize },

    #[error("duplicate {kind} label '{label}'")]
    DuplicateLabel { kind: &'static str, label: String },

    #[error("expected {expected} {kind} labels, got {got}")]
    LabelCountMismatch {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("score value for sample '{label}' is not finite")]
    NonFiniteScore { label: String },

    #[error("sample '{label}' appears in the {missing_from} labels but not the other side")]
    LabelSetMismatch {
        label: String,
        missing_from: &'static str,
    },

    #[error("weights are all zero")]
    AllZeroWeights,

    #[error("weight value for sample '{label}' is negative or not finite")]
    InvalidWeight { label: String },

    #[error("column permutation of length {got} does not match {expected} columns")]
    InvalidPermutation { expected: usize, got: usize },

    #[error("prevalence cutoffs [{min}, {max}] are outside [0, 1] or inverted")]
    InvalidCutoffs { min: f64, max: f64 },

    #[error("prevalence filter [{min}, {max}] removed every row")]
    FilterRemovedAllRows { min: f64, max: f64 },
}
