//! Input data model: the binary feature matrix and the labeled sample
//! scores it is searched against.
//!
//! # Overview
//!
//! - [`FeatureMatrix`]: M×N bit-packed 0/1 matrix with row/column labels
//! - [`BitRow`]: one packed row, the unit the search ORs together
//! - [`SampleScores`] / [`SampleWeights`]: labeled per-sample vectors
//! - [`LabeledAssay`]: the container boundary for wrapped assays
//!
//! All validation happens at construction; everything downstream assumes
//! the invariants hold (strictly binary cells, no constant rows, labels
//! unique and bijective between matrix columns and score entries).

mod assay;
mod bits;
mod error;
mod matrix;
mod scores;

pub use assay::LabeledAssay;
pub use bits::BitRow;
pub use error::DataError;
pub use matrix::FeatureMatrix;
pub use scores::{SampleScores, SampleWeights};
