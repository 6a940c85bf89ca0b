//! The labeled-assay container boundary.
//!
//! Upstream containers that carry a binary assay alongside metadata only
//! need to expose the assay and its dimension names; nothing else of the
//! container is used.

use ndarray::ArrayView2;

use super::error::DataError;
use super::matrix::FeatureMatrix;

/// A container exposing a labeled binary assay.
///
/// The three methods are the entire contract: the assay values in
/// feature-major orientation, the feature (row) names, and the sample
/// (column) names.
pub trait LabeledAssay {
    /// The assay values, shape `[n_features, n_samples]`.
    fn assay(&self) -> ArrayView2<'_, f64>;

    /// Feature names, one per assay row.
    fn rownames(&self) -> &[String];

    /// Sample names, one per assay column.
    fn colnames(&self) -> &[String];
}

impl FeatureMatrix {
    /// Build a validated matrix from any [`LabeledAssay`] container.
    ///
    /// # Errors
    ///
    /// Same contract as [`FeatureMatrix::from_array`].
    pub fn from_assay(container: &impl LabeledAssay) -> Result<Self, DataError> {
        let rows: Vec<&str> = container.rownames().iter().map(String::as_str).collect();
        let cols: Vec<&str> = container.colnames().iter().map(String::as_str).collect();
        Self::from_array(container.assay(), &rows, &cols)
    }
}
