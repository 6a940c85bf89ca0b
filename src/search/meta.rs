//! Meta-feature state and the frozen per-seed search record.

use serde::{Deserialize, Serialize};

use crate::data::{BitRow, FeatureMatrix};

/// What a search step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Seed selection or a forward addition.
    Added,
    /// A backward removal.
    Removed,
}

/// One entry of the search trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchStep {
    /// Step index, 0 for the seed.
    pub index: usize,
    pub action: StepAction,
    /// Row the step added or removed.
    pub row: usize,
    pub label: String,
    /// Score of the added/removed composite as computed during selection.
    pub marginal: f64,
    /// Best score after the step.
    pub cumulative: f64,
}

/// The mutable state of one running search.
///
/// Invariants: at least one selected row at all times; the union is exactly
/// the OR of the selected rows; `best_score` is the active kernel's score
/// of the union; the trajectory grows monotonically by step index.
#[derive(Debug, Clone)]
pub struct MetaFeature {
    /// Selected row indices in the order they were added.
    selected: Vec<usize>,
    union: BitRow,
    best_score: f64,
    trajectory: Vec<SearchStep>,
}

impl MetaFeature {
    /// Start from a single seed row with its score.
    pub fn from_seed(matrix: &FeatureMatrix, seed_row: usize, score: f64) -> Self {
        Self {
            selected: vec![seed_row],
            union: matrix.row(seed_row).clone(),
            best_score: score,
            trajectory: vec![SearchStep {
                index: 0,
                action: StepAction::Added,
                row: seed_row,
                label: matrix.row_label(seed_row).to_string(),
                marginal: score,
                cumulative: score,
            }],
        }
    }

    /// Number of selected rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// A meta-feature is never empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Selected rows in addition order.
    #[inline]
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Current OR of the selected rows.
    #[inline]
    pub fn union(&self) -> &BitRow {
        &self.union
    }

    /// Score of the current union under the active kernel.
    #[inline]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// The step log so far.
    pub fn trajectory(&self) -> &[SearchStep] {
        &self.trajectory
    }

    /// Apply an accepted forward step.
    pub fn add(&mut self, matrix: &FeatureMatrix, row: usize, score: f64) {
        self.selected.push(row);
        self.union.or_assign(matrix.row(row));
        self.best_score = score;
        self.trajectory.push(SearchStep {
            index: self.trajectory.len(),
            action: StepAction::Added,
            row,
            label: matrix.row_label(row).to_string(),
            marginal: score,
            cumulative: score,
        });
    }

    /// Apply an accepted backward step, rebuilding the union from the
    /// remaining rows.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not currently selected or fewer than two rows
    /// would remain selectable.
    pub fn remove(&mut self, matrix: &FeatureMatrix, row: usize, score: f64) {
        let pos = self
            .selected
            .iter()
            .position(|&r| r == row)
            .expect("removed row must be selected");
        self.selected.remove(pos);
        assert!(!self.selected.is_empty(), "cannot remove the last row");
        self.union = matrix.or_union(&self.selected);
        self.best_score = score;
        self.trajectory.push(SearchStep {
            index: self.trajectory.len(),
            action: StepAction::Removed,
            row,
            label: matrix.row_label(row).to_string(),
            marginal: score,
            cumulative: score,
        });
    }

    /// Freeze into a [`SearchRecord`].
    pub fn into_record(
        self,
        matrix: &FeatureMatrix,
        scorer_name: &str,
        input_scores: Vec<f64>,
    ) -> SearchRecord {
        let seed_row = self.trajectory[0].row;
        let selected_labels = self
            .selected
            .iter()
            .map(|&i| matrix.row_label(i).to_string())
            .collect();
        let marginal_scores = self.trajectory.iter().map(|s| s.marginal).collect();
        let cumulative_scores = self.trajectory.iter().map(|s| s.cumulative).collect();
        SearchRecord {
            seed_row,
            seed_label: matrix.row_label(seed_row).to_string(),
            selected: self.selected,
            selected_labels,
            union: self.union,
            best_score: self.best_score,
            marginal_scores,
            cumulative_scores,
            trajectory: self.trajectory,
            input_scores,
            scorer: scorer_name.to_string(),
        }
    }
}

/// The frozen result of one seed's search.
///
/// Created at seed start, mutated only by the engine, returned frozen;
/// serializable as the persisted artifact of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Row the search was seeded from.
    pub seed_row: usize,
    pub seed_label: String,
    /// Final selected rows, in the order they were added.
    pub selected: Vec<usize>,
    pub selected_labels: Vec<String>,
    /// OR of the selected rows.
    pub union: BitRow,
    /// Final score of the union.
    pub best_score: f64,
    /// Per-step selection scores (seed first).
    pub marginal_scores: Vec<f64>,
    /// Best score after each step (seed first).
    pub cumulative_scores: Vec<f64>,
    /// Full step log.
    pub trajectory: Vec<SearchStep>,
    /// Echo of the input scores, aligned to matrix column order.
    pub input_scores: Vec<f64>,
    /// Kernel name the search ran under.
    pub scorer: String,
}
