//! The forward/backward greedy stepper.
//!
//! Drives one seed to termination: repeatedly OR the best-scoring candidate
//! into the meta-feature, fall back to removals when enabled, stop when
//! neither strictly improves the score.

use crate::data::BitRow;
use crate::scoring::{RowScore, ScoreContext, Scorer, ScorerFn};
use crate::utils::CancelToken;

use super::logger::SearchLogger;
use super::meta::{MetaFeature, SearchRecord};
use super::{SearchError, SearchMethod};

/// Single-seed search engine.
///
/// Deterministic for a fixed (matrix, scores, kernel, options, seed); all
/// tie-breaks are total.
pub struct SearchEngine<'a> {
    ctx: &'a ScoreContext<'a>,
    scorer: &'a Scorer,
    method: SearchMethod,
    max_size: usize,
    logger: SearchLogger,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        ctx: &'a ScoreContext<'a>,
        scorer: &'a Scorer,
        method: SearchMethod,
        max_size: usize,
        logger: SearchLogger,
    ) -> Self {
        Self {
            ctx,
            scorer,
            method,
            max_size,
            logger,
        }
    }

    /// Run the search from a seed row to termination.
    ///
    /// # Errors
    ///
    /// Fails on custom-kernel contract violations and on cancellation;
    /// degenerate runs (no scorable candidates) terminate cleanly instead.
    pub fn run(
        &self,
        seed_row: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<SearchRecord, SearchError> {
        let matrix = self.ctx.matrix();
        let seed_score = self.scorer.score_row(self.ctx, matrix.row(seed_row));
        self.logger.log_seed(matrix.row_label(seed_row), seed_score);

        let mut meta = MetaFeature::from_seed(matrix, seed_row, seed_score);

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(SearchError::Cancelled);
                }
            }

            if meta.len() < self.max_size {
                if let Some(step) = self.forward_step(&meta)? {
                    self.logger
                        .log_step("add", &step.label, step.score, meta.len() + 1);
                    meta.add(matrix, step.row, step.score);
                    continue;
                }
            }

            if self.method == SearchMethod::Both {
                if let Some((row, score)) = self.backward_step(&meta) {
                    self.logger
                        .log_step("remove", matrix.row_label(row), score, meta.len() - 1);
                    meta.remove(matrix, row, score);
                    continue;
                }
            }

            break;
        }

        self.logger.log_finish(meta.len(), meta.best_score());
        Ok(meta.into_record(matrix, self.scorer.name(), self.ctx.values().to_vec()))
    }

    /// Best strictly-improving addition, if any.
    fn forward_step(&self, meta: &MetaFeature) -> Result<Option<RowScore>, SearchError> {
        let candidates = self
            .scorer
            .score_all(self.ctx, meta.selected(), Some(meta.union()))?;
        let Some(best) = self.pick_addition(&candidates, meta.union()) else {
            return Ok(None);
        };
        if best.score <= meta.best_score() {
            self.logger
                .log_rejected("forward", best.score, meta.best_score());
            return Ok(None);
        }
        Ok(Some(best))
    }

    /// Among the top-scoring candidates, prefer the smaller resulting
    /// union, then the lexicographically smaller label.
    fn pick_addition(&self, candidates: &[RowScore], union: &BitRow) -> Option<RowScore> {
        let matrix = self.ctx.matrix();
        let top = candidates.first()?;
        let mut winner = top;
        let mut winner_pop = union.or(matrix.row(top.row)).count_ones();
        for candidate in &candidates[1..] {
            if candidate.score != top.score {
                break;
            }
            let pop = union.or(matrix.row(candidate.row)).count_ones();
            if pop < winner_pop || (pop == winner_pop && candidate.label < winner.label) {
                winner = candidate;
                winner_pop = pop;
            }
        }
        Some(winner.clone())
    }

    /// Best strictly-improving removal, if any.
    ///
    /// Only meaningful with at least three selected rows; each removal
    /// candidate is scored as the union of the remaining rows.
    fn backward_step(&self, meta: &MetaFeature) -> Option<(usize, f64)> {
        if meta.len() < 3 {
            return None;
        }
        let matrix = self.ctx.matrix();

        let mut best: Option<(usize, f64, usize)> = None;
        for &row in meta.selected() {
            let remaining: Vec<usize> = meta
                .selected()
                .iter()
                .copied()
                .filter(|&r| r != row)
                .collect();
            let union = matrix.or_union(&remaining);
            let score = self.scorer.score_row(self.ctx, &union);
            let pop = union.count_ones();

            let better = match best {
                None => true,
                Some((best_row, best_score, best_pop)) => {
                    score > best_score
                        || (score == best_score && pop < best_pop)
                        || (score == best_score
                            && pop == best_pop
                            && matrix.row_label(row) < matrix.row_label(best_row))
                }
            };
            if better {
                best = Some((row, score, pop));
            }
        }

        let (row, score, _) = best?;
        if score > meta.best_score() {
            Some((row, score))
        } else {
            self.logger
                .log_rejected("backward", score, meta.best_score());
            None
        }
    }
}
