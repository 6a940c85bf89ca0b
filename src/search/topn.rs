//! The top-N seeding driver.
//!
//! Ranks every feature with no meta-feature in play, seeds one search per
//! top-ranked feature (or per explicitly requested feature), and runs the
//! seeds independently.

use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreContext, Scorer, ScorerFn};
use crate::utils::{CancelToken, Parallelism};

use super::engine::SearchEngine;
use super::logger::SearchLogger;
use super::meta::SearchRecord;
use super::{SearchError, SearchMethod};

/// Results of a top-N run: one record per seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopNResult {
    /// Per-seed search records, in seed order.
    pub records: Vec<SearchRecord>,
    /// Index of the best record, when `best_score_only` was requested.
    pub best_index: Option<usize>,
}

impl TopNResult {
    /// The record `best_index` points at.
    pub fn best_record(&self) -> Option<&SearchRecord> {
        self.best_index.map(|i| &self.records[i])
    }

    /// Largest final score across seeds.
    pub fn max_score(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.best_score)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Driver running one search per seed.
pub struct TopNDriver<'a> {
    ctx: &'a ScoreContext<'a>,
    scorer: &'a Scorer,
    method: SearchMethod,
    max_size: usize,
    best_score_only: bool,
    parallelism: Parallelism,
    logger: SearchLogger,
}

impl<'a> TopNDriver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: &'a ScoreContext<'a>,
        scorer: &'a Scorer,
        method: SearchMethod,
        max_size: usize,
        best_score_only: bool,
        parallelism: Parallelism,
        logger: SearchLogger,
    ) -> Self {
        Self {
            ctx,
            scorer,
            method,
            max_size,
            best_score_only,
            parallelism,
            logger,
        }
    }

    /// Rank all rows without a meta-feature and return the top `n` seeds.
    pub fn rank_seeds(&self, n: usize) -> Result<Vec<usize>, SearchError> {
        let ranked = self.scorer.score_all(self.ctx, &[], None)?;
        Ok(ranked.iter().take(n).map(|r| r.row).collect())
    }

    /// Run every seed to termination.
    ///
    /// Seeds are independent; they share the context immutably and each
    /// owns its meta-feature state.
    pub fn run(
        &self,
        seeds: &[usize],
        cancel: Option<&CancelToken>,
    ) -> Result<TopNResult, SearchError> {
        let results: Vec<Result<SearchRecord, SearchError>> =
            self.parallelism.maybe_par_map(seeds.to_vec(), |seed| {
                let engine = SearchEngine::new(
                    self.ctx,
                    self.scorer,
                    self.method,
                    self.max_size,
                    self.logger,
                );
                engine.run(seed, cancel)
            });

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            records.push(result?);
        }

        let best_index = if self.best_score_only {
            best_index(&records)
        } else {
            None
        };
        Ok(TopNResult {
            records,
            best_index,
        })
    }
}

/// Argmax by final score; ties resolved toward the smaller seed label.
fn best_index(records: &[SearchRecord]) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.best_score
                .total_cmp(&b.best_score)
                .then_with(|| b.seed_label.cmp(&a.seed_label))
        })
        .map(|(i, _)| i)
}
