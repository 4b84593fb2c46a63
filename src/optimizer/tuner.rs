//! Cross-validated sweep over a penalty grid

use super::config::OptimizeDirection;
use super::grid::{HyperparameterGrid, HyperparameterPoint};
use super::pool::WorkerPool;
use crate::data::Dataset;
use crate::error::{Result, SweepError};
use crate::training::{FitResult, Fold, FoldAggregate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Score of one (grid point, fold) fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub point: HyperparameterPoint,
    pub fold_id: usize,
    pub value: f64,
}

/// Which stage of a (grid point, fold) evaluation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fit,
    Score,
}

/// A (grid point, fold) evaluation that produced no usable score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub point: HyperparameterPoint,
    pub fold_id: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Aggregated cross-validation result for one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    pub point: HyperparameterPoint,
    pub cv: FoldAggregate,
    /// Folds that failed for this point and were left out of `cv`
    pub n_failed: usize,
}

/// A grid point left out of selection because none of its folds succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedPoint {
    pub point: HyperparameterPoint,
    pub reason: String,
}

type Outcome = std::result::Result<f64, (FailureStage, SweepError)>;

/// Everything a sweep produced: aggregates, raw fold scores and failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneResults {
    /// One entry per usable grid point, in grid order
    pub aggregates: Vec<PointResult>,
    /// Every successful fold score, in (grid point, fold) order
    pub records: Vec<ScoreRecord>,
    pub failures: Vec<FitFailure>,
    pub excluded: Vec<ExcludedPoint>,
    pub n_folds: usize,
}

impl TuneResults {
    /// Usable points ordered best first; equal means keep grid order
    pub fn ranked(&self, direction: OptimizeDirection) -> Vec<&PointResult> {
        let mut ranked: Vec<&PointResult> = self.aggregates.iter().collect();
        ranked.sort_by(|a, b| direction.compare(a.cv.mean, b.cv.mean));
        ranked
    }

    /// Best usable point by mean score
    pub fn best(&self, direction: OptimizeDirection) -> Option<&PointResult> {
        self.ranked(direction).into_iter().next()
    }

    /// Top `n` usable points
    pub fn top_n(&self, direction: OptimizeDirection, n: usize) -> Vec<&PointResult> {
        self.ranked(direction).into_iter().take(n).collect()
    }
}

/// Fits and scores every (fold, grid point) pair and aggregates per point
#[derive(Debug, Clone, Default)]
pub struct TunedFitter;

impl TunedFitter {
    pub fn new() -> Self {
        Self
    }

    /// Run the sweep over folds of an already numeric training set.
    ///
    /// `fit_fn` gets a fold's training rows and a grid point; `score_fn` gets the
    /// resulting fit and the fold's validation rows. Every pair is independent,
    /// and results are gathered in (grid point, fold) order, so aggregates do not
    /// depend on how many workers `pool` has. The pool is dropped on return.
    pub fn tune<F, S>(
        &self,
        train: &Dataset,
        folds: &[Fold],
        grid: &HyperparameterGrid,
        fit_fn: F,
        score_fn: S,
        pool: WorkerPool,
    ) -> Result<TuneResults>
    where
        F: Fn(&Dataset, &HyperparameterPoint) -> Result<FitResult> + Sync,
        S: Fn(&FitResult, &Dataset) -> Result<f64> + Sync,
    {
        if folds.is_empty() {
            return Err(SweepError::InvalidFoldCount {
                k: 0,
                n_rows: train.n_rows(),
            });
        }
        self.tune_with(
            folds,
            grid,
            |fold| Ok((fold.training(train), fold.validation(train))),
            fit_fn,
            score_fn,
            pool,
        )
    }

    /// Run the sweep, building each fold's (training, validation) datasets with `prepare_fn`.
    ///
    /// `prepare_fn` runs once per fold inside the pool, before any fit. Anything it
    /// estimates must come from the fold's training rows only. A preparation error
    /// aborts the sweep.
    pub fn tune_with<P, F, S>(
        &self,
        folds: &[Fold],
        grid: &HyperparameterGrid,
        prepare_fn: P,
        fit_fn: F,
        score_fn: S,
        pool: WorkerPool,
    ) -> Result<TuneResults>
    where
        P: Fn(&Fold) -> Result<(Dataset, Dataset)> + Sync,
        F: Fn(&Dataset, &HyperparameterPoint) -> Result<FitResult> + Sync,
        S: Fn(&FitResult, &Dataset) -> Result<f64> + Sync,
    {
        if folds.is_empty() {
            return Err(SweepError::InvalidFoldCount { k: 0, n_rows: 0 });
        }
        if grid.is_empty() {
            return Err(SweepError::InvalidGrid("grid has no points".to_string()));
        }

        let start = Instant::now();
        info!(
            n_points = grid.len(),
            n_folds = folds.len(),
            workers = pool.workers(),
            "Starting penalty sweep"
        );

        let fold_data: Vec<(Dataset, Dataset)> =
            pool.install(|| folds.par_iter().map(|fold| prepare_fn(fold)).collect::<Result<Vec<_>>>())?;

        let pairs: Vec<(usize, usize)> = (0..grid.len())
            .flat_map(|p| (0..folds.len()).map(move |f| (p, f)))
            .collect();

        let outcomes: Vec<Outcome> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(p, f)| -> Outcome {
                    let point = &grid.points()[p];
                    let (fold_train, fold_valid) = &fold_data[f];
                    let fit = fit_fn(fold_train, point).map_err(|e| (FailureStage::Fit, e))?;
                    let value = score_fn(&fit, fold_valid).map_err(|e| (FailureStage::Score, e))?;
                    if value.is_finite() {
                        Ok(value)
                    } else {
                        Err((
                            FailureStage::Score,
                            SweepError::DataError(format!("non-finite score {}", value)),
                        ))
                    }
                })
                .collect()
        });
        drop(pool);

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (&(p, f), outcome) in pairs.iter().zip(outcomes) {
            let point = grid.points()[p];
            let fold_id = folds[f].id;
            match outcome {
                Ok(value) => {
                    debug!(index = point.index, penalty = point.penalty, fold_id, value, "Scored fold");
                    records.push(ScoreRecord { point, fold_id, value });
                }
                Err((stage, err)) => {
                    warn!(
                        index = point.index,
                        penalty = point.penalty,
                        fold_id,
                        stage = ?stage,
                        recoverable = err.is_recoverable(),
                        error = %err,
                        "Fold evaluation failed, excluding it from the aggregate"
                    );
                    failures.push(FitFailure {
                        point,
                        fold_id,
                        stage,
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut aggregates = Vec::with_capacity(grid.len());
        let mut excluded = Vec::new();
        for point in grid.points() {
            let scores: Vec<(usize, f64)> = records
                .iter()
                .filter(|r| r.point.index == point.index)
                .map(|r| (r.fold_id, r.value))
                .collect();
            let n_failed = folds.len() - scores.len();

            match FoldAggregate::from_scores(scores) {
                Some(cv) => aggregates.push(PointResult {
                    point: *point,
                    cv,
                    n_failed,
                }),
                None => {
                    let err = SweepError::NoValidFolds {
                        index: point.index,
                        penalty: point.penalty,
                    };
                    warn!(error = %err, "Excluding grid point from selection");
                    excluded.push(ExcludedPoint {
                        point: *point,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if aggregates.is_empty() {
            return Err(SweepError::NoValidGridPoints(grid.len()));
        }

        info!(
            usable = aggregates.len(),
            excluded = excluded.len(),
            failed_fits = failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Penalty sweep finished"
        );

        Ok(TuneResults {
            aggregates,
            records,
            failures,
            excluded,
            n_folds: folds.len(),
        })
    }
}
