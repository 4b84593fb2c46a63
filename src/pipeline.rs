//! End-to-end sweep: split, prepare, cross-validate, select, refit, evaluate

use crate::config::SweepConfig;
use crate::data::{drop_missing_target, Dataset};
use crate::error::Result;
use crate::optimizer::{
    ExcludedPoint, FitFailure, HyperparameterPoint, ModelSelector, OptimizeDirection, PointResult,
    SelectedModel, SelectionRule, TuneResults, TunedFitter, WorkerPool,
};
use crate::preprocessing::Recipe;
use crate::split::DatasetSplitter;
use crate::training::{CrossValidator, FeatureImportance, FitResult, Fold, LassoRegression, Metric};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Everything a sweep produced, in a form an external plotting tool can read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub generated_at: DateTime<Utc>,
    pub target: String,
    pub metric: Metric,
    pub objective: OptimizeDirection,
    pub selection: SelectionRule,
    pub n_train: usize,
    pub n_test: usize,
    pub n_folds: usize,
    pub selected: SelectedModel,
    /// Held-out score of the final refit
    pub test_score: f64,
    pub importance: Vec<FeatureImportance>,
    /// Per-point cross-validation aggregates, in grid order
    pub aggregates: Vec<PointResult>,
    pub failures: Vec<FitFailure>,
    pub excluded: Vec<ExcludedPoint>,
    pub elapsed_secs: f64,
}

impl SweepReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Runs a whole sweep from a validated [`SweepConfig`]
#[derive(Debug, Clone)]
pub struct SweepPipeline {
    config: SweepConfig,
}

impl SweepPipeline {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sweep a numeric dataset; the recipe is not applied
    pub fn run(&self, dataset: &Dataset) -> Result<SweepReport> {
        let start = Instant::now();
        let (train, test) = self.splitter()?.split(dataset)?;

        let folds = self.cross_validator().make_folds(&train)?;
        let results = self.tune(&folds, |fold| Ok((fold.training(&train), fold.validation(&train))))?;
        self.finish(&train, &test, results, start)
    }

    /// Sweep a raw frame.
    ///
    /// Rows with a missing target are dropped and the frame is split. Each fold
    /// prepares its own recipe on its training rows; the final refit uses a
    /// recipe prepared on the whole training split, which also bakes the test rows.
    pub fn run_frame(&self, df: &DataFrame, target: &str) -> Result<SweepReport> {
        let start = Instant::now();
        let df = drop_missing_target(df, target)?;
        let (train_df, test_df) = self.splitter()?.split_frame(&df)?;

        let folds = self.cross_validator().make_frame_folds(&train_df)?;
        let results = self.tune(&folds, |fold| self.prepare_fold(&train_df, target, fold))?;

        let prepared = self.recipe(target).prep(&train_df)?;
        let train = Dataset::from_frame(&prepared.bake(&train_df)?, target)?;
        let test = Dataset::from_frame(&prepared.bake(&test_df)?, target)?;

        self.finish(&train, &test, results, start)
    }

    /// Prepare the recipe on a fold's training rows and bake both sides of the fold
    pub fn prepare_fold(&self, train_df: &DataFrame, target: &str, fold: &Fold) -> Result<(Dataset, Dataset)> {
        let analysis = fold.training_frame(train_df)?;
        let assessment = fold.validation_frame(train_df)?;
        let prepared = self.recipe(target).prep(&analysis)?;
        Ok((
            Dataset::from_frame(&prepared.bake(&analysis)?, target)?,
            Dataset::from_frame(&prepared.bake(&assessment)?, target)?,
        ))
    }

    fn recipe(&self, target: &str) -> Recipe {
        Recipe::new(target).with_steps(self.config.steps.iter().cloned())
    }

    fn splitter(&self) -> Result<DatasetSplitter> {
        let splitter = DatasetSplitter::new(self.config.train_fraction, self.config.seed)?;
        Ok(match &self.config.split_strata {
            Some(spec) => splitter.with_strata(spec.clone()),
            None => splitter,
        })
    }

    fn cross_validator(&self) -> CrossValidator {
        let cv = CrossValidator::new(self.config.fold_count)
            .with_random_state(self.config.seed)
            .with_repeats(self.config.fold_repeats);
        match &self.config.cv_strata {
            Some(spec) => cv.with_strata(spec.clone()),
            None => cv,
        }
    }

    fn fit(&self, rows: &Dataset, point: &HyperparameterPoint) -> Result<FitResult> {
        LassoRegression::new(point.penalty)
            .with_max_iter(self.config.max_iter)
            .with_tol(self.config.tolerance)
            .fit(rows)
    }

    fn tune<P>(&self, folds: &[Fold], prepare_fn: P) -> Result<TuneResults>
    where
        P: Fn(&Fold) -> Result<(Dataset, Dataset)> + Sync,
    {
        let metric = self.config.metric;
        TunedFitter::new().tune_with(
            folds,
            &self.config.grid()?,
            prepare_fn,
            |rows, point| self.fit(rows, point),
            |fit, rows| metric.score(fit, rows),
            WorkerPool::new(self.config.worker_count)?,
        )
    }

    fn finish(&self, train: &Dataset, test: &Dataset, results: TuneResults, start: Instant) -> Result<SweepReport> {
        let config = &self.config;
        let metric = config.metric;

        let selector = ModelSelector::new(config.objective()).with_rule(config.selection);
        let chosen = selector.select(&results, |point| self.fit(train, point))?;
        let selected = selector.finalize(train, &chosen, |rows, point| self.fit(rows, point))?;
        let test_score = selector.evaluate(&selected, test, |fit, rows| metric.score(fit, rows))?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            penalty = selected.penalty(),
            metric = %metric,
            test_score,
            elapsed_secs,
            "Sweep complete"
        );

        Ok(SweepReport {
            generated_at: Utc::now(),
            target: train.target_name().to_string(),
            metric,
            objective: config.objective(),
            selection: config.selection,
            n_train: train.n_rows(),
            n_test: test.n_rows(),
            n_folds: results.n_folds,
            importance: selected.importance(),
            selected,
            test_score,
            aggregates: results.aggregates,
            failures: results.failures,
            excluded: results.excluded,
            elapsed_secs,
        })
    }
}
