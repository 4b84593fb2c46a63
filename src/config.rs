//! Sweep configuration

use crate::error::{Result, SweepError};
use crate::optimizer::{HyperparameterGrid, OptimizeDirection, SelectionRule};
use crate::preprocessing::Step;
use crate::split::StrataSpec;
use crate::training::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a full penalty sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Share of rows kept for training, in (0, 1)
    pub train_fraction: f64,

    /// Seed for the split and the fold assignment
    pub seed: u64,

    /// Number of cross-validation folds
    pub fold_count: usize,

    /// Times the k-fold assignment is repeated with fresh shuffles
    pub fold_repeats: usize,

    /// Smallest penalty in the grid
    pub grid_min: f64,

    /// Largest penalty in the grid
    pub grid_max: f64,

    /// Number of grid points
    pub grid_count: usize,

    /// Metric used for cross-validation and the held-out evaluation
    pub metric: Metric,

    /// Overrides the metric's natural direction when set
    pub objective: Option<OptimizeDirection>,

    /// How the winner is picked from the aggregates
    pub selection: SelectionRule,

    /// Worker threads for the sweep
    pub worker_count: usize,

    /// Stratify the train/test split on this field
    pub split_strata: Option<StrataSpec>,

    /// Stratify fold assignment on this field
    pub cv_strata: Option<StrataSpec>,

    /// Coordinate descent sweeps before a fit is declared non-converged
    pub max_iter: usize,

    /// Convergence threshold on the largest standardized weight change
    pub tolerance: f64,

    /// Preprocessing steps applied to frames before fitting
    pub steps: Vec<Step>,
}

/// Default stratification bins for the train/test split
pub const DEFAULT_SPLIT_BINS: usize = 4;
/// Default stratification bins for fold assignment
pub const DEFAULT_CV_BINS: usize = 2;

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: 42,
            fold_count: 5,
            fold_repeats: 1,
            grid_min: 1e-3,
            grid_max: 1.0,
            grid_count: 50,
            metric: Metric::Rmse,
            objective: None,
            selection: SelectionRule::Best,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            split_strata: None,
            cv_strata: None,
            max_iter: 10_000,
            tolerance: 1e-7,
            steps: vec![Step::ImputeMean, Step::DummyEncode, Step::RemoveZeroVariance],
        }
    }
}

impl SweepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_folds(mut self, fold_count: usize) -> Self {
        self.fold_count = fold_count;
        self
    }

    pub fn with_repeats(mut self, fold_repeats: usize) -> Self {
        self.fold_repeats = fold_repeats;
        self
    }

    /// Builder method to set the penalty grid bounds and size
    pub fn with_grid(mut self, min: f64, max: f64, count: usize) -> Self {
        self.grid_min = min;
        self.grid_max = max;
        self.grid_count = count;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_objective(mut self, objective: OptimizeDirection) -> Self {
        self.objective = Some(objective);
        self
    }

    pub fn with_selection(mut self, selection: SelectionRule) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Stratify the split on `field` with `bins` quantile bins
    pub fn with_split_strata(mut self, field: impl Into<String>, bins: usize) -> Self {
        self.split_strata = Some(StrataSpec::new(field, bins));
        self
    }

    /// Stratify fold assignment on `field` with `bins` quantile bins
    pub fn with_cv_strata(mut self, field: impl Into<String>, bins: usize) -> Self {
        self.cv_strata = Some(StrataSpec::new(field, bins));
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Direction used for selection: the override, else the metric's own
    pub fn objective(&self) -> OptimizeDirection {
        self.objective.unwrap_or_else(|| self.metric.direction())
    }

    /// The penalty grid described by `grid_min`, `grid_max` and `grid_count`
    pub fn grid(&self) -> Result<HyperparameterGrid> {
        HyperparameterGrid::log_space(self.grid_min, self.grid_max, self.grid_count)
    }

    /// Check every field; nothing else runs on an invalid config
    pub fn validate(&self) -> Result<()> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(SweepError::InvalidFraction(self.train_fraction));
        }
        if self.fold_count < 2 {
            return Err(SweepError::ConfigError(format!(
                "fold_count must be at least 2, got {}",
                self.fold_count
            )));
        }
        if self.fold_repeats == 0 {
            return Err(SweepError::ConfigError("fold_repeats must be at least 1".to_string()));
        }
        self.grid()?;
        if self.worker_count == 0 {
            return Err(SweepError::ConfigError("worker_count must be at least 1".to_string()));
        }
        if self.max_iter == 0 {
            return Err(SweepError::ConfigError("max_iter must be at least 1".to_string()));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(SweepError::ConfigError(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        for spec in self.split_strata.iter().chain(self.cv_strata.iter()) {
            spec.validate()?;
        }
        Ok(())
    }

    /// Load and validate a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
