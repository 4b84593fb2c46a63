//! Lasso Sweep - cross-validated penalty selection for lasso regression
//!
//! Splits a table into train and test rows, prepares predictors with a
//! recipe fitted on the training rows, sweeps a log-spaced penalty grid
//! with k-fold cross-validation on a bounded worker pool, then refits the
//! winning penalty and scores it once on the held-out rows.
//!
//! # Modules
//!
//! - [`data`] - numeric datasets and file loading
//! - [`split`] - seeded, optionally stratified train/test splits
//! - [`preprocessing`] - recipes and standardization
//! - [`training`] - cross-validation folds, lasso fits, metrics
//! - [`optimizer`] - penalty grid, tuning, selection
//! - [`pipeline`] - end-to-end sweep and its report
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod data;
pub mod split;
pub mod preprocessing;

// Fitting and tuning
pub mod training;
pub mod optimizer;
pub mod pipeline;

// Services
pub mod cli;

pub use error::{Result, SweepError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SweepError};

    // Configuration
    pub use crate::config::SweepConfig;

    // Data
    pub use crate::data::{load_frame, Dataset};
    pub use crate::split::{DatasetSplitter, Split, StrataSpec};

    // Preprocessing
    pub use crate::preprocessing::{PreparedRecipe, Recipe, Standardizer, Step};

    // Training
    pub use crate::training::{CrossValidator, FitResult, Fold, FoldAggregate, LassoRegression, Metric};

    // Optimization
    pub use crate::optimizer::{
        HyperparameterGrid, HyperparameterPoint, ModelSelector, OptimizeDirection, SelectedModel,
        SelectionRule, TuneResults, TunedFitter, WorkerPool,
    };

    // Pipeline
    pub use crate::pipeline::{SweepPipeline, SweepReport};
}
