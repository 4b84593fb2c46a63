//! Penalty sweep
//!
//! - [`HyperparameterGrid`] - log-spaced candidate penalties
//! - [`TunedFitter`] - fits and scores every (fold, grid point) pair on a [`WorkerPool`]
//! - [`ModelSelector`] - picks the winner, refits it and scores it on held-out rows

mod config;
mod grid;
mod pool;
mod selector;
mod tuner;

pub use config::{OptimizeDirection, SelectionRule};
pub use grid::{HyperparameterGrid, HyperparameterPoint};
pub use pool::WorkerPool;
pub use selector::{ModelSelector, SelectedModel};
pub use tuner::{
    ExcludedPoint, FailureStage, FitFailure, PointResult, ScoreRecord, TuneResults, TunedFitter,
};
