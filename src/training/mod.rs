//! Model fitting and evaluation
//!
//! Provides the pieces a penalty sweep is built from:
//! - K-fold cross-validation (plain, stratified, repeated)
//! - Lasso regression via coordinate descent
//! - Regression and binary classification metrics

pub mod cross_validation;
pub mod linear_models;
pub mod metrics;

pub use cross_validation::{CrossValidator, Fold, FoldAggregate};
pub use linear_models::{FeatureImportance, FitResult, LassoRegression};
pub use metrics::Metric;
