//! Data preprocessing
//!
//! - [`Recipe`] - ordered predictor transforms prepared on training rows
//! - [`Standardizer`] - per-column centering and scaling used inside each fit

mod recipe;
mod scaler;

pub use recipe::{PreparedRecipe, Recipe, Step};
pub use scaler::{ScaleParams, Standardizer};
