//! In-memory dataset shape consumed by the sweep
//!
//! A [`Dataset`] is a numeric design matrix with named columns plus one
//! designated target. Frames coming from a loader are converted with
//! [`Dataset::from_frame`] once the preprocessing recipe has turned every
//! feature numeric.

mod loader;

pub use loader::{drop_missing_target, load_frame, ColumnSummary, FrameSummary};

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Rows of a frame, in the given order
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&r| r as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Numeric dataset: rows x named features, plus one target column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    feature_names: Vec<String>,
    target_name: String,
    features: Array2<f64>,
    target: Array1<f64>,
}

impl Dataset {
    /// Create a dataset, checking that shapes agree and every value is finite
    pub fn new(
        feature_names: Vec<String>,
        target_name: impl Into<String>,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> Result<Self> {
        if features.ncols() != feature_names.len() {
            return Err(SweepError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }
        if features.nrows() != target.len() {
            return Err(SweepError::ShapeError {
                expected: format!("target length = {}", features.nrows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        if let Some(row) = target.iter().position(|v| !v.is_finite()) {
            return Err(SweepError::DataError(format!(
                "target is missing or non-finite at row {}",
                row
            )));
        }
        if let Some(((row, col), _)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(SweepError::DataError(format!(
                "feature '{}' is missing or non-finite at row {}",
                feature_names[col], row
            )));
        }

        Ok(Self {
            feature_names,
            target_name: target_name.into(),
            features,
            target,
        })
    }

    /// Build a dataset from a frame whose non-target columns are all numeric
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        let target_column = df
            .column(target)
            .map_err(|_| SweepError::FeatureNotFound(target.to_string()))?;
        let y = Self::numeric_values(target_column, target)?;

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();

        let col_data: Vec<Vec<f64>> = feature_names
            .iter()
            .map(|name| {
                let column = df
                    .column(name)
                    .map_err(|_| SweepError::FeatureNotFound(name.clone()))?;
                Self::numeric_values(column, name)
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        let x = Array2::from_shape_fn((df.height(), feature_names.len()), |(r, c)| col_refs[c][r]);

        Self::new(feature_names, target, x, Array1::from_vec(y))
    }

    fn numeric_values(column: &Column, name: &str) -> Result<Vec<f64>> {
        if matches!(column.dtype(), DataType::String) {
            return Err(SweepError::DataError(format!(
                "column '{}' is not numeric; add a dummy-encoding step",
                name
            )));
        }
        let casted = column.cast(&DataType::Float64)?;
        casted
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    SweepError::DataError(format!("column '{}' has a missing value at row {}", name, row))
                })
            })
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    /// Values of a named field, which may be the target or any feature
    pub fn field(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        if name == self.target_name {
            return Ok(self.target.view());
        }
        self.feature_names
            .iter()
            .position(|f| f == name)
            .map(|j| self.features.column(j))
            .ok_or_else(|| SweepError::FeatureNotFound(name.to_string()))
    }

    /// New dataset holding the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
            features: self.features.select(Axis(0), indices),
            target: self.target.select(Axis(0), indices),
        }
    }

    /// Mean of the target, the prediction of an intercept-only model
    pub fn target_mean(&self) -> f64 {
        self.target.mean().unwrap_or(0.0)
    }
}
