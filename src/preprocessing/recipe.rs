//! Preprocessing recipe: an ordered list of column transforms that is prepared
//! on training rows and then baked onto any frame with the same schema.
//!
//! Every step reads predictors only; the outcome column passes through untouched.

use super::scaler::ScaleParams;
use crate::error::{Result, SweepError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// One transform in a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Fill missing numeric predictor values with the training mean
    ImputeMean,
    /// Fill missing numeric predictor values with the training median
    ImputeMedian,
    /// Replace each string predictor with 0/1 indicator columns, one per
    /// non-reference level; the reference is the first level in sorted order
    DummyEncode,
    /// Drop numeric predictors that take a single value on the training rows
    RemoveZeroVariance,
    /// Center and scale numeric predictors to zero mean and unit variance
    Normalize,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::ImputeMean => "impute_mean",
            Step::ImputeMedian => "impute_median",
            Step::DummyEncode => "dummy_encode",
            Step::RemoveZeroVariance => "remove_zero_variance",
            Step::Normalize => "normalize",
        }
    }
}

/// Unprepared recipe: the outcome column plus an ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    target: String,
    steps: Vec<Step>,
}

impl Recipe {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step, returning a new recipe
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Learn every step's statistics from `train`.
    ///
    /// Steps are fitted in order, each on the output of the previous one.
    pub fn prep(&self, train: &DataFrame) -> Result<PreparedRecipe> {
        let start = Instant::now();
        if train.column(&self.target).is_err() {
            return Err(SweepError::FeatureNotFound(self.target.clone()));
        }

        let mut current = train.clone();
        let mut prepared = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let fitted = self.fit_step(step, &current)?;
            current = fitted.apply(&current)?;
            debug!(step = step.name(), width = current.width(), "Prepared recipe step");
            prepared.push(fitted);
        }

        info!(
            steps = prepared.len(),
            rows = train.height(),
            output_columns = current.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recipe prepared"
        );

        Ok(PreparedRecipe {
            target: self.target.clone(),
            steps: prepared,
        })
    }

    fn fit_step(&self, step: &Step, df: &DataFrame) -> Result<PreparedStep> {
        let numeric = predictors(df, &self.target, is_numeric);
        let prepared = match step {
            Step::ImputeMean | Step::ImputeMedian => {
                let mut fills = Vec::with_capacity(numeric.len());
                for name in numeric {
                    let values = observed_values(df, &name)?;
                    if values.is_empty() {
                        return Err(SweepError::PreprocessingError(format!(
                            "column '{}' has no observed values to impute from",
                            name
                        )));
                    }
                    let fill = if *step == Step::ImputeMean {
                        values.iter().sum::<f64>() / values.len() as f64
                    } else {
                        median(values)
                    };
                    fills.push((name, fill));
                }
                PreparedStep::Impute { fills }
            }
            Step::DummyEncode => {
                let mut columns = Vec::new();
                for name in predictors(df, &self.target, |dt| matches!(dt, DataType::String)) {
                    let levels = string_levels(df, &name)?;
                    columns.push(DummyColumn { name, levels });
                }
                PreparedStep::Dummy { columns }
            }
            Step::RemoveZeroVariance => {
                let mut columns = Vec::new();
                for name in numeric {
                    let values = observed_values(df, &name)?;
                    let constant = values.windows(2).all(|w| w[0] == w[1]);
                    if constant {
                        columns.push(name);
                    }
                }
                PreparedStep::Drop { columns }
            }
            Step::Normalize => {
                let mut params = Vec::with_capacity(numeric.len());
                for name in numeric {
                    let values = observed_values(df, &name)?;
                    params.push((name, ScaleParams::from_values(&values)));
                }
                PreparedStep::Normalize { params }
            }
        };
        Ok(prepared)
    }
}

/// Indicator columns for one string predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DummyColumn {
    name: String,
    /// Sorted training levels; the first is the reference and gets no column
    levels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum PreparedStep {
    Impute { fills: Vec<(String, f64)> },
    Dummy { columns: Vec<DummyColumn> },
    Drop { columns: Vec<String> },
    Normalize { params: Vec<(String, ScaleParams)> },
}

impl PreparedStep {
    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        match self {
            PreparedStep::Impute { fills } => {
                for (name, fill) in fills {
                    let values: Vec<f64> = optional_values(df, name)?
                        .into_iter()
                        .map(|v| v.unwrap_or(*fill))
                        .collect();
                    out.with_column(Series::new(name.as_str().into(), values))?;
                }
            }
            PreparedStep::Dummy { columns } => {
                for dummy in columns {
                    let column = df
                        .column(&dummy.name)
                        .map_err(|_| SweepError::FeatureNotFound(dummy.name.clone()))?;
                    let strings = column.as_materialized_series().str()?;
                    out = out.drop(&dummy.name)?;
                    // Unseen and missing levels leave every indicator at zero
                    for level in dummy.levels.iter().skip(1) {
                        let indicator: Vec<f64> = strings
                            .into_iter()
                            .map(|v| if v == Some(level.as_str()) { 1.0 } else { 0.0 })
                            .collect();
                        let name = format!("{}_{}", dummy.name, level);
                        out.with_column(Series::new(name.as_str().into(), indicator))?;
                    }
                }
            }
            PreparedStep::Drop { columns } => {
                for name in columns {
                    if out.column(name).is_err() {
                        return Err(SweepError::FeatureNotFound(name.clone()));
                    }
                    out = out.drop(name)?;
                }
            }
            PreparedStep::Normalize { params } => {
                for (name, p) in params {
                    let values: Vec<Option<f64>> = optional_values(df, name)?
                        .into_iter()
                        .map(|v| v.map(|x| p.apply(x)))
                        .collect();
                    out.with_column(Series::new(name.as_str().into(), values))?;
                }
            }
        }
        Ok(out)
    }
}

/// Recipe with every step's statistics fixed from the training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedRecipe {
    target: String,
    steps: Vec<PreparedStep>,
}

impl PreparedRecipe {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Apply the prepared steps to a frame. Nothing is re-estimated.
    pub fn bake(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
        }
        Ok(current)
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Predictor column names (everything but the target) whose dtype passes `keep`
fn predictors(df: &DataFrame, target: &str, keep: impl Fn(&DataType) -> bool) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.name().as_str() != target && keep(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

fn optional_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| SweepError::FeatureNotFound(name.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Non-null, finite values of a numeric column
fn observed_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(optional_values(df, name)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn string_levels(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| SweepError::FeatureNotFound(name.to_string()))?;
    let mut levels: Vec<String> = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    levels.sort();
    levels.dedup();
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "x" => [Some(1.0), None, Some(3.0), Some(8.0)],
            "flat" => [2.0, 2.0, 2.0, 2.0],
            "color" => ["red", "blue", "green", "blue"],
            "y" => [1.0, 2.0, 3.0, 4.0],
        }
        .unwrap()
    }

    fn column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_impute_mean_and_median() {
        let df = frame();
        let mean = Recipe::new("y").with_step(Step::ImputeMean).prep(&df).unwrap();
        assert_eq!(column(&mean.bake(&df).unwrap(), "x")[1], Some(4.0));

        let median = Recipe::new("y").with_step(Step::ImputeMedian).prep(&df).unwrap();
        assert_eq!(column(&median.bake(&df).unwrap(), "x")[1], Some(3.0));
    }

    #[test]
    fn test_dummy_encode_drops_reference_level() {
        let df = frame();
        let prepared = Recipe::new("y").with_step(Step::DummyEncode).prep(&df).unwrap();
        let baked = prepared.bake(&df).unwrap();

        assert!(baked.column("color").is_err());
        assert!(baked.column("color_blue").is_err());
        assert_eq!(
            column(&baked, "color_green"),
            vec![Some(0.0), Some(0.0), Some(1.0), Some(0.0)]
        );
        assert_eq!(
            column(&baked, "color_red"),
            vec![Some(1.0), Some(0.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn test_unseen_level_is_all_zero() {
        let prepared = Recipe::new("y").with_step(Step::DummyEncode).prep(&frame()).unwrap();
        let new = df! {
            "x" => [1.0],
            "flat" => [2.0],
            "color" => ["purple"],
            "y" => [0.0],
        }
        .unwrap();
        let baked = prepared.bake(&new).unwrap();
        assert_eq!(column(&baked, "color_green"), vec![Some(0.0)]);
        assert_eq!(column(&baked, "color_red"), vec![Some(0.0)]);
    }

    #[test]
    fn test_zero_variance_and_normalize() {
        let df = frame();
        let prepared = Recipe::new("y")
            .with_steps([Step::ImputeMean, Step::RemoveZeroVariance, Step::Normalize])
            .prep(&df)
            .unwrap();
        let baked = prepared.bake(&df).unwrap();

        assert!(baked.column("flat").is_err());
        let x: Vec<f64> = column(&baked, "x").into_iter().flatten().collect();
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        assert!(mean.abs() < 1e-12);
        // target untouched
        assert_eq!(column(&baked, "y"), column(&df, "y"));
    }

    #[test]
    fn test_bake_uses_training_statistics() {
        let train = frame();
        let prepared = Recipe::new("y")
            .with_steps([Step::ImputeMean, Step::Normalize])
            .prep(&train)
            .unwrap();
        let test = df! {
            "x" => [None, Some(1000.0)],
            "flat" => [2.0, 2.0],
            "color" => ["red", "red"],
            "y" => [0.0, 0.0],
        }
        .unwrap();
        let baked = prepared.bake(&test).unwrap();
        let x = column(&baked, "x");
        // the missing value takes the training mean, which normalizes to zero
        assert!(x[0].unwrap().abs() < 1e-12);
        assert!(x[1].unwrap() > 100.0);
    }

    #[test]
    fn test_missing_target_or_column() {
        assert!(matches!(
            Recipe::new("nope").with_step(Step::ImputeMean).prep(&frame()),
            Err(SweepError::FeatureNotFound(_))
        ));

        let prepared = Recipe::new("y").with_step(Step::ImputeMean).prep(&frame()).unwrap();
        let partial = df! { "y" => [1.0] }.unwrap();
        assert!(matches!(prepared.bake(&partial), Err(SweepError::FeatureNotFound(_))));
    }
}
