//! Evaluation metrics

use crate::data::Dataset;
use crate::error::{Result, SweepError};
use crate::optimizer::OptimizeDirection;
use crate::training::FitResult;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric used to score a fitted model on held-out rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Root mean squared error
    Rmse,
    /// Mean absolute error
    Mae,
    /// Coefficient of determination
    Rsq,
    /// Share of rows whose prediction falls on the right side of 0.5 (binary 0/1 target)
    Accuracy,
    /// Area under the ROC curve, predictions used as scores (binary 0/1 target)
    RocAuc,
}

impl Metric {
    /// Whether larger or smaller values are better
    pub fn direction(&self) -> OptimizeDirection {
        match self {
            Metric::Rmse | Metric::Mae => OptimizeDirection::Minimize,
            Metric::Rsq | Metric::Accuracy | Metric::RocAuc => OptimizeDirection::Maximize,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::Rsq => "rsq",
            Metric::Accuracy => "accuracy",
            Metric::RocAuc => "roc_auc",
        }
    }

    /// Compare truth against predictions
    pub fn compute(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(SweepError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(SweepError::DataError(format!(
                "cannot compute {} on zero rows",
                self.name()
            )));
        }

        let n = y_true.len() as f64;
        let value = match self {
            Metric::Rmse => {
                let mse = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).powi(2))
                    .sum::<f64>()
                    / n;
                mse.sqrt()
            }
            Metric::Mae => {
                y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).abs())
                    .sum::<f64>()
                    / n
            }
            Metric::Rsq => {
                let y_mean = y_true.iter().sum::<f64>() / n;
                let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
                let ss_res: f64 = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .map(|(t, p)| (t - p).powi(2))
                    .sum();
                if ss_tot > 0.0 {
                    1.0 - ss_res / ss_tot
                } else {
                    0.0
                }
            }
            Metric::Accuracy => {
                let correct = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .filter(|(t, p)| (**t > 0.5) == (**p > 0.5))
                    .count();
                correct as f64 / n
            }
            Metric::RocAuc => roc_auc(y_true, y_pred)?,
        };
        Ok(value)
    }

    /// Predict with a fitted model and score the predictions
    pub fn score(&self, fit: &FitResult, dataset: &Dataset) -> Result<f64> {
        let predictions = fit.predict_dataset(dataset)?;
        self.compute(dataset.target(), &predictions)
    }
}

/// Rank-based (Mann-Whitney) AUC with tied scores sharing their average rank
fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let n_pos = y_true.iter().filter(|t| **t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(SweepError::DataError(
            "roc_auc needs both classes among the scored rows".to_string(),
        ));
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "rsq" | "r2" => Ok(Metric::Rsq),
            "accuracy" => Ok(Metric::Accuracy),
            "roc_auc" | "auc" => Ok(Metric::RocAuc),
            other => Err(SweepError::ConfigError(format!("unknown metric '{}'", other))),
        }
    }
}
