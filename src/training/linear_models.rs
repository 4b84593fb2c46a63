//! Lasso regression via cyclic coordinate descent

use crate::data::Dataset;
use crate::error::{Result, SweepError};
use crate::preprocessing::Standardizer;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Lasso Regression (L1-regularized, predictors standardized on the fitted rows)
///
/// Minimizes `(1/n) * sum((y - y_hat)^2) + penalty * sum(|w_j|)` where the
/// weights act on standardized predictors. The returned [`FitResult`] reports
/// coefficients in the original feature units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    /// L1 regularization strength
    pub penalty: f64,
    /// Maximum number of full coordinate sweeps
    pub max_iter: usize,
    /// Largest standardized-weight change that counts as converged
    pub tol: f64,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(penalty: f64) -> Self {
        Self {
            penalty,
            max_iter: 10_000,
            tol: 1e-7,
        }
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    /// Fit on every row of `train`. Standardization statistics come from these rows only.
    pub fn fit(&self, train: &Dataset) -> Result<FitResult> {
        if !(self.penalty >= 0.0 && self.penalty.is_finite()) {
            return Err(SweepError::InvalidGrid(format!(
                "penalty must be finite and non-negative, got {}",
                self.penalty
            )));
        }
        let n_samples = train.n_rows();
        if n_samples == 0 {
            return Err(SweepError::DataError("cannot fit on an empty dataset".to_string()));
        }
        let n_features = train.n_features();

        let (scaler, z) = Standardizer::fit_transform(train.features())?;
        let y_mean = train.target_mean();
        let y_c = train.target() - y_mean;

        // Mean squared column norms; zero for constant predictors, which keep a zero weight
        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| {
                if scaler.params()[j].constant {
                    0.0
                } else {
                    z.column(j).mapv(|v| v * v).sum() / n_samples as f64
                }
            })
            .collect();

        let threshold = self.penalty / 2.0;
        let mut w: Array1<f64> = Array1::zeros(n_features);
        let mut r = y_c;
        let mut n_iter = 0;
        let mut converged = n_features == 0;

        while !converged && n_iter < self.max_iter {
            n_iter += 1;
            let mut max_delta: f64 = 0.0;

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    continue;
                }
                let col = z.column(j);
                let rho = col.dot(&r) / n_samples as f64 + col_norms[j] * w[j];
                let new_wj = Self::soft_threshold(rho, threshold) / col_norms[j];
                let delta = new_wj - w[j];
                if delta != 0.0 {
                    r.scaled_add(-delta, &col);
                    w[j] = new_wj;
                    max_delta = max_delta.max(delta.abs());
                }
            }

            if !max_delta.is_finite() {
                break;
            }
            converged = max_delta < self.tol;
        }

        if !converged || w.iter().any(|v| !v.is_finite()) {
            return Err(SweepError::FitConvergence {
                penalty: self.penalty,
                iterations: n_iter,
            });
        }
        trace!(penalty = self.penalty, n_iter, "Lasso converged");

        let coefficients: Array1<f64> = w
            .iter()
            .zip(scaler.params())
            .map(|(wj, p)| if p.constant { 0.0 } else { wj / p.scale })
            .collect();
        let centers: Array1<f64> = scaler.params().iter().map(|p| p.center).collect();
        let intercept = y_mean - coefficients.dot(&centers);

        Ok(FitResult {
            feature_names: train.feature_names().to_vec(),
            coefficients,
            standardized: w,
            intercept,
            penalty: self.penalty,
            n_iter,
        })
    }
}

/// Learned lasso model for one (fold, penalty) pair or the final refit. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    feature_names: Vec<String>,
    /// Weights in original feature units
    coefficients: Array1<f64>,
    /// Weights on standardized predictors
    standardized: Array1<f64>,
    intercept: f64,
    penalty: f64,
    n_iter: usize,
}

/// A feature ranked by the magnitude of its standardized weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    /// +1 or -1, the sign of the weight
    pub sign: f64,
}

impl FitResult {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn standardized_coefficients(&self) -> &Array1<f64> {
        &self.standardized
    }

    /// Weight of a named feature, in original units
    pub fn coefficient(&self, feature: &str) -> Option<f64> {
        self.feature_names
            .iter()
            .position(|f| f == feature)
            .map(|j| self.coefficients[j])
    }

    pub fn non_zero_count(&self) -> usize {
        self.standardized.iter().filter(|w| **w != 0.0).count()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(SweepError::ShapeError {
                expected: format!("{} feature columns", self.coefficients.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Predict on a dataset whose feature columns match the fitted ones
    pub fn predict_dataset(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        if dataset.feature_names() != self.feature_names.as_slice() {
            return Err(SweepError::ShapeError {
                expected: format!("features {:?}", self.feature_names),
                actual: format!("features {:?}", dataset.feature_names()),
            });
        }
        self.predict(dataset.features())
    }

    /// Features ordered by absolute standardized weight, largest first
    pub fn importance(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(self.standardized.iter())
            .map(|(name, w)| FeatureImportance {
                feature: name.clone(),
                importance: w.abs(),
                sign: if *w < 0.0 { -1.0 } else { 1.0 },
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }
}
