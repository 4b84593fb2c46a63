//! Feature standardization

use crate::error::{Result, SweepError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Location and spread learned for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    /// Mean of the fitted values
    pub center: f64,
    /// Sample standard deviation, or 1 for a constant column
    pub scale: f64,
    /// Whether the fitted values had (numerically) zero spread
    pub constant: bool,
}

impl ScaleParams {
    /// Learn mean and sample standard deviation; non-finite values are ignored
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let finite: Vec<f64> = values.into_iter().copied().filter(|v| v.is_finite()).collect();
        let n = finite.len();
        if n == 0 {
            return Self { center: 0.0, scale: 1.0, constant: true };
        }

        let mean = finite.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        let constant = std <= 1e-12 * mean.abs().max(1.0);
        Self {
            center: mean,
            scale: if constant { 1.0 } else { std },
            constant,
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

/// Column-wise z-score standardizer over a numeric matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    params: Vec<ScaleParams>,
}

impl Standardizer {
    /// Learn per-column statistics from the given rows only
    pub fn fit(x: &Array2<f64>) -> Self {
        let params = x
            .axis_iter(Axis(1))
            .map(|col| ScaleParams::from_values(col.iter()))
            .collect();
        Self { params }
    }

    pub fn params(&self) -> &[ScaleParams] {
        &self.params
    }

    /// Apply the learned statistics to any rows with the same columns
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.params.len() {
            return Err(SweepError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut col, params) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| params.apply(v));
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x);
        let out = scaler.transform(x)?;
        Ok((scaler, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [5.0, 5.0]];
        let (scaler, z) = Standardizer::fit_transform(&x).unwrap();

        let mean = z.column(0).mean().unwrap();
        assert!(mean.abs() < 1e-10);
        assert!((z.column(0).std(1.0) - 1.0).abs() < 1e-10);

        assert!(scaler.params()[1].constant);
        assert!(z.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_uses_fitted_statistics() {
        let train = array![[0.0], [2.0]];
        let scaler = Standardizer::fit(&train);
        let other = scaler.transform(&array![[1000.0]]).unwrap();
        let expected = (1000.0 - 1.0) / 2f64.sqrt();
        assert!((other[[0, 0]] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_column_mismatch() {
        let scaler = Standardizer::fit(&array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
