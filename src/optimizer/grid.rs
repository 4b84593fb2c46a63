//! Penalty grid

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};

/// One candidate penalty, with its position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterPoint {
    pub index: usize,
    pub penalty: f64,
}

/// Ordered, immutable sequence of candidate penalties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    points: Vec<HyperparameterPoint>,
}

impl HyperparameterGrid {
    /// `count` values spaced evenly in log scale, both endpoints included exactly
    pub fn log_space(min_value: f64, max_value: f64, count: usize) -> Result<Self> {
        if count < 2 {
            return Err(SweepError::InvalidGrid(format!(
                "count must be at least 2, got {}",
                count
            )));
        }
        if !(min_value.is_finite() && max_value.is_finite()) || min_value <= 0.0 {
            return Err(SweepError::InvalidGrid(format!(
                "bounds must be finite and positive, got [{}, {}]",
                min_value, max_value
            )));
        }
        if max_value <= min_value {
            return Err(SweepError::InvalidGrid(format!(
                "max ({}) must exceed min ({})",
                max_value, min_value
            )));
        }

        let (lo, hi) = (min_value.ln(), max_value.ln());
        let step = (hi - lo) / (count - 1) as f64;
        let points = (0..count)
            .map(|index| {
                let penalty = match index {
                    0 => min_value,
                    i if i == count - 1 => max_value,
                    i => (lo + step * i as f64).exp(),
                };
                HyperparameterPoint { index, penalty }
            })
            .collect();

        Ok(Self { points })
    }

    /// Grid over `10^lo ..= 10^hi`, the usual way penalty ranges are written
    pub fn from_log10_range(lo: f64, hi: f64, count: usize) -> Result<Self> {
        Self::log_space(10f64.powf(lo), 10f64.powf(hi), count)
    }

    pub fn points(&self) -> &[HyperparameterPoint] {
        &self.points
    }

    pub fn penalties(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.penalty).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HyperparameterPoint> {
        self.points.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_space() {
        let grid = HyperparameterGrid::log_space(0.001, 1.0, 5).unwrap();
        let expected = [0.001, 0.005623, 0.031623, 0.177828, 1.0];
        assert_eq!(grid.len(), 5);
        for (p, e) in grid.points().iter().zip(expected) {
            assert!((p.penalty - e).abs() / e < 1e-4, "{} vs {}", p.penalty, e);
        }
        assert_eq!(grid.points()[0].penalty, 0.001);
        assert_eq!(grid.points()[4].penalty, 1.0);
        assert_eq!(grid.points()[3].index, 3);
    }

    #[test]
    fn test_geometric_ratio() {
        let grid = HyperparameterGrid::log_space(0.01, 100.0, 9).unwrap();
        let p = grid.penalties();
        for w in p.windows(2) {
            assert!((w[1] / w[0] - 10f64.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_log10_range() {
        let a = HyperparameterGrid::from_log10_range(-3.0, 0.0, 5).unwrap();
        let b = HyperparameterGrid::log_space(0.001, 1.0, 5).unwrap();
        for (x, y) in a.penalties().iter().zip(b.penalties()) {
            assert!((x - y).abs() < 1e-15);
        }
    }

    #[test]
    fn test_invalid_grid() {
        assert!(matches!(HyperparameterGrid::log_space(0.1, 1.0, 1), Err(SweepError::InvalidGrid(_))));
        assert!(matches!(HyperparameterGrid::log_space(0.0, 1.0, 3), Err(SweepError::InvalidGrid(_))));
        assert!(matches!(HyperparameterGrid::log_space(1.0, 0.1, 3), Err(SweepError::InvalidGrid(_))));
        assert!(matches!(HyperparameterGrid::log_space(0.1, f64::INFINITY, 3), Err(SweepError::InvalidGrid(_))));
    }
}
