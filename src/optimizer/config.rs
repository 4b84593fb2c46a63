//! Optimization direction and selection rules

use crate::error::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Order two scores so that the better one sorts first
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            OptimizeDirection::Minimize => a.total_cmp(&b),
            OptimizeDirection::Maximize => b.total_cmp(&a),
        }
    }

    /// Whether `candidate` is at most `margin` worse than `reference`
    pub fn within(&self, candidate: f64, reference: f64, margin: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => candidate <= reference + margin,
            OptimizeDirection::Maximize => candidate >= reference - margin,
        }
    }
}

impl FromStr for OptimizeDirection {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" | "min" => Ok(OptimizeDirection::Minimize),
            "maximize" | "max" => Ok(OptimizeDirection::Maximize),
            other => Err(SweepError::ConfigError(format!("unknown objective '{}'", other))),
        }
    }
}

/// How the winning grid point is picked from aggregated scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Best mean score; ties go to the sparser probe refit, then grid order
    #[default]
    Best,
    /// Largest penalty whose mean is within one standard error of the best
    OneStdErr,
}

impl FromStr for SelectionRule {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(SelectionRule::Best),
            "one_std_err" | "one-std-err" | "1se" => Ok(SelectionRule::OneStdErr),
            other => Err(SweepError::ConfigError(format!("unknown selection rule '{}'", other))),
        }
    }
}
