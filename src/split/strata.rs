//! Stratum assignment shared by the train/test splitter and the cross-validator

use crate::data::Dataset;
use crate::error::{Result, SweepError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Which field to stratify on, and how many quantile bins a continuous field gets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrataSpec {
    pub field: String,
    pub bins: usize,
}

impl StrataSpec {
    pub fn new(field: impl Into<String>, bins: usize) -> Self {
        Self {
            field: field.into(),
            bins,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bins < 2 {
            return Err(SweepError::ConfigError(format!(
                "strata bins for '{}' must be at least 2, got {}",
                self.field, self.bins
            )));
        }
        Ok(())
    }
}

/// Raw values of a strata field
#[derive(Debug, Clone)]
pub enum StrataValues {
    /// Numeric field; binned by quantile when it has more distinct values than bins
    Numeric(Vec<f64>),
    /// Categorical field already mapped to level codes; each level is a stratum
    Levels(Vec<usize>),
}

impl StrataValues {
    pub fn len(&self) -> usize {
        match self {
            StrataValues::Numeric(v) => v.len(),
            StrataValues::Levels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_dataset(dataset: &Dataset, field: &str) -> Result<Self> {
        Ok(StrataValues::Numeric(dataset.field(field)?.to_vec()))
    }

    /// Read a frame column; string columns become level codes in sorted label order
    pub fn from_frame(df: &DataFrame, field: &str) -> Result<Self> {
        let column = df
            .column(field)
            .map_err(|_| SweepError::FeatureNotFound(field.to_string()))?;

        if matches!(column.dtype(), DataType::String) {
            let labels: Vec<String> = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.unwrap_or("").to_string())
                .collect();
            let mut levels = labels.clone();
            levels.sort();
            levels.dedup();
            let codes = labels
                .iter()
                .map(|l| levels.binary_search(l).unwrap_or(0))
                .collect();
            return Ok(StrataValues::Levels(codes));
        }

        let values = column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        Ok(StrataValues::Numeric(values))
    }
}

/// Assign every row a dense stratum id, ordered by field value.
///
/// Strata holding fewer than `min_size` rows are merged into an adjacent stratum
/// until every stratum is large enough or only one remains.
pub fn assign_strata(values: &StrataValues, bins: usize, min_size: usize) -> Vec<usize> {
    let raw = match values {
        StrataValues::Levels(codes) => codes.clone(),
        StrataValues::Numeric(v) => bin_numeric(v, bins),
    };
    merge_small(&raw, min_size)
}

fn bin_numeric(values: &[f64], bins: usize) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    // Few distinct values: treat the field as discrete.
    if distinct.len() <= bins {
        return values
            .iter()
            .map(|v| distinct.partition_point(|d| d < v))
            .collect();
    }

    let mut breaks: Vec<f64> = (1..bins)
        .map(|i| quantile(&sorted, i as f64 / bins as f64))
        .collect();
    breaks.dedup();

    values
        .iter()
        .map(|v| breaks.partition_point(|b| b < v))
        .collect()
}

/// Linear-interpolation quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn merge_small(raw: &[usize], min_size: usize) -> Vec<usize> {
    let n_raw = raw.iter().copied().max().map_or(0, |m| m + 1);

    // Each group is a run of adjacent raw ids with a running row count.
    let mut groups: Vec<(Vec<usize>, usize)> = (0..n_raw).map(|id| (vec![id], 0)).collect();
    for &id in raw {
        groups[id].1 += 1;
    }
    groups.retain(|(_, count)| *count > 0);

    while groups.len() > 1 {
        let Some(i) = groups.iter().position(|(_, count)| *count < min_size) else {
            break;
        };
        let target = if i == 0 {
            1
        } else if i == groups.len() - 1 {
            i - 1
        } else if groups[i + 1].1 < groups[i - 1].1 {
            i + 1
        } else {
            i - 1
        };
        let (ids, count) = groups.remove(i);
        let target = if target > i { target - 1 } else { target };
        groups[target].0.extend(ids);
        groups[target].1 += count;
    }

    let mut mapping = vec![0usize; n_raw];
    for (group_id, (ids, _)) in groups.iter().enumerate() {
        for &id in ids {
            mapping[id] = group_id;
        }
    }
    raw.iter().map(|&id| mapping[id]).collect()
}

/// Group row indices by stratum id, rows ascending within each group
pub fn group_rows(ids: &[usize]) -> Vec<Vec<usize>> {
    let n_groups = ids.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups = vec![Vec::new(); n_groups];
    for (row, &id) in ids.iter().enumerate() {
        groups[id].push(row);
    }
    groups
}
