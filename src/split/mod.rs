//! Train/test splitting
//!
//! Partitions a dataset (or the raw frame it came from) into disjoint train
//! and test row sets, optionally stratified on one field. Splits are
//! reproducible: the same seed, rows and fraction always give the same
//! partition.

pub mod strata;

pub use strata::{assign_strata, StrataSpec, StrataValues};

use crate::data::{take_rows, Dataset};
use crate::error::{Result, SweepError};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strata with fewer rows than this cannot be divided and are pooled with a neighbour
const MIN_STRATUM_ROWS: usize = 2;

/// Row indices of a train/test partition, each ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    /// Materialize the partition on a dataset
    pub fn apply(&self, dataset: &Dataset) -> (Dataset, Dataset) {
        (dataset.subset(&self.train), dataset.subset(&self.test))
    }

    /// Materialize the partition on a frame
    pub fn apply_frame(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        Ok((take_rows(df, &self.train)?, take_rows(df, &self.test)?))
    }
}

/// Seeded, optionally stratified train/test splitter
#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    train_fraction: f64,
    seed: u64,
    strata: Option<StrataSpec>,
}

impl DatasetSplitter {
    /// Create a splitter; `train_fraction` must lie strictly between 0 and 1
    pub fn new(train_fraction: f64, seed: u64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(SweepError::InvalidFraction(train_fraction));
        }
        Ok(Self {
            train_fraction,
            seed,
            strata: None,
        })
    }

    /// Stratify on a field
    pub fn with_strata(mut self, strata: StrataSpec) -> Self {
        self.strata = Some(strata);
        self
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Split a dataset into (train, test)
    pub fn split(&self, dataset: &Dataset) -> Result<(Dataset, Dataset)> {
        Ok(self.split_indices(dataset)?.apply(dataset))
    }

    /// Compute the partition of a dataset without materializing it
    pub fn split_indices(&self, dataset: &Dataset) -> Result<Split> {
        let values = match &self.strata {
            Some(spec) => Some(StrataValues::from_dataset(dataset, &spec.field)?),
            None => None,
        };
        self.partition(dataset.n_rows(), values.as_ref())
    }

    /// Split a raw frame into (train, test); stratifies on string columns by level
    pub fn split_frame(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let values = match &self.strata {
            Some(spec) => Some(StrataValues::from_frame(df, &spec.field)?),
            None => None,
        };
        self.partition(df.height(), values.as_ref())?.apply_frame(df)
    }

    fn partition(&self, n_rows: usize, strata: Option<&StrataValues>) -> Result<Split> {
        if n_rows < 2 {
            return Err(SweepError::DataError(format!(
                "need at least 2 rows to split, got {}",
                n_rows
            )));
        }

        let n_train = ((n_rows as f64 * self.train_fraction).round() as usize).clamp(1, n_rows - 1);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let groups = match (strata, &self.strata) {
            (Some(values), Some(spec)) => {
                strata::group_rows(&assign_strata(values, spec.bins, MIN_STRATUM_ROWS))
            }
            _ => vec![(0..n_rows).collect()],
        };

        let quotas = self.quotas(&groups, n_train);

        let mut train = Vec::with_capacity(n_train);
        let mut test = Vec::with_capacity(n_rows - n_train);
        for (mut rows, quota) in groups.into_iter().zip(quotas) {
            rows.shuffle(&mut rng);
            train.extend_from_slice(&rows[..quota]);
            test.extend_from_slice(&rows[quota..]);
        }
        train.sort_unstable();
        test.sort_unstable();

        debug!(
            n_rows,
            n_train = train.len(),
            n_test = test.len(),
            seed = self.seed,
            "Split dataset"
        );
        Ok(Split { train, test })
    }

    /// Per-stratum train counts summing exactly to `n_train` (largest remainder)
    fn quotas(&self, groups: &[Vec<usize>], n_train: usize) -> Vec<usize> {
        let exact: Vec<f64> = groups
            .iter()
            .map(|g| g.len() as f64 * self.train_fraction)
            .collect();
        let mut quotas: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by(|&a, &b| {
            let fa = exact[a] - exact[a].floor();
            let fb = exact[b] - exact[b].floor();
            fb.total_cmp(&fa).then(a.cmp(&b))
        });

        let mut assigned: usize = quotas.iter().sum();
        for &g in order.iter().cycle().take(order.len() * 2) {
            if assigned >= n_train {
                break;
            }
            if quotas[g] < groups[g].len() {
                quotas[g] += 1;
                assigned += 1;
            }
        }
        quotas
    }
}
