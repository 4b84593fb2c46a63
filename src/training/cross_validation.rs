//! K-fold cross-validation

use crate::data::{take_rows, Dataset};
use crate::error::{Result, SweepError};
use polars::prelude::DataFrame;
use crate::split::strata::{self, StrataSpec, StrataValues};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One validation partition of the training set, with its complement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    /// Unique across repeats
    pub id: usize,
    pub repeat: usize,
    pub train_indices: Vec<usize>,
    pub validation_indices: Vec<usize>,
}

impl Fold {
    /// Rows the model is fitted on
    pub fn training(&self, dataset: &Dataset) -> Dataset {
        dataset.subset(&self.train_indices)
    }

    /// Rows the fitted model is scored on
    pub fn validation(&self, dataset: &Dataset) -> Dataset {
        dataset.subset(&self.validation_indices)
    }

    /// Training rows of a raw frame
    pub fn training_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        take_rows(df, &self.train_indices)
    }

    /// Validation rows of a raw frame
    pub fn validation_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        take_rows(df, &self.validation_indices)
    }
}

/// Seeded k-fold splitter, optionally stratified and repeated
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_folds: usize,
    n_repeats: usize,
    random_state: u64,
    strata: Option<StrataSpec>,
}

impl CrossValidator {
    /// Create a cross-validator producing `n_folds` folds
    pub fn new(n_folds: usize) -> Self {
        Self {
            n_folds,
            n_repeats: 1,
            random_state: 0,
            strata: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Stratify fold assignment on a field
    pub fn with_strata(mut self, strata: StrataSpec) -> Self {
        self.strata = Some(strata);
        self
    }

    /// Repeat the whole k-fold assignment `n_repeats` times
    pub fn with_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Partition the training set into folds
    pub fn make_folds(&self, train: &Dataset) -> Result<Vec<Fold>> {
        let values = match &self.strata {
            Some(spec) => Some(StrataValues::from_dataset(train, &spec.field)?),
            None => None,
        };
        self.assign_folds(train.n_rows(), values.as_ref())
    }

    /// Partition the rows of a raw training frame into folds; string strata fields stratify by level
    pub fn make_frame_folds(&self, train: &DataFrame) -> Result<Vec<Fold>> {
        let values = match &self.strata {
            Some(spec) => Some(StrataValues::from_frame(train, &spec.field)?),
            None => None,
        };
        self.assign_folds(train.height(), values.as_ref())
    }

    fn assign_folds(&self, n_samples: usize, strata_values: Option<&StrataValues>) -> Result<Vec<Fold>> {
        if self.n_folds < 2 || self.n_folds > n_samples {
            return Err(SweepError::InvalidFoldCount {
                k: self.n_folds,
                n_rows: n_samples,
            });
        }

        let groups = match (strata_values, &self.strata) {
            (Some(values), Some(spec)) => {
                strata::group_rows(&strata::assign_strata(values, spec.bins, self.n_folds))
            }
            _ => vec![(0..n_samples).collect()],
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds = Vec::with_capacity(self.n_folds * self.n_repeats);

        for repeat in 0..self.n_repeats {
            let assignment = if self.strata.is_some() {
                self.stratified_assignment(n_samples, &groups, &mut rng)
            } else {
                self.k_fold_assignment(n_samples, &mut rng)
            };

            for fold_idx in 0..self.n_folds {
                let (validation_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&row| assignment[row] == fold_idx);
                folds.push(Fold {
                    id: repeat * self.n_folds + fold_idx,
                    repeat,
                    train_indices,
                    validation_indices,
                });
            }
        }

        debug!(
            n_samples,
            n_folds = self.n_folds,
            n_repeats = self.n_repeats,
            stratified = self.strata.is_some(),
            "Created folds"
        );
        Ok(folds)
    }

    /// Shuffle, then cut into contiguous chunks whose sizes differ by at most one
    fn k_fold_assignment(&self, n_samples: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(rng);

        let base = n_samples / self.n_folds;
        let remainder = n_samples % self.n_folds;

        let mut assignment = vec![0; n_samples];
        let mut current = 0;
        for fold_idx in 0..self.n_folds {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            for &row in &indices[current..current + fold_size] {
                assignment[row] = fold_idx;
            }
            current += fold_size;
        }
        assignment
    }

    /// Shuffle within each stratum, then deal rows round-robin.
    /// The dealing counter runs across strata so fold sizes stay balanced.
    fn stratified_assignment(
        &self,
        n_samples: usize,
        groups: &[Vec<usize>],
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let mut assignment = vec![0; n_samples];
        let mut next = 0;
        for group in groups {
            let mut rows = group.clone();
            rows.shuffle(rng);
            for row in rows {
                assignment[row] = next % self.n_folds;
                next += 1;
            }
        }
        assignment
    }
}

/// Aggregate of one candidate's fold scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldAggregate {
    /// Fold ids that produced a score, aligned with `scores`
    pub fold_ids: Vec<usize>,
    /// Scores for each successful fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean: f64,
    /// Sample standard deviation of scores (0 for a single fold)
    pub std_dev: f64,
    /// Standard error of the mean
    pub std_err: f64,
    /// Number of folds aggregated
    pub n_folds: usize,
}

impl FoldAggregate {
    /// Aggregate (fold id, score) pairs; `None` when there are no scores
    pub fn from_scores(scores: Vec<(usize, f64)>) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let (fold_ids, scores): (Vec<usize>, Vec<f64>) = scores.into_iter().unzip();
        let n_folds = scores.len();
        let mean = scores.iter().sum::<f64>() / n_folds as f64;
        let std_dev = if n_folds > 1 {
            let variance =
                scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n_folds - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            fold_ids,
            scores,
            mean,
            std_dev,
            std_err: std_dev / (n_folds as f64).sqrt(),
            n_folds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use polars::prelude::*;

    fn dataset(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(n, |i| (i % 3) as f64);
        Dataset::new(vec!["x".to_string()], "y", x, y).unwrap()
    }

    fn assert_partition(folds: &[Fold], n: usize) {
        let mut all: Vec<usize> = folds.iter().flat_map(|f| f.validation_indices.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
        for fold in folds {
            assert_eq!(fold.train_indices.len() + fold.validation_indices.len(), n);
            for idx in &fold.validation_indices {
                assert!(!fold.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_k_fold() {
        let folds = CrossValidator::new(5).with_random_state(1).make_folds(&dataset(80)).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.validation_indices.len(), 16);
            assert_eq!(fold.train_indices.len(), 64);
        }
        assert_partition(&folds, 80);
    }

    #[test]
    fn test_uneven_fold_sizes() {
        let folds = CrossValidator::new(3).make_folds(&dataset(10)).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.validation_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_partition(&folds, 10);
    }

    #[test]
    fn test_invalid_fold_count() {
        let ds = dataset(4);
        assert!(matches!(
            CrossValidator::new(1).make_folds(&ds),
            Err(SweepError::InvalidFoldCount { k: 1, n_rows: 4 })
        ));
        assert!(matches!(
            CrossValidator::new(5).make_folds(&ds),
            Err(SweepError::InvalidFoldCount { .. })
        ));
        assert_eq!(CrossValidator::new(4).make_folds(&ds).unwrap().len(), 4);
    }

    #[test]
    fn test_same_seed_same_folds() {
        let ds = dataset(50);
        let cv = CrossValidator::new(5).with_random_state(9);
        assert_eq!(cv.make_folds(&ds).unwrap(), cv.make_folds(&ds).unwrap());
    }

    #[test]
    fn test_stratified_k_fold() {
        // Classes 0, 1, 2 with 10 rows each: every fold gets two of each
        let ds = dataset(30);
        let folds = CrossValidator::new(5)
            .with_random_state(4)
            .with_strata(StrataSpec::new("y", 3))
            .make_folds(&ds)
            .unwrap();

        assert_partition(&folds, 30);
        for fold in &folds {
            assert_eq!(fold.validation_indices.len(), 6);
            let val = fold.validation(&ds);
            for class in 0..3 {
                let count = val.target().iter().filter(|&&v| v == class as f64).count();
                assert_eq!(count, 2);
            }
        }
    }

    #[test]
    fn test_stratified_small_stratum_does_not_fail() {
        let x = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let mut y = Array1::zeros(12);
        y[11] = 1.0;
        let ds = Dataset::new(vec!["x".to_string()], "y", x, y).unwrap();

        let folds = CrossValidator::new(4)
            .with_strata(StrataSpec::new("y", 2))
            .make_folds(&ds)
            .unwrap();
        assert_eq!(folds.len(), 4);
        assert_partition(&folds, 12);
    }

    #[test]
    fn test_frame_folds_match_dataset_folds() {
        let ds = dataset(30);
        let df = df!(
            "x" => (0..30).map(|i| i as f64).collect::<Vec<_>>(),
            "y" => (0..30).map(|i| (i % 3) as f64).collect::<Vec<_>>()
        )
        .unwrap();
        let cv = CrossValidator::new(3).with_random_state(6).with_strata(StrataSpec::new("y", 3));
        let folds = cv.make_frame_folds(&df).unwrap();
        assert_eq!(folds, cv.make_folds(&ds).unwrap());

        let valid = folds[0].validation_frame(&df).unwrap();
        let train = folds[0].training_frame(&df).unwrap();
        assert_eq!(valid.height(), 10);
        assert_eq!(train.height(), 20);
    }

    #[test]
    fn test_repeated_k_fold() {
        let folds = CrossValidator::new(5)
            .with_repeats(3)
            .with_random_state(42)
            .make_folds(&dataset(100))
            .unwrap();

        assert_eq!(folds.len(), 15);
        let ids: Vec<usize> = folds.iter().map(|f| f.id).collect();
        assert_eq!(ids, (0..15).collect::<Vec<_>>());
        assert_partition(&folds[5..10], 100);
        assert_ne!(folds[0].validation_indices, folds[5].validation_indices);
    }

    #[test]
    fn test_fold_aggregate() {
        let agg = FoldAggregate::from_scores(vec![(0, 1.0), (1, 2.0), (2, 3.0)]).unwrap();
        assert!((agg.mean - 2.0).abs() < 1e-12);
        assert!((agg.std_dev - 1.0).abs() < 1e-12);
        assert!((agg.std_err - 1.0 / 3f64.sqrt()).abs() < 1e-12);
        assert_eq!(agg.fold_ids, vec![0, 1, 2]);

        let single = FoldAggregate::from_scores(vec![(4, 0.5)]).unwrap();
        assert_eq!(single.std_dev, 0.0);
        assert!(FoldAggregate::from_scores(Vec::new()).is_none());
    }
}
