//! Winner selection, final refit and held-out evaluation

use super::config::{OptimizeDirection, SelectionRule};
use super::grid::HyperparameterPoint;
use super::tuner::{PointResult, TuneResults};
use crate::data::Dataset;
use crate::error::{Result, SweepError};
use crate::training::{FeatureImportance, FitResult, FoldAggregate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Relative tolerance under which two mean scores count as tied
const TIE_TOLERANCE: f64 = 1e-12;

/// Final refit on the whole training set, with the point that won selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub point: HyperparameterPoint,
    /// Cross-validation aggregate the point was selected on
    pub cv: FoldAggregate,
    pub fit: FitResult,
}

impl SelectedModel {
    pub fn penalty(&self) -> f64 {
        self.point.penalty
    }

    /// Absolute standardized coefficients, largest first
    pub fn importance(&self) -> Vec<FeatureImportance> {
        self.fit.importance()
    }
}

/// Picks a grid point from sweep results
#[derive(Debug, Clone)]
pub struct ModelSelector {
    direction: OptimizeDirection,
    rule: SelectionRule,
}

impl ModelSelector {
    pub fn new(direction: OptimizeDirection) -> Self {
        Self {
            direction,
            rule: SelectionRule::Best,
        }
    }

    pub fn with_rule(mut self, rule: SelectionRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn direction(&self) -> OptimizeDirection {
        self.direction
    }

    pub fn rule(&self) -> SelectionRule {
        self.rule
    }

    /// Choose the winning point.
    ///
    /// `probe` refits a candidate and is only called when several points tie on
    /// the best mean; the one with the fewest non-zero coefficients wins, and a
    /// remaining tie goes to the earliest point in grid order.
    pub fn select<P>(&self, results: &TuneResults, probe: P) -> Result<PointResult>
    where
        P: Fn(&HyperparameterPoint) -> Result<FitResult>,
    {
        let best = results
            .best(self.direction)
            .ok_or(SweepError::NoValidGridPoints(results.excluded.len()))?;

        let chosen = match self.rule {
            SelectionRule::Best => self.break_ties(results, best, probe)?,
            SelectionRule::OneStdErr => self.one_std_err(results, best),
        };

        info!(
            index = chosen.point.index,
            penalty = chosen.point.penalty,
            mean = chosen.cv.mean,
            std_err = chosen.cv.std_err,
            rule = ?self.rule,
            "Selected grid point"
        );
        Ok(chosen.clone())
    }

    fn break_ties<'a, P>(
        &self,
        results: &'a TuneResults,
        best: &'a PointResult,
        probe: P,
    ) -> Result<&'a PointResult>
    where
        P: Fn(&HyperparameterPoint) -> Result<FitResult>,
    {
        let tol = TIE_TOLERANCE * best.cv.mean.abs().max(1.0);
        let tied: Vec<&PointResult> = results
            .aggregates
            .iter()
            .filter(|a| (a.cv.mean - best.cv.mean).abs() <= tol)
            .collect();
        if tied.len() < 2 {
            return Ok(best);
        }

        debug!(n_tied = tied.len(), "Breaking tie on best mean with probe refits");
        let mut winner = tied[0];
        let mut winner_nnz = usize::MAX;
        for candidate in tied {
            let nnz = match probe(&candidate.point) {
                Ok(fit) => fit.non_zero_count(),
                Err(err) => {
                    warn!(index = candidate.point.index, error = %err, "Probe refit failed");
                    usize::MAX
                }
            };
            // aggregates are in grid order, so strict < keeps the earliest
            if nnz < winner_nnz {
                winner = candidate;
                winner_nnz = nnz;
            }
        }
        Ok(winner)
    }

    fn one_std_err<'a>(&self, results: &'a TuneResults, best: &'a PointResult) -> &'a PointResult {
        results
            .aggregates
            .iter()
            .filter(|a| self.direction.within(a.cv.mean, best.cv.mean, best.cv.std_err))
            .max_by(|a, b| a.point.penalty.total_cmp(&b.point.penalty))
            .unwrap_or(best)
    }

    /// Refit on the entire training set with the chosen point
    pub fn finalize<F>(&self, train: &Dataset, chosen: &PointResult, fit_fn: F) -> Result<SelectedModel>
    where
        F: Fn(&Dataset, &HyperparameterPoint) -> Result<FitResult>,
    {
        let fit = fit_fn(train, &chosen.point)?;
        info!(
            penalty = chosen.point.penalty,
            rows = train.n_rows(),
            non_zero = fit.non_zero_count(),
            "Final model refit"
        );
        Ok(SelectedModel {
            point: chosen.point,
            cv: chosen.cv.clone(),
            fit,
        })
    }

    /// Score the final model once on the held-out test rows
    pub fn evaluate<S>(&self, model: &SelectedModel, test: &Dataset, score_fn: S) -> Result<f64>
    where
        S: Fn(&FitResult, &Dataset) -> Result<f64>,
    {
        let score = score_fn(&model.fit, test)?;
        info!(score, rows = test.n_rows(), "Held-out evaluation");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::tuner::ExcludedPoint;
    use crate::training::{LassoRegression, Metric};
    use ndarray::{Array1, Array2};
    use std::cell::Cell;

    fn point(index: usize, penalty: f64, scores: &[f64]) -> PointResult {
        let cv = FoldAggregate::from_scores(scores.iter().copied().enumerate().collect()).unwrap();
        PointResult {
            point: HyperparameterPoint { index, penalty },
            cv,
            n_failed: 0,
        }
    }

    fn results(aggregates: Vec<PointResult>) -> TuneResults {
        TuneResults {
            aggregates,
            records: Vec::new(),
            failures: Vec::new(),
            excluded: Vec::new(),
            n_folds: 3,
        }
    }

    fn dataset() -> Dataset {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 2)) % 7) as f64);
        let y: Array1<f64> = x.column(0).mapv(|v| 3.0 * v + 1.0);
        Dataset::new(vec!["a".into(), "b".into()], "y", x, y).unwrap()
    }

    fn no_probe(_: &HyperparameterPoint) -> Result<FitResult> {
        panic!("probe should not run without a tie")
    }

    #[test]
    fn test_select_minimize_and_maximize() {
        let r = results(vec![
            point(0, 0.01, &[2.0, 2.2, 2.1]),
            point(1, 0.1, &[1.0, 1.1, 1.2]),
            point(2, 1.0, &[3.0, 3.0, 3.0]),
        ]);
        let min = ModelSelector::new(OptimizeDirection::Minimize).select(&r, no_probe).unwrap();
        assert_eq!(min.point.index, 1);
        let max = ModelSelector::new(OptimizeDirection::Maximize).select(&r, no_probe).unwrap();
        assert_eq!(max.point.index, 2);
    }

    #[test]
    fn test_tie_prefers_sparser_probe() {
        let ds = dataset();
        let r = results(vec![
            point(0, 0.001, &[1.0, 1.0, 1.0]),
            point(1, 0.01, &[1.0, 1.0, 1.0]),
            point(2, 100.0, &[1.0, 1.0, 1.0]),
        ]);
        let calls = Cell::new(0);
        let chosen = ModelSelector::new(OptimizeDirection::Minimize)
            .select(&r, |p| {
                calls.set(calls.get() + 1);
                LassoRegression::new(p.penalty).fit(&ds)
            })
            .unwrap();
        assert_eq!(calls.get(), 3);
        // the huge penalty zeroes every coefficient
        assert_eq!(chosen.point.index, 2);
    }

    #[test]
    fn test_tie_with_equal_sparsity_keeps_grid_order() {
        let ds = dataset();
        let r = results(vec![
            point(0, 0.5, &[4.0, 4.0]),
            point(1, 0.05, &[1.0, 1.0]),
            point(2, 0.05, &[1.0, 1.0]),
        ]);
        let chosen = ModelSelector::new(OptimizeDirection::Minimize)
            .select(&r, |p| LassoRegression::new(p.penalty).fit(&ds))
            .unwrap();
        assert_eq!(chosen.point.index, 1);
    }

    #[test]
    fn test_one_std_err_prefers_larger_penalty() {
        let r = results(vec![
            point(0, 0.01, &[1.0, 1.2, 1.4]),
            point(1, 0.1, &[1.1, 1.3, 1.5]),
            point(2, 1.0, &[3.0, 3.1, 3.2]),
        ]);
        let chosen = ModelSelector::new(OptimizeDirection::Minimize)
            .with_rule(SelectionRule::OneStdErr)
            .select(&r, no_probe)
            .unwrap();
        assert_eq!(chosen.point.index, 1);
    }

    #[test]
    fn test_select_without_usable_points() {
        let mut r = results(Vec::new());
        r.excluded.push(ExcludedPoint {
            point: HyperparameterPoint { index: 0, penalty: 1.0 },
            reason: "no folds".into(),
        });
        let err = ModelSelector::new(OptimizeDirection::Minimize).select(&r, no_probe);
        assert!(matches!(err, Err(SweepError::NoValidGridPoints(1))));
    }

    #[test]
    fn test_finalize_and_evaluate() {
        let ds = dataset();
        let chosen = point(0, 0.001, &[0.5, 0.6]);
        let selector = ModelSelector::new(OptimizeDirection::Minimize);
        let model = selector
            .finalize(&ds, &chosen, |d, p| LassoRegression::new(p.penalty).fit(d))
            .unwrap();

        assert_eq!(model.penalty(), 0.001);
        assert_eq!(model.cv, chosen.cv);
        assert_eq!(model.importance()[0].feature, "a");

        let rmse = selector.evaluate(&model, &ds, |f, d| Metric::Rmse.score(f, d)).unwrap();
        assert!(rmse.is_finite() && rmse < 0.1);
    }
}
