//! Exhaustive search over the regularization strength of logistic regression

use super::config::SearchConfig;
use super::cross_validation::{CVResults, CVSplit, StratifiedKFold};
use super::linear_models::LogisticRegression;
use super::metrics::accuracy_score;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cross-validated score of one `C`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCandidate {
    pub c: f64,
    pub cv: CVResults,
}

impl GridCandidate {
    pub fn mean_score(&self) -> f64 {
        self.cv.mean()
    }
}

/// Outcome of a search, including the estimator refit on all rows
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_c: f64,
    pub best_score: f64,
    pub candidates: Vec<GridCandidate>,
    pub best_estimator: LogisticRegression,
}

/// Grid search with stratified k-fold accuracy
pub struct GridSearch {
    config: SearchConfig,
}

impl GridSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    fn estimator(&self, c: f64) -> LogisticRegression {
        LogisticRegression::new()
            .with_c(c)
            .with_max_iter(self.config.max_iter)
            .with_tol(self.config.tol)
    }

    fn evaluate(&self, c: f64, x: &Array2<f64>, y: &Array1<f64>, splits: &[CVSplit]) -> Result<GridCandidate> {
        let fold_scores = splits
            .par_iter()
            .map(|split| {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train = y.select(Axis(0), &split.train_indices);
                let x_val = x.select(Axis(0), &split.test_indices);
                let y_val = y.select(Axis(0), &split.test_indices);

                let mut model = self.estimator(c);
                model.fit(&x_train, &y_train)?;
                let y_pred = model.predict(&x_val)?;
                Ok(accuracy_score(&y_val, &y_pred))
            })
            .collect::<Result<Vec<f64>>>()?;

        let candidate = GridCandidate {
            c,
            cv: CVResults::new(fold_scores),
        };
        debug!(
            "C = {}: mean accuracy {:.4} (+/- {:.4})",
            c,
            candidate.mean_score(),
            candidate.cv.std()
        );
        Ok(candidate)
    }

    /// Score every candidate, pick the best mean accuracy (earliest wins ties)
    /// and refit it on the full training set.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        self.config.validate()?;

        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        let splits = StratifiedKFold::new(self.config.cv_folds).split(y)?;

        let candidates = self
            .config
            .c_grid
            .par_iter()
            .map(|&c| self.evaluate(c, x, y, &splits))
            .collect::<Result<Vec<_>>>()?;

        let best = candidates
            .iter()
            .fold(None::<&GridCandidate>, |best, cand| match best {
                Some(b) if b.mean_score() >= cand.mean_score() => Some(b),
                _ => Some(cand),
            })
            .ok_or_else(|| PipelineError::ConfigError("c_grid must not be empty".to_string()))?;

        let (best_c, best_score) = (best.c, best.mean_score());
        info!(
            "Grid search picked C = {} (mean CV accuracy {:.4}, {} folds)",
            best_c,
            best_score,
            splits.len()
        );

        let mut best_estimator = self.estimator(best_c);
        best_estimator.fit(x, y)?;

        Ok(GridSearchResult {
            best_c,
            best_score,
            candidates,
            best_estimator,
        })
    }
}
