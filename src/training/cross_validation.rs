//! Cross-validation splitter

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-Fold (maintains class distribution).
///
/// Rows are not shuffled, so the same labels always give the same folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self::new(5)
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Generate train/test splits for the given labels
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(PipelineError::ConfigError(
                "n_splits must be at least 2".to_string(),
            ));
        }

        // Ordered by label so fold assignment is reproducible
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        match class_indices.values().map(Vec::len).max() {
            None => return Err(PipelineError::DataError("cannot split zero samples".to_string())),
            Some(largest) if largest < n_splits => {
                return Err(PipelineError::DataError(format!(
                    "n_splits ({}) cannot be greater than the number of members in each class ({})",
                    n_splits, largest
                )));
            }
            Some(_) => {}
        }

        // Deal each class round-robin, continuing from where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();

                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Per-fold scores for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub fold_scores: Vec<f64>,
}

impl CVResults {
    pub fn new(fold_scores: Vec<f64>) -> Self {
        Self { fold_scores }
    }

    pub fn mean(&self) -> f64 {
        if self.fold_scores.is_empty() {
            return 0.0;
        }
        self.fold_scores.iter().sum::<f64>() / self.fold_scores.len() as f64
    }

    pub fn std(&self) -> f64 {
        let n = self.fold_scores.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_samples() {
        let y = Array1::from_iter((0..23).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }));
        let splits = StratifiedKFold::new(5).split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_stratified_folds_keep_class_ratio() {
        let y = Array1::from_iter((0..100).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }));
        let splits = StratifiedKFold::default().split(&y).unwrap();

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 5);
        }
    }

    #[test]
    fn test_stratified_is_deterministic() {
        let y = Array1::from_iter((0..37).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }));
        let cv = StratifiedKFold::new(4);
        assert_eq!(cv.split(&y).unwrap(), cv.split(&y).unwrap());
    }

    #[test]
    fn test_too_many_folds() {
        let y = Array1::from_iter((0..8).map(|i| (i % 2) as f64));
        assert!(matches!(StratifiedKFold::new(5).split(&y), Err(PipelineError::DataError(_))));
        assert!(matches!(StratifiedKFold::new(1).split(&y), Err(PipelineError::ConfigError(_))));
        assert!(StratifiedKFold::new(2).split(&Array1::zeros(0)).is_err());
    }

    #[test]
    fn test_cv_results_stats() {
        let results = CVResults::new(vec![0.8, 0.9, 1.0]);
        assert!((results.mean() - 0.9).abs() < 1e-12);
        assert!(results.std() > 0.0);
    }
}
