//! Seeded train/test partitioning

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hold-out fraction and seed for one split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
        }
    }

    /// `(n_train, n_test)` for `n` rows; the test side is rounded up.
    pub fn sizes(&self, n: usize) -> Result<(usize, usize)> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        let n_test = (self.test_fraction * n as f64).ceil() as usize;
        let n_train = n.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(PipelineError::DataError(format!(
                "cannot split {} rows with test_fraction {}: one side would be empty",
                n, self.test_fraction
            )));
        }
        Ok((n_train, n_test))
    }
}

/// Disjoint row indices into the source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle all rows once and hold out the first `n_test`.
pub fn train_test_split(n_samples: usize, config: &SplitConfig) -> Result<SplitIndices> {
    let (_, n_test) = config.sizes(n_samples)?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Split so that each class keeps its share of rows on both sides.
///
/// Per-class test counts are the floor of the proportional share, with the
/// leftover rows handed to the classes with the largest remainders. Classes
/// are visited in ascending label order so the result depends only on the
/// labels and the seed.
pub fn stratified_split(labels: &Array1<f64>, config: &SplitConfig) -> Result<SplitIndices> {
    let n_samples = labels.len();
    let (n_train, n_test) = config.sizes(n_samples)?;

    let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        class_indices.entry(label.round() as i64).or_default().push(idx);
    }

    if let Some((class, members)) = class_indices.iter().find(|(_, m)| m.len() < 2) {
        return Err(PipelineError::DataError(format!(
            "the least populated class in y ({}) has only {} member; at least 2 are required to stratify",
            class,
            members.len()
        )));
    }
    let n_classes = class_indices.len();
    if n_test < n_classes || n_train < n_classes {
        return Err(PipelineError::DataError(format!(
            "train ({}) and test ({}) sizes must each be at least the number of classes ({})",
            n_train, n_test, n_classes
        )));
    }

    let allocation = allocate_test_counts(&class_indices, n_samples, n_test);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (members, take) in class_indices.values_mut().zip(allocation) {
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

fn allocate_test_counts(
    class_indices: &BTreeMap<i64, Vec<usize>>,
    n_samples: usize,
    n_test: usize,
) -> Vec<usize> {
    let exact: Vec<f64> = class_indices
        .values()
        .map(|m| m.len() as f64 * n_test as f64 / n_samples as f64)
        .collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut leftover = n_test - counts.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });

    for &class in order.iter().cycle() {
        if leftover == 0 {
            break;
        }
        let size = class_indices.values().nth(class).map_or(0, |m| m.len());
        if counts[class] + 1 < size {
            counts[class] += 1;
            leftover -= 1;
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, positive_every: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| if i % positive_every == 0 { 1.0 } else { 0.0 }))
    }

    #[test]
    fn test_sizes_round_test_side_up() {
        let cfg = SplitConfig::new(0.3, 1);
        assert_eq!(cfg.sizes(10).unwrap(), (7, 3));
        assert_eq!(cfg.sizes(11).unwrap(), (7, 4));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(SplitConfig::new(0.0, 1).sizes(10).is_err());
        assert!(SplitConfig::new(1.0, 1).sizes(10).is_err());
    }

    #[test]
    fn test_random_split_partitions_rows() {
        let split = train_test_split(100, &SplitConfig::new(0.3, 7)).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.test.len(), 30);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let cfg = SplitConfig::new(0.25, 2022);
        assert_eq!(train_test_split(50, &cfg).unwrap(), train_test_split(50, &cfg).unwrap());

        let y = labels(80, 4);
        assert_eq!(stratified_split(&y, &cfg).unwrap(), stratified_split(&y, &cfg).unwrap());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = train_test_split(100, &SplitConfig::new(0.3, 1)).unwrap();
        let b = train_test_split(100, &SplitConfig::new(0.3, 2)).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_stratified_preserves_class_balance() {
        let y = labels(1000, 5);
        let split = stratified_split(&y, &SplitConfig::new(0.3, 42)).unwrap();

        assert_eq!(split.test.len(), 300);
        assert_eq!(split.train.len(), 700);

        let rate = |idx: &[usize]| idx.iter().filter(|&&i| y[i] > 0.5).count() as f64 / idx.len() as f64;
        assert!((rate(&split.test) - 0.2).abs() <= 0.01);
        assert!((rate(&split.train) - 0.2).abs() <= 0.01);
    }

    #[test]
    fn test_stratified_uneven_sizes_sum_up() {
        let y = labels(37, 3);
        let split = stratified_split(&y, &SplitConfig::new(0.3, 3)).unwrap();
        assert_eq!(split.train.len() + split.test.len(), 37);
        assert_eq!(split.test.len(), 12);
    }

    #[test]
    fn test_stratified_requires_two_members_per_class() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        let err = stratified_split(&y, &SplitConfig::new(0.4, 1)).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
    }
}
