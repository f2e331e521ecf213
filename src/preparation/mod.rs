//! Feature/target preparation
//!
//! Turns a loaded [`Dataset`] into train/test matrices. Classification
//! thresholds the raw target into a 0/1 label and splits stratified;
//! regression keeps the raw target and splits without stratification.
//! Both splits are seeded and reproducible.

mod split;

pub use split::{stratified_split, train_test_split, SplitConfig, SplitIndices};

use crate::data::{Dataset, FeatureSpec};
use crate::error::Result;
use ndarray::{Array1, Array2, Axis};
use tracing::info;

/// Train/test projections of one dataset
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub split: SplitIndices,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl PreparedData {
    pub fn n_train(&self) -> usize {
        self.split.train.len()
    }

    pub fn n_test(&self) -> usize {
        self.split.test.len()
    }

    fn from_split(
        x: &Array2<f64>,
        y: &Array1<f64>,
        split: SplitIndices,
        feature_names: Vec<String>,
        target_name: String,
    ) -> Self {
        let prepared = Self {
            x_train: x.select(Axis(0), &split.train),
            x_test: x.select(Axis(0), &split.test),
            y_train: y.select(Axis(0), &split.train),
            y_test: y.select(Axis(0), &split.test),
            feature_names,
            target_name,
            split,
        };
        info!(
            "Data prepared: {} training samples, {} testing samples",
            prepared.n_train(),
            prepared.n_test()
        );
        prepared
    }
}

/// 1.0 where `value > threshold`, else 0.0
pub fn binarize(values: &Array1<f64>, threshold: f64) -> Array1<f64> {
    values.mapv(|v| if v > threshold { 1.0 } else { 0.0 })
}

/// Binary label from the thresholded target, stratified split.
pub fn prepare_classification(
    dataset: &Dataset,
    spec: &FeatureSpec,
    config: &SplitConfig,
) -> Result<PreparedData> {
    let raw = dataset.column_values(&spec.target)?;
    let y = binarize(&raw, spec.threshold);
    let x = dataset.columns_to_array2(&spec.features)?;

    let split = stratified_split(&y, config)?;
    Ok(PreparedData::from_split(
        &x,
        &y,
        split,
        spec.features.clone(),
        spec.label_name.clone(),
    ))
}

/// Raw numeric target, plain shuffled split.
pub fn prepare_regression(
    dataset: &Dataset,
    spec: &FeatureSpec,
    config: &SplitConfig,
) -> Result<PreparedData> {
    let y = dataset.column_values(&spec.target)?;
    let x = dataset.columns_to_array2(&spec.features)?;

    let split = train_test_split(dataset.height(), config)?;
    Ok(PreparedData::from_split(
        &x,
        &y,
        split,
        spec.features.clone(),
        spec.target.clone(),
    ))
}
