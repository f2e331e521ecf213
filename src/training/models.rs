//! Fitted model container

use super::config::TaskMode;
use super::linear_models::{LinearRegression, LogisticRegression};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A model produced by one run, with the feature order it was fit on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    Logistic(LogisticRegression),
    Linear(LinearRegression),
}

impl TrainedModel {
    pub fn task(&self) -> TaskMode {
        match self {
            TrainedModel::Logistic(_) => TaskMode::Classification,
            TrainedModel::Linear(_) => TaskMode::Regression,
        }
    }

    /// Class labels or continuous predictions depending on the task
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Logistic(m) => m.predict(x),
            TrainedModel::Linear(m) => m.predict(x),
        }
    }

    /// Positive-class probabilities; only classifiers have them
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::Logistic(m) => m.predict_proba(x),
            TrainedModel::Linear(_) => Err(PipelineError::ComputationError(
                "linear regression does not produce probabilities".to_string(),
            )),
        }
    }

    /// Save the model as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model saved by [`TrainedModel::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_save_and_load() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let mut linear = LinearRegression::new();
        linear.fit(&x, &y).unwrap();
        let model = TrainedModel::Linear(linear);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model").join("model.json");
        model.save(&path).unwrap();

        let restored = TrainedModel::load(&path).unwrap();
        assert_eq!(restored.task(), TaskMode::Regression);
        let before = model.predict(&x).unwrap();
        let after = restored.predict(&x).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_regressor_has_no_probabilities() {
        let x = array![[1.0], [2.0], [3.0]];
        let mut linear = LinearRegression::new();
        linear.fit(&x, &array![1.0, 2.0, 3.0]).unwrap();
        assert!(TrainedModel::Linear(linear).predict_proba(&x).is_err());
    }
}
