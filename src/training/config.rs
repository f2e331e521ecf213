//! Training configuration

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which model family a run trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Thresholded target, grid-searched logistic regression
    #[default]
    Classification,
    /// Raw target, ordinary least squares
    Regression,
}

impl TaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskMode::Classification => "classification",
            TaskMode::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classification" => Ok(TaskMode::Classification),
            "regression" => Ok(TaskMode::Regression),
            other => Err(PipelineError::InvalidTask(other.to_string())),
        }
    }
}

/// Hyperparameter search settings for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate inverse regularization strengths
    pub c_grid: Vec<f64>,
    /// Folds used inside the search
    pub cv_folds: usize,
    /// Newton iterations per fit
    pub max_iter: usize,
    /// Gradient tolerance per fit
    pub tol: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            c_grid: vec![0.1, 1.0, 10.0],
            cv_folds: 5,
            max_iter: 100,
            tol: 1e-4,
        }
    }
}

impl SearchConfig {
    pub fn with_c_grid(mut self, grid: Vec<f64>) -> Self {
        self.c_grid = grid;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.c_grid.is_empty() {
            return Err(PipelineError::ConfigError("c_grid must not be empty".to_string()));
        }
        if let Some(c) = self.c_grid.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(PipelineError::ConfigError(format!(
                "every C must be a positive finite number, got {}",
                c
            )));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.max_iter == 0 {
            return Err(PipelineError::ConfigError("max_iter must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_mode_parsing() {
        assert_eq!("classification".parse::<TaskMode>().unwrap(), TaskMode::Classification);
        assert_eq!("regression".parse::<TaskMode>().unwrap(), TaskMode::Regression);

        let err = "clustering".parse::<TaskMode>().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTask(ref t) if t == "clustering"));
    }

    #[test]
    fn test_search_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());
        assert!(SearchConfig::default().with_c_grid(vec![]).validate().is_err());
        assert!(SearchConfig::default().with_c_grid(vec![1.0, -0.5]).validate().is_err());
        assert!(SearchConfig::default().with_cv_folds(1).validate().is_err());
    }
}
