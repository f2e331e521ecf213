//! Training module
//!
//! Model fitting, hyperparameter search, evaluation and the [`Trainer`]
//! that records all of it into a tracked run.

mod config;
mod cross_validation;
mod grid_search;
mod linear_models;
mod metrics;
mod models;
mod trainer;

pub use config::{SearchConfig, TaskMode};
pub use cross_validation::{CVResults, CVSplit, StratifiedKFold};
pub use grid_search::{GridCandidate, GridSearch, GridSearchResult};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use metrics::{
    accuracy_score, mean_squared_error, r2_score, roc_curve, ClassificationReport,
    ConfusionMatrix, RegressionReport, RocCurve,
};
pub use models::TrainedModel;
pub use trainer::{Trainer, MODEL_ARTIFACT, ROC_ARTIFACT};
