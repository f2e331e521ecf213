//! bikestore-ml - Reproducible training pipeline for bike-store tabular data
//!
//! Loads delimited-text files, derives a target, splits deterministically,
//! trains a logistic or linear regression model and records params,
//! metrics and artifacts to a local experiment store.
//!
//! # Modules
//!
//! - [`data`] - File loading, stacking and schema validation
//! - [`preparation`] - Target derivation and seeded train/test splits
//! - [`training`] - Models, grid search, metrics and the [`training::Trainer`]
//! - [`tracking`] - Append-only experiment and run records
//! - [`visualization`] - ROC curve rendering
//! - [`pipeline`] - Configuration and orchestration of one run
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use bikestore_ml::prelude::*;
//!
//! let config = PipelineConfig::sales()
//!     .with_paths(["data/sales.csv"])
//!     .with_task(TaskMode::Classification);
//! let output = Pipeline::new(config).execute()?;
//! println!("roc_auc = {:?}", output.metrics.get("roc_auc"));
//! # Ok::<(), bikestore_ml::error::PipelineError>(())
//! ```

pub mod error;

pub mod data;
pub mod preparation;
pub mod training;
pub mod tracking;
pub mod visualization;
pub mod pipeline;

pub mod cli;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{Dataset, DatasetLoader, DatasetPreset, DatasetSchema, TextEncoding};
    pub use crate::error::{ErrorKind, PipelineError, Result};
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutput};
    pub use crate::preparation::{prepare_classification, prepare_regression, PreparedData, SplitConfig};
    pub use crate::tracking::{ExperimentTracker, RunRecord, RunStatus};
    pub use crate::training::{
        LinearRegression, LogisticRegression, SearchConfig, TaskMode, TrainedModel, Trainer,
    };
}
