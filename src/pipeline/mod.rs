//! Pipeline orchestration
//!
//! One [`Pipeline`] invocation loads the configured files, prepares the
//! split for the selected task, opens a tracked run and trains into it.

mod config;

pub use config::PipelineConfig;

use crate::data::{Dataset, DatasetLoader};
use crate::error::Result;
use crate::preparation::{prepare_classification, prepare_regression, PreparedData};
use crate::tracking::{ExperimentTracker, RunStatus};
use crate::training::{TaskMode, TrainedModel, Trainer};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// What a successful invocation produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub model: TrainedModel,
    pub task: TaskMode,
    pub experiment_id: String,
    pub run_id: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    /// Paths relative to the run's artifact root
    pub artifacts: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
}

/// Loader, preparer and trainer wired in sequence
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with a task given by name. The name is checked before any I/O.
    pub fn execute_task(&mut self, task: &str) -> Result<PipelineOutput> {
        self.config.task_mode = task.parse()?;
        self.execute()
    }

    /// Run once and return the fitted model, logging any failure instead
    /// of returning it.
    pub fn run(&self) -> Option<TrainedModel> {
        match self.execute() {
            Ok(output) => Some(output.model),
            Err(e) => {
                error!("An error occurred: {}", e);
                None
            }
        }
    }

    pub fn load(&self) -> Result<Dataset> {
        let loader = DatasetLoader::new(self.config.preset.schema())
            .with_encoding(self.config.encoding)
            .with_delimiter(self.config.delimiter_byte()?);
        loader.load(self.config.dataset_paths.as_slice())
    }

    pub fn prepare(&self, dataset: &Dataset) -> Result<PreparedData> {
        let spec = self.config.preset.feature_spec();
        let split = self.config.split_config();
        match self.config.task_mode {
            TaskMode::Classification => prepare_classification(dataset, &spec, &split),
            TaskMode::Regression => prepare_regression(dataset, &spec, &split),
        }
    }

    pub fn execute(&self) -> Result<PipelineOutput> {
        self.config.validate()?;
        let task = self.config.task_mode;
        info!(
            "Starting {} pipeline on {} file(s) ({})",
            task,
            self.config.dataset_paths.len(),
            self.config.preset.as_str()
        );

        let dataset = self.load()?;
        let prepared = self.prepare(&dataset)?;

        let tracker = ExperimentTracker::with_dir(&self.config.tracking_root)?;
        let experiment = tracker.get_or_create_experiment(&self.config.experiment_name)?;

        let mut tags = BTreeMap::new();
        tags.insert("task".to_string(), task.to_string());
        tags.insert("dataset".to_string(), self.config.preset.as_str().to_string());
        let run_name = format!("{}-{}", self.config.preset.as_str(), task);
        let mut run = tracker.start_run(&experiment, run_name, tags)?;

        let trainer = Trainer::new(self.config.search.clone()).with_artifact_dir(&self.config.artifact_dir);

        match trainer.train(&prepared, task, &mut run) {
            Ok(model) => {
                let record = run.finish(RunStatus::Finished)?;
                Ok(PipelineOutput {
                    model,
                    task,
                    experiment_id: experiment.experiment_id,
                    run_id: record.info.run_id,
                    params: record.params,
                    metrics: record.metrics,
                    artifacts: record.artifacts,
                    n_train: prepared.n_train(),
                    n_test: prepared.n_test(),
                })
            }
            Err(e) => {
                if let Err(finish_err) = run.finish(RunStatus::Failed) {
                    warn!("Could not mark run as failed: {}", finish_err);
                }
                Err(e)
            }
        }
    }
}
