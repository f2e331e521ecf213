//! Experiment Tracker Implementation
//!
//! Track experiments, runs, params, metrics, and artifacts.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::storage::{LocalStorage, RecordStream, StorageBackend};
use crate::error::{PipelineError, Result};

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is currently running
    Running,
    /// Run completed successfully
    Finished,
    /// Run failed
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    /// Step/epoch number
    pub step: u64,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, step: u64) -> Self {
        Self {
            name: name.into(),
            value,
            step,
            timestamp: Utc::now(),
        }
    }
}

/// A logged parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// Run metadata stored in the run's `meta.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    /// None while the run is active
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Everything recorded for a run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub info: RunInfo,
    pub params: BTreeMap<String, String>,
    /// Latest value of each metric
    pub metrics: BTreeMap<String, f64>,
    pub metrics_history: Vec<Metric>,
    /// Paths relative to the run's artifact root
    pub artifacts: Vec<String>,
}

impl RunRecord {
    fn new(info: RunInfo) -> Self {
        Self {
            info,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            metrics_history: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.info.status
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.info.end_time.unwrap_or_else(Utc::now);
        (end - self.info.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Populated when read back through the tracker
    #[serde(skip)]
    pub runs: Vec<RunRecord>,
}

impl Experiment {
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            created_at: Utc::now(),
            tags: BTreeMap::new(),
            runs: Vec::new(),
        }
    }

    /// Get the best run by a metric
    pub fn best_run(&self, metric_name: &str, maximize: bool) -> Option<&RunRecord> {
        self.runs
            .iter()
            .filter_map(|r| r.metric(metric_name).map(|v| (r, v)))
            .max_by(|(_, a), (_, b)| {
                if maximize {
                    a.total_cmp(b)
                } else {
                    b.total_cmp(a)
                }
            })
            .map(|(r, _)| r)
    }
}

/// Directory-safe identifier derived from an experiment name
pub fn experiment_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Experiment tracker
pub struct ExperimentTracker {
    storage: Arc<dyn StorageBackend>,
}

impl ExperimentTracker {
    /// Tracker over a local directory
    pub fn with_dir(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_storage(Arc::new(LocalStorage::new(root)?)))
    }

    pub fn with_storage(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Fetch the experiment with this name, creating it on first use
    pub fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let experiment_id = experiment_slug(name);
        if experiment_id.is_empty() {
            return Err(PipelineError::TrackingError(format!(
                "experiment name '{}' has no usable characters",
                name
            )));
        }

        if let Some(existing) = self.storage.load_experiment(&experiment_id)? {
            return Ok(existing);
        }

        let experiment = Experiment::new(&experiment_id, name);
        self.storage.save_experiment(&experiment)?;
        info!("Created experiment '{}' ({})", name, experiment_id);
        Ok(experiment)
    }

    /// Open a new run; it stays `running` until [`ActiveRun::finish`]
    pub fn start_run(
        &self,
        experiment: &Experiment,
        run_name: impl Into<String>,
        tags: BTreeMap<String, String>,
    ) -> Result<ActiveRun> {
        let info = RunInfo {
            run_id: Uuid::new_v4().simple().to_string(),
            run_name: run_name.into(),
            experiment_id: experiment.experiment_id.clone(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            tags,
        };
        self.storage.save_run_info(&info)?;
        info!("Started run {} in experiment '{}'", info.run_id, experiment.name);

        Ok(ActiveRun {
            storage: Arc::clone(&self.storage),
            record: RunRecord::new(info),
        })
    }

    /// Rebuild a run from its metadata and its appended streams
    pub fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<RunRecord> {
        let info = self.storage.load_run_info(experiment_id, run_id)?;
        let mut record = RunRecord::new(info);

        for line in self.storage.read_records(experiment_id, run_id, RecordStream::Params)? {
            match serde_json::from_str::<Param>(&line) {
                Ok(param) => {
                    record.params.insert(param.key, param.value);
                }
                Err(e) => warn!("Skipping malformed param record in run {}: {}", run_id, e),
            }
        }
        for line in self.storage.read_records(experiment_id, run_id, RecordStream::Metrics)? {
            match serde_json::from_str::<Metric>(&line) {
                Ok(metric) => {
                    record.metrics.insert(metric.name.clone(), metric.value);
                    record.metrics_history.push(metric);
                }
                Err(e) => warn!("Skipping malformed metric record in run {}: {}", run_id, e),
            }
        }
        record.artifacts = self.storage.list_artifacts(experiment_id, run_id)?;

        Ok(record)
    }

    /// Runs of an experiment, oldest first
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let mut runs = self
            .storage
            .list_run_ids(experiment_id)?
            .iter()
            .map(|run_id| self.get_run(experiment_id, run_id))
            .collect::<Result<Vec<_>>>()?;
        runs.sort_by_key(|r| r.info.start_time);
        Ok(runs)
    }

    /// Experiment with its runs loaded
    pub fn get_experiment(&self, experiment_id: &str) -> Result<Option<Experiment>> {
        match self.storage.load_experiment(experiment_id)? {
            Some(mut experiment) => {
                experiment.runs = self.list_runs(experiment_id)?;
                Ok(Some(experiment))
            }
            None => Ok(None),
        }
    }

    /// All experiments with their runs loaded
    pub fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let mut experiments = Vec::new();
        for id in self.storage.list_experiment_ids()? {
            if let Some(experiment) = self.get_experiment(&id)? {
                experiments.push(experiment);
            }
        }
        Ok(experiments)
    }
}

/// Handle to an open run. Every log call is written through immediately.
pub struct ActiveRun {
    storage: Arc<dyn StorageBackend>,
    record: RunRecord,
}

impl ActiveRun {
    pub fn run_id(&self) -> &str {
        &self.record.info.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.record.info.experiment_id
    }

    /// What has been logged so far
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Log a parameter
    pub fn log_param(&mut self, key: impl Into<String>, value: impl fmt::Display) -> Result<()> {
        let param = Param {
            key: key.into(),
            value: value.to_string(),
            timestamp: Utc::now(),
        };
        let line = serde_json::to_string(&param)?;
        self.storage
            .append_record(&self.record.info, RecordStream::Params, &line)?;
        debug!("param {} = {}", param.key, param.value);
        self.record.params.insert(param.key, param.value);
        Ok(())
    }

    /// Log a metric at step 0
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        self.log_metric_at(name, value, 0)
    }

    pub fn log_metric_at(&mut self, name: impl Into<String>, value: f64, step: u64) -> Result<()> {
        let metric = Metric::new(name, value, step);
        let line = serde_json::to_string(&metric)?;
        self.storage
            .append_record(&self.record.info, RecordStream::Metrics, &line)?;
        debug!("metric {} = {}", metric.name, metric.value);
        self.record.metrics.insert(metric.name.clone(), metric.value);
        self.record.metrics_history.push(metric);
        Ok(())
    }

    /// Copy a local file into the run's artifacts
    pub fn log_artifact(&mut self, source: &Path, artifact_path: &str) -> Result<PathBuf> {
        let stored = self
            .storage
            .store_artifact(&self.record.info, source, artifact_path)?;
        self.push_artifact(artifact_path);
        Ok(stored)
    }

    /// Serialize a value as pretty JSON into the run's artifacts
    pub fn log_json_artifact<T: Serialize>(&mut self, artifact_path: &str, value: &T) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(value)?;
        let stored = self
            .storage
            .write_artifact(&self.record.info, artifact_path, &json)?;
        self.push_artifact(artifact_path);
        Ok(stored)
    }

    fn push_artifact(&mut self, artifact_path: &str) {
        if !self.record.artifacts.iter().any(|a| a == artifact_path) {
            self.record.artifacts.push(artifact_path.to_string());
        }
    }

    /// Stamp the end time and final status
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.record.info.status = status;
        self.record.info.end_time = Some(Utc::now());
        self.storage.save_run_info(&self.record.info)?;
        info!("Run {} {}", self.record.info.run_id, status);
        Ok(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(experiment_slug("Bike Sharing Experiment"), "bike-sharing-experiment");
        assert_eq!(experiment_slug("  Sales / Discount!! "), "sales-discount");
        assert_eq!(experiment_slug("***"), "");
    }

    #[test]
    fn test_tracker_basic() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::with_dir(dir.path()).unwrap();

        let exp = tracker.get_or_create_experiment("Test Experiment").unwrap();
        let mut tags = BTreeMap::new();
        tags.insert("task".to_string(), "classification".to_string());
        let mut run = tracker.start_run(&exp, "run_1", tags).unwrap();
        let run_id = run.run_id().to_string();

        run.log_param("best_C", 1.0).unwrap();
        run.log_metric("accuracy", 0.95).unwrap();
        run.log_json_artifact("model/model.json", &vec![1, 2, 3]).unwrap();
        let finished = run.finish(RunStatus::Finished).unwrap();
        assert_eq!(finished.status(), RunStatus::Finished);

        let reread = tracker.get_run(&exp.experiment_id, &run_id).unwrap();
        assert_eq!(reread.status(), RunStatus::Finished);
        assert_eq!(reread.params.get("best_C").map(String::as_str), Some("1"));
        assert_eq!(reread.metric("accuracy"), Some(0.95));
        assert_eq!(reread.artifacts, vec!["model/model.json".to_string()]);
        assert_eq!(reread.info.tags.get("task").map(String::as_str), Some("classification"));
        assert!(reread.info.end_time.is_some());
    }

    #[test]
    fn test_experiment_reused_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::with_dir(dir.path()).unwrap();

        let a = tracker.get_or_create_experiment("Same Name").unwrap();
        let b = tracker.get_or_create_experiment("Same Name").unwrap();
        assert_eq!(a.experiment_id, b.experiment_id);
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(tracker.list_experiments().unwrap().len(), 1);
    }

    #[test]
    fn test_unfinished_run_keeps_logged_values() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::with_dir(dir.path()).unwrap();
        let exp = tracker.get_or_create_experiment("crashy").unwrap();

        let mut run = tracker.start_run(&exp, "r", BTreeMap::new()).unwrap();
        run.log_metric("loss", 1.0).unwrap();
        run.log_metric("loss", 0.5).unwrap();
        let run_id = run.run_id().to_string();
        drop(run);

        let reread = tracker.get_run("crashy", &run_id).unwrap();
        assert_eq!(reread.status(), RunStatus::Running);
        assert_eq!(reread.metrics_history.len(), 2);
        assert_eq!(reread.metric("loss"), Some(0.5));
    }

    #[test]
    fn test_best_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ExperimentTracker::with_dir(dir.path()).unwrap();
        let exp = tracker.get_or_create_experiment("grid").unwrap();

        for acc in [0.8, 0.95, 0.85] {
            let mut run = tracker.start_run(&exp, "r", BTreeMap::new()).unwrap();
            run.log_metric("accuracy", acc).unwrap();
            run.finish(RunStatus::Finished).unwrap();
        }

        let exp = tracker.get_experiment("grid").unwrap().unwrap();
        assert_eq!(exp.runs.len(), 3);
        assert_eq!(exp.best_run("accuracy", true).unwrap().metric("accuracy"), Some(0.95));
        assert_eq!(exp.best_run("accuracy", false).unwrap().metric("accuracy"), Some(0.8));
        assert!(exp.best_run("missing", true).is_none());
    }
}
