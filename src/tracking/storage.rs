//! Storage Backend for Experiment Tracking
//!
//! Experiments and runs live in plain directories. Run metadata is a JSON
//! document rewritten on start and finish; params and metrics are JSON-lines
//! files that are only ever appended to.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::tracker::{Experiment, RunInfo};
use crate::error::{PipelineError, Result};

/// Append-only stream of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStream {
    Params,
    Metrics,
}

impl RecordStream {
    fn file_name(&self) -> &'static str {
        match self {
            RecordStream::Params => "params.jsonl",
            RecordStream::Metrics => "metrics.jsonl",
        }
    }
}

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    /// Write an experiment's metadata
    fn save_experiment(&self, experiment: &Experiment) -> Result<()>;

    /// Experiment metadata without runs, if it exists
    fn load_experiment(&self, experiment_id: &str) -> Result<Option<Experiment>>;

    fn list_experiment_ids(&self) -> Result<Vec<String>>;

    /// Write (or overwrite) a run's metadata
    fn save_run_info(&self, info: &RunInfo) -> Result<()>;

    fn load_run_info(&self, experiment_id: &str, run_id: &str) -> Result<RunInfo>;

    fn list_run_ids(&self, experiment_id: &str) -> Result<Vec<String>>;

    /// Append one JSON line to a run stream
    fn append_record(&self, info: &RunInfo, stream: RecordStream, line: &str) -> Result<()>;

    /// Every line of a run stream, in write order
    fn read_records(&self, experiment_id: &str, run_id: &str, stream: RecordStream) -> Result<Vec<String>>;

    /// Copy `source` into the run's artifact tree under `artifact_path`
    fn store_artifact(&self, info: &RunInfo, source: &Path, artifact_path: &str) -> Result<PathBuf>;

    /// Write bytes into the run's artifact tree under `artifact_path`
    fn write_artifact(&self, info: &RunInfo, artifact_path: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Artifact paths relative to the run's artifact root, sorted
    fn list_artifacts(&self, experiment_id: &str, run_id: &str) -> Result<Vec<String>>;
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            PipelineError::TrackingError(format!(
                "cannot create tracking root {}: {}",
                base_dir.display(),
                e
            ))
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.base_dir.join(experiment_id)
    }

    fn run_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment_id).join(run_id)
    }

    pub fn artifact_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.run_dir(experiment_id, run_id).join("artifacts")
    }

    /// Resolve `artifact_path` under the artifact root, rejecting escapes
    fn artifact_target(&self, info: &RunInfo, artifact_path: &str) -> Result<PathBuf> {
        let relative = Path::new(artifact_path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if artifact_path.is_empty() || escapes {
            return Err(PipelineError::ArtifactError(format!(
                "artifact path must be relative and stay inside the run: '{}'",
                artifact_path
            )));
        }

        let target = self.artifact_dir(&info.experiment_id, &info.run_id).join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(target)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Names of the sub-directories of `dir` that contain `meta.json`
fn child_dirs_with_meta(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join("meta.json").is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

impl StorageBackend for LocalStorage {
    fn save_experiment(&self, experiment: &Experiment) -> Result<()> {
        write_json(
            &self.experiment_dir(&experiment.experiment_id).join("meta.json"),
            experiment,
        )
    }

    fn load_experiment(&self, experiment_id: &str) -> Result<Option<Experiment>> {
        let path = self.experiment_dir(experiment_id).join("meta.json");
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn list_experiment_ids(&self) -> Result<Vec<String>> {
        child_dirs_with_meta(&self.base_dir)
    }

    fn save_run_info(&self, info: &RunInfo) -> Result<()> {
        fs::create_dir_all(self.artifact_dir(&info.experiment_id, &info.run_id))?;
        write_json(
            &self.run_dir(&info.experiment_id, &info.run_id).join("meta.json"),
            info,
        )
    }

    fn load_run_info(&self, experiment_id: &str, run_id: &str) -> Result<RunInfo> {
        let path = self.run_dir(experiment_id, run_id).join("meta.json");
        if !path.is_file() {
            return Err(PipelineError::TrackingError(format!(
                "run '{}' not found in experiment '{}'",
                run_id, experiment_id
            )));
        }
        read_json(&path)
    }

    fn list_run_ids(&self, experiment_id: &str) -> Result<Vec<String>> {
        child_dirs_with_meta(&self.experiment_dir(experiment_id))
    }

    fn append_record(&self, info: &RunInfo, stream: RecordStream, line: &str) -> Result<()> {
        let path = self
            .run_dir(&info.experiment_id, &info.run_id)
            .join(stream.file_name());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn read_records(&self, experiment_id: &str, run_id: &str, stream: RecordStream) -> Result<Vec<String>> {
        let path = self.run_dir(experiment_id, run_id).join(stream.file_name());
        if !path.is_file() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn store_artifact(&self, info: &RunInfo, source: &Path, artifact_path: &str) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(PipelineError::ArtifactError(format!(
                "artifact source {} is not a file",
                source.display()
            )));
        }
        let target = self.artifact_target(info, artifact_path)?;
        fs::copy(source, &target)?;
        Ok(target)
    }

    fn write_artifact(&self, info: &RunInfo, artifact_path: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.artifact_target(info, artifact_path)?;
        fs::write(&target, bytes)?;
        Ok(target)
    }

    fn list_artifacts(&self, experiment_id: &str, run_id: &str) -> Result<Vec<String>> {
        let root = self.artifact_dir(experiment_id, run_id);
        let mut files = Vec::new();
        if root.is_dir() {
            collect_files(&root, &root, &mut files)?;
        }
        files.sort();
        Ok(files)
    }
}
