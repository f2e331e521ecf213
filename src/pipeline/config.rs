//! Pipeline configuration

use crate::data::{DatasetPreset, TextEncoding};
use crate::error::{PipelineError, Result};
use crate::preparation::SplitConfig;
use crate::training::{SearchConfig, TaskMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything one pipeline invocation needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input files, stacked in this order
    pub dataset_paths: Vec<PathBuf>,
    /// Which schema and feature set the files follow
    pub preset: DatasetPreset,
    pub encoding: TextEncoding,
    /// Single-byte field delimiter
    pub delimiter: char,
    pub task_mode: TaskMode,
    /// Random seed for the split
    pub seed: u64,
    /// Hold-out fraction, in (0, 1)
    pub test_fraction: f64,
    /// Root of the local tracking store
    pub tracking_root: PathBuf,
    pub experiment_name: String,
    /// Where plots are written before being attached to the run
    pub artifact_dir: PathBuf,
    pub search: SearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::bike_sharing()
    }
}

impl PipelineConfig {
    /// Daily bike rentals, `cnt > 500` as the positive class
    pub fn bike_sharing() -> Self {
        Self {
            dataset_paths: vec![PathBuf::from("data/day.csv")],
            preset: DatasetPreset::BikeSharing,
            encoding: TextEncoding::Utf8,
            delimiter: ',',
            task_mode: TaskMode::Classification,
            seed: 42,
            test_fraction: 0.3,
            tracking_root: PathBuf::from("mlruns"),
            experiment_name: "Bike Sharing Experiment".to_string(),
            artifact_dir: PathBuf::from("."),
            search: SearchConfig::default(),
        }
    }

    /// Store order lines, `discount > 0.1` as the positive class
    pub fn sales() -> Self {
        Self {
            dataset_paths: vec![PathBuf::from("data/sales.csv")],
            preset: DatasetPreset::Sales,
            encoding: TextEncoding::Latin1,
            seed: 2022,
            experiment_name: "Sales Discount Experiment".to_string(),
            ..Self::bike_sharing()
        }
    }

    /// Preset defaults for a dataset kind
    pub fn for_preset(preset: DatasetPreset) -> Self {
        match preset {
            DatasetPreset::BikeSharing => Self::bike_sharing(),
            DatasetPreset::Sales => Self::sales(),
        }
    }

    /// Load from a TOML file; absent keys keep the defaults of the file's preset
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_file_with_preset(path, None)
    }

    /// Like [`from_toml_file`](Self::from_toml_file), with `preset` taking
    /// precedence over the preset named in the file.
    pub fn from_toml_file_with_preset(path: impl AsRef<Path>, preset: Option<DatasetPreset>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str_with_preset(&text, preset)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_toml_str_with_preset(text, None)
    }

    /// Preset defaults first, then every key the file sets
    pub fn from_toml_str_with_preset(text: &str, preset: Option<DatasetPreset>) -> Result<Self> {
        let mut overrides: toml::Table = toml::from_str(text)?;
        let named = overrides.remove("preset");
        let preset = match (preset, named) {
            (Some(preset), _) => preset,
            (None, Some(value)) => value.try_into::<DatasetPreset>()?,
            (None, None) => DatasetPreset::default(),
        };

        let mut merged = toml::Value::try_from(Self::for_preset(preset))
            .map_err(|e| PipelineError::ConfigError(e.to_string()))?;
        if let toml::Value::Table(base) = &mut merged {
            merge_tables(base, overrides);
        }
        Ok(merged.try_into()?)
    }

    pub fn with_paths<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.dataset_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_task(mut self, task: TaskMode) -> Self {
        self.task_mode = task;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_tracking_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tracking_root = root.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig::new(self.test_fraction, self.seed)
    }

    /// Delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "delimiter must be a single ASCII character, got '{}'",
                    self.delimiter
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_paths.is_empty() {
            return Err(PipelineError::ConfigError(
                "at least one dataset path is required".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.experiment_name.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "experiment_name must not be empty".to_string(),
            ));
        }
        self.delimiter_byte()?;
        self.search.validate()
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}
