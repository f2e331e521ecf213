//! Experiment Tracking Module
//!
//! Local, append-only run records: experiments group runs, runs carry
//! params, metrics, tags and artifacts.

mod storage;
mod tracker;

pub use storage::{LocalStorage, RecordStream, StorageBackend};
pub use tracker::{
    experiment_slug, ActiveRun, Experiment, ExperimentTracker, Metric, Param, RunInfo, RunRecord,
    RunStatus,
};
