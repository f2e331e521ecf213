//! bikestore-ml CLI Module
//!
//! Command-line interface for training runs, browsing the tracking store
//! and inspecting input files.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{DatasetLoader, DatasetPreset, DatasetSchema, TextEncoding};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutput};
use crate::tracking::{ExperimentTracker, RunRecord, RunStatus};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 100, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_failed(detail: &str) {
    println!("{} {}", bad("failed"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Finished => ok("finished"),
        RunStatus::Failed => bad("failed"),
        RunStatus::Running => accent("running"),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bikestore-ml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and track bike-store models from tabular files")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load data, train, evaluate and record a run
    Train(TrainArgs),

    /// List recorded runs
    Runs {
        /// Tracking store root
        #[arg(long, default_value = "mlruns")]
        tracking_root: PathBuf,

        /// Only this experiment (name or id)
        #[arg(short, long)]
        experiment: Option<String>,
    },

    /// Show shape and column types of a data file
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Text encoding: utf-8 or latin-1
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },
}

/// Options of `train`
#[derive(Args, Debug, Default, Clone)]
pub struct TrainArgs {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Task: classification or regression
    #[arg(short, long)]
    pub task: Option<String>,

    /// Input file (repeat for several files)
    #[arg(short, long)]
    pub data: Vec<PathBuf>,

    /// Dataset preset: bike-sharing or sales
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Tracking store root
    #[arg(long)]
    pub tracking_root: Option<PathBuf>,

    /// Directory for plots written during training
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Experiment name
    #[arg(long)]
    pub experiment: Option<String>,

    /// Split seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Hold-out fraction
    #[arg(long)]
    pub test_fraction: Option<f64>,
}

impl TrainArgs {
    /// File or preset defaults, then flag overrides. The task is left to
    /// the caller so it is parsed by the pipeline.
    pub fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let preset = self
            .preset
            .as_deref()
            .map(str::parse::<DatasetPreset>)
            .transpose()?;

        let mut config = match (&self.config, preset) {
            (Some(path), preset) => PipelineConfig::from_toml_file_with_preset(path, preset)?,
            (None, Some(preset)) => PipelineConfig::for_preset(preset),
            (None, None) => PipelineConfig::default(),
        };

        if !self.data.is_empty() {
            config.dataset_paths = self.data.clone();
        }
        if let Some(root) = &self.tracking_root {
            config.tracking_root = root.clone();
        }
        if let Some(dir) = &self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        if let Some(name) = &self.experiment {
            config.experiment_name = name.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.resolve_config()?;
    let mut pipeline = Pipeline::new(config);

    step_run("Running pipeline");
    let start = Instant::now();
    let result = match args.task.as_deref() {
        Some(task) => pipeline.execute_task(task),
        None => pipeline.execute(),
    };

    let output = match result {
        Ok(output) => {
            step_done(&format!("{:.2?}", start.elapsed()));
            output
        }
        Err(e) => {
            step_failed(&format!("{:.2?}", start.elapsed()));
            return Err(e.into());
        }
    };

    print_output(pipeline.config(), &output);
    Ok(())
}

fn print_output(config: &PipelineConfig, output: &PipelineOutput) {
    println!();
    line_box_top();
    line_box(&kv("Task      ", output.task.as_str()));
    line_box(&kv("Experiment", &output.experiment_id));
    line_box(&kv("Run       ", &output.run_id));
    line_box(&kv("Split     ", &format!("{} train / {} test", output.n_train, output.n_test)));
    for (key, value) in &output.params {
        line_box(&kv(&format!("{:<10}", key), value));
    }
    for (name, value) in &output.metrics {
        line_box(&kv(&format!("{:<10}", name), &format!("{:.4}", value)));
    }
    line_box_bottom();

    println!();
    println!("  {:<12} {}", muted("Store"), config.tracking_root.display());
    for artifact in &output.artifacts {
        println!("  {:<12} {}", muted("Artifact"), artifact);
    }
    println!();
}

pub fn cmd_runs(tracking_root: &Path, experiment: Option<&str>) -> anyhow::Result<()> {
    section("Runs");

    if !tracking_root.exists() {
        println!("  {}", dim(&format!("no tracking store at {}", tracking_root.display())));
        println!();
        return Ok(());
    }

    let tracker = ExperimentTracker::with_dir(tracking_root)?;
    let experiments = tracker
        .list_experiments()?
        .into_iter()
        .filter(|e| {
            experiment.map_or(true, |wanted| {
                e.experiment_id == wanted || e.name == wanted || e.experiment_id == crate::tracking::experiment_slug(wanted)
            })
        })
        .collect::<Vec<_>>();

    if experiments.is_empty() {
        println!("  {}", dim("no experiments recorded"));
        println!();
        return Ok(());
    }

    for exp in &experiments {
        println!();
        println!("  {} {}", exp.name.white().bold(), dim(&format!("({})", exp.experiment_id)));
        for run in &exp.runs {
            print_run(run);
        }
        if exp.runs.is_empty() {
            println!("    {}", dim("no runs"));
        }
    }

    println!();
    Ok(())
}

fn print_run(run: &RunRecord) {
    let metrics = run
        .metrics
        .iter()
        .map(|(k, v)| format!("{}={:.4}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "    {}  {:<9} {}  {}",
        run.run_id().truecolor(140, 140, 140),
        status_label(run.status()),
        run.info.start_time.format("%Y-%m-%d %H:%M:%S"),
        metrics
    );
}

pub fn cmd_info(data_path: &Path, encoding: &str) -> anyhow::Result<()> {
    section("Data Info");

    let encoding: TextEncoding = encoding.parse()?;
    let dataset = DatasetLoader::new(DatasetSchema::default())
        .with_encoding(encoding)
        .load(&[data_path])?;
    let df = dataset.frame();

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6}",
            col.name().as_str(),
            format!("{}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TaskMode;

    #[test]
    fn test_cli_parses_train_flags() {
        let cli = Cli::try_parse_from([
            "bikestore-ml", "train", "--task", "regression", "-d", "a.csv", "-d", "b.csv", "--seed", "7",
        ])
        .unwrap();

        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.task.as_deref(), Some("regression"));
                assert_eq!(args.data.len(), 2);
                assert_eq!(args.seed, Some(7));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_flags_override_preset() {
        let args = TrainArgs {
            preset: Some("sales".to_string()),
            data: vec![PathBuf::from("orders.csv")],
            seed: Some(1),
            ..Default::default()
        };
        let config = args.resolve_config().unwrap();

        assert_eq!(config.preset, DatasetPreset::Sales);
        assert_eq!(config.encoding, TextEncoding::Latin1);
        assert_eq!(config.dataset_paths, vec![PathBuf::from("orders.csv")]);
        assert_eq!(config.seed, 1);
        assert_eq!(config.task_mode, TaskMode::Classification);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "seed = 11\ntest_fraction = 0.2\n").unwrap();

        let args = TrainArgs {
            config: Some(path),
            test_fraction: Some(0.25),
            ..Default::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.seed, 11);
        assert_eq!(config.test_fraction, 0.25);
    }

    #[test]
    fn test_preset_flag_with_config_file_uses_preset_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "test_fraction = 0.2\n").unwrap();

        let args = TrainArgs {
            config: Some(path),
            preset: Some("sales".to_string()),
            ..Default::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.preset, DatasetPreset::Sales);
        assert_eq!(config.encoding, TextEncoding::Latin1);
        assert_eq!(config.seed, 2022);
        assert_eq!(config.experiment_name, "Sales Discount Experiment");
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let args = TrainArgs {
            preset: Some("weather".to_string()),
            ..Default::default()
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
