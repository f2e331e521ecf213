//! Integration test: Full pipeline (load → prepare → train → track)

use bikestore_ml::error::{ErrorKind, PipelineError};
use bikestore_ml::pipeline::{Pipeline, PipelineConfig};
use bikestore_ml::tracking::{ExperimentTracker, RunStatus};
use bikestore_ml::training::{SearchConfig, TaskMode, TrainedModel};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

/// 1000 order lines, exactly 20% with `discount > 0.1`
fn create_sales_dataset(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut quantity = Vec::with_capacity(n);
    let mut list_price = Vec::with_capacity(n);
    let mut discount = Vec::with_capacity(n);

    for i in 0..n {
        let high = i % 5 == 0;
        quantity.push(if high { rng.gen_range(3..=6) } else { rng.gen_range(1..=4) } as i64);
        list_price.push(rng.gen_range(100.0..3000.0_f64).round());
        discount.push(if high { 0.2 } else if i % 2 == 0 { 0.1 } else { 0.05 });
    }

    df!(
        "quantity" => &quantity,
        "list_price" => &list_price,
        "discount" => &discount
    )
    .unwrap()
}

/// Daily rentals with `cnt = 3*temp + noise`
fn create_bike_dataset(n: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut season = Vec::with_capacity(n);
    let mut temp = Vec::with_capacity(n);
    let mut hum = Vec::with_capacity(n);
    let mut windspeed = Vec::with_capacity(n);
    let mut cnt = Vec::with_capacity(n);

    for i in 0..n {
        let t: f64 = rng.gen();
        season.push((i % 4) as i64 + 1);
        temp.push(t);
        hum.push(rng.gen::<f64>());
        windspeed.push(rng.gen::<f64>() * 0.5);
        cnt.push(3.0 * t + rng.gen_range(-0.3..0.3));
    }

    df!(
        "season" => &season,
        "temp" => &temp,
        "hum" => &hum,
        "windspeed" => &windspeed,
        "cnt" => &cnt
    )
    .unwrap()
}

fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

fn sales_config(dir: &Path, paths: Vec<PathBuf>) -> PipelineConfig {
    PipelineConfig::sales()
        .with_paths(paths)
        .with_tracking_root(dir.join("mlruns"))
        .with_artifact_dir(dir)
}

#[test]
fn test_full_classification_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "sales.csv", &mut create_sales_dataset(1000));
    let pipeline = Pipeline::new(sales_config(dir.path(), vec![path]));

    // Stratified hold-out keeps the 20% positive rate
    let dataset = pipeline.load().unwrap();
    let prepared = pipeline.prepare(&dataset).unwrap();
    assert_eq!(prepared.n_test(), 300);
    let positive_rate = prepared.y_test.sum() / prepared.n_test() as f64;
    assert!((positive_rate - 0.2).abs() <= 0.01, "test positive rate {}", positive_rate);

    let result = pipeline.execute();
    assert!(result.is_ok(), "pipeline should succeed: {:?}", result.err());
    let output = result.unwrap();

    assert_eq!(output.task, TaskMode::Classification);
    assert_eq!(output.n_train + output.n_test, 1000);
    for name in ["accuracy", "precision", "recall", "f1-score", "roc_auc"] {
        let value = output.metrics[name];
        assert!((0.0..=1.0).contains(&value), "{} = {}", name, value);
    }
    assert!(output.metrics["roc_auc"] > 0.5);

    let best_c: f64 = output.params["best_C"].parse().unwrap();
    assert!([0.1, 1.0, 10.0].contains(&best_c));

    assert!(output.artifacts.contains(&"model/model.json".to_string()));
    assert!(output.artifacts.contains(&"roc_curve.png".to_string()));
    assert!(dir.path().join("roc_curve.png").is_file());

    // Everything is readable back from the store
    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns")).unwrap();
    let run = tracker.get_run(&output.experiment_id, &output.run_id).unwrap();
    assert_eq!(run.status(), RunStatus::Finished);
    assert_eq!(run.metrics, output.metrics);
    assert_eq!(run.info.tags["task"], "classification");
    assert_eq!(run.info.tags["dataset"], "sales");

    let model_path = dir
        .path()
        .join("mlruns")
        .join(&output.experiment_id)
        .join(&output.run_id)
        .join("artifacts/model/model.json");
    let model = TrainedModel::load(model_path).unwrap();
    assert_eq!(model.task(), TaskMode::Classification);
}

#[test]
fn test_files_are_stacked() {
    let dir = tempfile::tempdir().unwrap();
    let df = create_sales_dataset(1000);
    let first = write_csv(dir.path(), "part1.csv", &mut df.slice(0, 600));
    let second = write_csv(dir.path(), "part2.csv", &mut df.slice(600, 400));

    let pipeline = Pipeline::new(sales_config(dir.path(), vec![first, second]));
    let dataset = pipeline.load().unwrap();
    assert_eq!(dataset.height(), 1000);
    assert_eq!(dataset.sources().len(), 2);
}

#[test]
fn test_regression_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "day.csv", &mut create_bike_dataset(400));

    let config = PipelineConfig::bike_sharing()
        .with_paths([path])
        .with_tracking_root(dir.path().join("mlruns"))
        .with_artifact_dir(dir.path());
    let mut pipeline = Pipeline::new(config);

    let output = pipeline.execute_task("regression").unwrap();
    assert_eq!(output.task, TaskMode::Regression);
    assert!(output.metrics["r2_score"] > 0.8, "R² = {}", output.metrics["r2_score"]);
    assert!(output.metrics.contains_key("mse"));
    assert!(!output.metrics.contains_key("accuracy"));
    assert!(output.params.is_empty());
    assert_eq!(output.artifacts, vec!["model/model.json".to_string()]);
    assert!(!dir.path().join("roc_curve.png").exists());
}

#[test]
fn test_same_seed_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "sales.csv", &mut create_sales_dataset(300));
    let pipeline = Pipeline::new(sales_config(dir.path(), vec![path]));

    let a = pipeline.execute().unwrap();
    let b = pipeline.execute().unwrap();
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.metrics, b.metrics);
    assert_eq!(a.params, b.params);

    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns")).unwrap();
    let experiment = tracker.get_experiment(&a.experiment_id).unwrap().unwrap();
    assert_eq!(experiment.name, "Sales Discount Experiment");
    assert_eq!(experiment.runs.len(), 2);
}

#[test]
fn test_invalid_task_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "sales.csv", &mut create_sales_dataset(100));
    let mut pipeline = Pipeline::new(sales_config(dir.path(), vec![path]));

    let err = pipeline.execute_task("clustering").unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTask(_)));
    assert!(err.to_string().contains("clustering"));
    assert!(!dir.path().join("mlruns").exists());
}

#[test]
fn test_missing_file_reported_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let present = write_csv(dir.path(), "sales.csv", &mut create_sales_dataset(100));
    let missing = dir.path().join("missing.csv");

    let pipeline = Pipeline::new(sales_config(dir.path(), vec![present, missing.clone()]));
    match pipeline.execute() {
        Err(PipelineError::SourceNotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected SourceNotFound, got {:?}", other.map(|o| o.run_id)),
    }
    assert!(!dir.path().join("mlruns").exists());
}

#[test]
fn test_missing_column_is_schema_violation() {
    let dir = tempfile::tempdir().unwrap();
    let mut df = create_sales_dataset(100).drop("list_price").unwrap();
    let path = write_csv(dir.path(), "sales.csv", &mut df);

    let pipeline = Pipeline::new(sales_config(dir.path(), vec![path]));
    let err = pipeline.execute().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    match err {
        PipelineError::MissingColumns(cols) => assert_eq!(cols, vec!["list_price".to_string()]),
        other => panic!("expected MissingColumns, got {}", other),
    }
    assert!(pipeline.run().is_none());
}

#[test]
fn test_training_failure_marks_run_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path(), "sales.csv", &mut create_sales_dataset(40));

    // More folds than members in any class
    let config = sales_config(dir.path(), vec![path])
        .with_search(SearchConfig::default().with_cv_folds(50));
    let pipeline = Pipeline::new(config);
    assert!(pipeline.execute().is_err());

    let tracker = ExperimentTracker::with_dir(dir.path().join("mlruns")).unwrap();
    let experiments = tracker.list_experiments().unwrap();
    assert_eq!(experiments.len(), 1);
    assert_eq!(experiments[0].runs.len(), 1);
    assert_eq!(experiments[0].runs[0].status(), RunStatus::Failed);
}
