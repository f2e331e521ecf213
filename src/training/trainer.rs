//! Fit, evaluate and record one model

use super::config::{SearchConfig, TaskMode};
use super::grid_search::GridSearch;
use super::linear_models::LinearRegression;
use super::metrics::{roc_curve, ClassificationReport, RegressionReport};
use super::models::TrainedModel;
use crate::error::Result;
use crate::preparation::PreparedData;
use crate::tracking::ActiveRun;
use crate::visualization::{save_roc_curve, RocPlotConfig};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Artifact path of the serialized model inside a run
pub const MODEL_ARTIFACT: &str = "model/model.json";
/// File name of the ROC plot, both on disk and inside a run
pub const ROC_ARTIFACT: &str = "roc_curve.png";

/// Trains the model for a task and writes params, metrics and artifacts
/// into the active run as it goes.
#[derive(Debug, Clone)]
pub struct Trainer {
    search: SearchConfig,
    artifact_dir: PathBuf,
    plot: RocPlotConfig,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl Trainer {
    pub fn new(search: SearchConfig) -> Self {
        Self {
            search,
            artifact_dir: PathBuf::from("."),
            plot: RocPlotConfig::default(),
        }
    }

    /// Directory the ROC plot is written to before it is copied into the run
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn train(&self, data: &PreparedData, task: TaskMode, run: &mut ActiveRun) -> Result<TrainedModel> {
        let start = Instant::now();
        let model = match task {
            TaskMode::Classification => self.train_classifier(data, run)?,
            TaskMode::Regression => self.train_regressor(data, run)?,
        };

        run.log_json_artifact(MODEL_ARTIFACT, &model)?;
        info!(
            "Training finished in {:.2}s ({} on {} samples)",
            start.elapsed().as_secs_f64(),
            task,
            data.n_train()
        );
        Ok(model)
    }

    fn train_classifier(&self, data: &PreparedData, run: &mut ActiveRun) -> Result<TrainedModel> {
        let search = GridSearch::new(self.search.clone()).fit(&data.x_train, &data.y_train)?;
        run.log_param("best_C", search.best_c)?;

        let model = search.best_estimator;
        let y_pred = model.predict(&data.x_test)?;
        let y_score = model.predict_proba(&data.x_test)?;

        let report = ClassificationReport::compute(&data.y_test, &y_pred)?;
        for (name, value) in report.as_metrics() {
            run.log_metric(name, value)?;
        }
        info!(
            "Accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
            report.accuracy, report.precision, report.recall, report.f1_score
        );
        info!("Confusion matrix [[tn fp] [fn tp]]: {}", report.confusion);

        let roc = roc_curve(&data.y_test, &y_score)?;
        let auc = roc.auc();
        run.log_metric("roc_auc", auc)?;
        info!("ROC AUC {:.4}", auc);

        let plot_path = self.artifact_dir.join(ROC_ARTIFACT);
        save_roc_curve(&roc, &plot_path, self.plot)?;
        run.log_artifact(&plot_path, ROC_ARTIFACT)?;

        Ok(TrainedModel::Logistic(model))
    }

    fn train_regressor(&self, data: &PreparedData, run: &mut ActiveRun) -> Result<TrainedModel> {
        let mut model = LinearRegression::new();
        model.fit(&data.x_train, &data.y_train)?;

        let y_pred = model.predict(&data.x_test)?;
        let report = RegressionReport::compute(&data.y_test, &y_pred)?;
        for (name, value) in report.as_metrics() {
            run.log_metric(name, value)?;
        }
        info!("MSE {:.4}, R² {:.4}", report.mse, report.r2);

        Ok(TrainedModel::Linear(model))
    }
}
