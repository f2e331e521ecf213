//! Evaluation metrics

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

fn check_lengths(y_true: &Array1<f64>, y_other: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_other.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_other.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::DataError("cannot score zero samples".to_string()));
    }
    Ok(())
}

/// Binary confusion counts, positive class = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();

        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }

        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[[{} {}] [{} {}]]", self.tn, self.fp, self.fn_, self.tp)
    }
}

/// Label-based classification metrics on a held-out set.
///
/// ROC AUC needs scores rather than labels and comes from [`roc_curve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Precision (positive class)
    pub precision: f64,
    /// Recall (positive class)
    pub recall: f64,
    pub f1_score: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        let confusion = ConfusionMatrix::from_predictions(y_true, y_pred);
        let ConfusionMatrix { tp, fp, tn, fn_ } = confusion;

        let accuracy = (tp + tn) as f64 / confusion.total() as f64;
        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1_score,
            confusion,
        })
    }

    /// `(name, value)` pairs under the names the tracker records
    pub fn as_metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1-score", self.f1_score),
        ]
    }
}

/// Regression metrics on a held-out set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    pub mse: f64,
    pub r2: f64,
}

impl RegressionReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        Ok(Self {
            mse: mean_squared_error(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        })
    }

    pub fn as_metrics(&self) -> Vec<(&'static str, f64)> {
        vec![("mse", self.mse), ("r2_score", self.r2)]
    }
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Receiver operating characteristic points, starting at (0, 0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Decision threshold for each point; the first is +inf
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Area under the curve by the trapezoidal rule
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// ROC curve over every distinct score, highest threshold first.
pub fn roc_curve(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<RocCurve> {
    check_lengths(y_true, y_score)?;
    if y_score.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::ComputationError(
            "scores must be finite to compute a ROC curve".to_string(),
        ));
    }

    let positives = y_true.iter().filter(|&&t| t > 0.5).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::ComputationError(
            "only one class present in y_true; ROC AUC is not defined".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0usize, 0usize);

    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] > 0.5 {
            tp += 1;
        } else {
            fp += 1;
        }
        // Emit a point only after the last sample sharing this score
        let last_of_score = order
            .get(pos + 1)
            .map_or(true, |&next| y_score[next] != y_score[idx]);
        if last_of_score {
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(y_score[idx]);
        }
    }

    Ok(RocCurve { fpr, tpr, thresholds })
}

/// Fraction of predictions within 0.5 of the label
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_report() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let y_score = array![0.9, 0.2, 0.8, 0.4, 0.1, 0.7, 0.6, 0.3];

        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();

        assert_eq!(report.confusion, ConfusionMatrix { tp: 3, fp: 1, tn: 3, fn_: 1 });
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert!((report.precision - 0.75).abs() < 1e-12);
        assert!((report.recall - 0.75).abs() < 1e-12);
        assert!((report.f1_score - 0.75).abs() < 1e-12);
        assert_eq!(report.as_metrics().len(), 4);

        // One negative (0.6) outranks one positive (0.4)
        let roc = roc_curve(&y_true, &y_score).unwrap();
        assert!((roc.auc() - 15.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_precision_is_zero() {
        let y_true = array![1.0, 0.0, 1.0, 0.0];
        let y_pred = array![0.0, 0.0, 0.0, 0.0];
        let y_score = array![0.4, 0.3, 0.45, 0.1];

        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1_score, 0.0);
        assert_eq!(roc_curve(&y_true, &y_score).unwrap().auc(), 1.0);
    }

    #[test]
    fn test_roc_curve_with_ties() {
        let y_true = array![0.0, 1.0, 0.0, 1.0];
        let y_score = array![0.5, 0.5, 0.2, 0.9];

        let roc = roc_curve(&y_true, &y_score).unwrap();
        assert_eq!(roc.fpr, vec![0.0, 0.0, 0.5, 1.0]);
        assert_eq!(roc.tpr, vec![0.0, 0.5, 1.0, 1.0]);
        assert!(roc.thresholds[0].is_infinite());
        assert!((roc.auc() - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_single_class_fails() {
        let y_true = array![1.0, 1.0, 1.0];
        let y_score = array![0.2, 0.5, 0.9];
        assert!(roc_curve(&y_true, &y_score).is_err());
    }

    #[test]
    fn test_regression_report() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let report = RegressionReport::compute(&y_true, &y_pred).unwrap();
        assert!((report.mse - 0.006).abs() < 1e-12);
        assert!(report.r2 > 0.99);
        assert_eq!(report.as_metrics()[1].0, "r2_score");
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(&y, &y), 1.0);
        assert_eq!(r2_score(&y, &array![3.0, 3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(RegressionReport::compute(&array![1.0, 2.0], &array![1.0]).is_err());
    }
}
