//! Typed dataset schemas and the two dataset presets

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Semantic type a required column must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Integer or floating point dtype
    Numeric,
    /// Any dtype; only presence is checked
    Any,
}

/// A required column and its expected kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Any,
        }
    }
}

/// Required columns of a dataset, checked once after loading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub columns: Vec<ColumnSpec>,
}

impl DatasetSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    /// Names of the required columns, in declaration order
    pub fn required_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Check presence of every required column, then its kind.
    ///
    /// All absent columns are reported together.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|spec| !present.iter().any(|p| p == &spec.name))
            .map(|spec| spec.name.clone())
            .collect();

        if !missing.is_empty() {
            return Err(PipelineError::MissingColumns(missing));
        }

        for spec in &self.columns {
            if spec.kind != ColumnKind::Numeric {
                continue;
            }
            let dtype = df.column(&spec.name)?.dtype().clone();
            if !is_numeric_dtype(&dtype) {
                return Err(PipelineError::ColumnType {
                    column: spec.name.clone(),
                    expected: "numeric".to_string(),
                    actual: dtype.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Integer and float dtypes
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Which target column and features a task reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Feature columns, in model input order
    pub features: Vec<String>,
    /// Raw target column
    pub target: String,
    /// Classification cutoff: label is 1 when `target > threshold`
    pub threshold: f64,
    /// Name given to the derived binary label
    pub label_name: String,
}

/// The datasets this pipeline knows how to train on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetPreset {
    /// Daily bike rentals (`day.csv`)
    #[default]
    BikeSharing,
    /// Star-schema sales extracts with order discounts
    Sales,
}

impl DatasetPreset {
    pub fn schema(&self) -> DatasetSchema {
        match self {
            DatasetPreset::BikeSharing => DatasetSchema::new(vec![
                ColumnSpec::numeric("season"),
                ColumnSpec::numeric("temp"),
                ColumnSpec::numeric("hum"),
                ColumnSpec::numeric("windspeed"),
                ColumnSpec::numeric("cnt"),
            ]),
            DatasetPreset::Sales => DatasetSchema::new(vec![
                ColumnSpec::numeric("discount"),
                ColumnSpec::numeric("quantity"),
                ColumnSpec::numeric("list_price"),
            ]),
        }
    }

    pub fn feature_spec(&self) -> FeatureSpec {
        match self {
            DatasetPreset::BikeSharing => FeatureSpec {
                features: vec![
                    "season".to_string(),
                    "temp".to_string(),
                    "hum".to_string(),
                    "windspeed".to_string(),
                ],
                target: "cnt".to_string(),
                threshold: 500.0,
                label_name: "high_rentals".to_string(),
            },
            DatasetPreset::Sales => FeatureSpec {
                features: vec!["quantity".to_string(), "list_price".to_string()],
                target: "discount".to_string(),
                threshold: 0.1,
                label_name: "high_discount".to_string(),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetPreset::BikeSharing => "bike-sharing",
            DatasetPreset::Sales => "sales",
        }
    }
}

impl std::str::FromStr for DatasetPreset {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bike-sharing" | "bike_sharing" | "bike" => Ok(DatasetPreset::BikeSharing),
            "sales" => Ok(DatasetPreset::Sales),
            other => Err(PipelineError::ConfigError(format!(
                "unknown dataset preset '{}'",
                other
            ))),
        }
    }
}
