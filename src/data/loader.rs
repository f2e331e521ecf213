//! Delimited-text dataset loading

use super::schema::{is_numeric_dtype, DatasetSchema};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Character encoding of the input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1
    Latin1,
}

impl TextEncoding {
    fn decode(&self, bytes: Vec<u8>) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => bytes,
            // Every Latin-1 byte is the code point of the same value.
            TextEncoding::Latin1 => bytes
                .into_iter()
                .map(char::from)
                .collect::<String>()
                .into_bytes(),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(PipelineError::ConfigError(format!(
                "unsupported encoding '{}'",
                other
            ))),
        }
    }
}

/// A loaded table together with the files it came from
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn new(frame: DataFrame, sources: Vec<PathBuf>) -> Self {
        Self { frame, sources }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Read a column as `f64`, failing on nulls.
    pub fn column_values(&self, name: &str) -> Result<Array1<f64>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PipelineError::MissingColumns(vec![name.to_string()]))?;
        let as_f64 = column.cast(&DataType::Float64)?;

        as_f64
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    PipelineError::DataError(format!(
                        "null value in column '{}' at row {}",
                        name, row
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Extract named columns into a row-major matrix.
    pub fn columns_to_array2(&self, names: &[String]) -> Result<Array2<f64>> {
        let n_rows = self.frame.height();
        let col_data: Vec<Array1<f64>> = names
            .iter()
            .map(|name| self.column_values(name))
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn((n_rows, names.len()), |(r, c)| {
            col_data[c][r]
        }))
    }
}

/// Reads and stacks delimited-text files, then checks the schema
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    encoding: TextEncoding,
    delimiter: u8,
    schema: DatasetSchema,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(DatasetSchema::default())
    }
}

impl DatasetLoader {
    pub fn new(schema: DatasetSchema) -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            delimiter: b',',
            schema,
        }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load every path, stack rows, and validate required columns.
    ///
    /// All paths are checked for existence before the first read. A file
    /// that exists but cannot be parsed is skipped with a warning.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Dataset> {
        if paths.is_empty() {
            return Err(PipelineError::ConfigError(
                "no dataset paths configured".to_string(),
            ));
        }

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                warn!("Dataset not found at: {}", path.display());
                return Err(PipelineError::SourceNotFound(path.to_path_buf()));
            }
        }

        let mut frames: Vec<(PathBuf, DataFrame)> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match self.read_file(path) {
                Ok(df) => {
                    info!(
                        "Loaded dataset: {} ({} rows x {} cols)",
                        path.display(),
                        df.height(),
                        df.width()
                    );
                    frames.push((path.to_path_buf(), df));
                }
                Err(e) => warn!("Error loading {}: {}", path.display(), e),
            }
        }

        if frames.is_empty() {
            return Err(PipelineError::DataError(
                "none of the configured datasets could be loaded".to_string(),
            ));
        }

        let sources: Vec<PathBuf> = frames.iter().map(|(p, _)| p.clone()).collect();
        let combined = stack_frames(frames)?;
        info!(
            "Combined data shape: ({}, {})",
            combined.height(),
            combined.width()
        );

        self.schema.validate(&combined)?;

        Ok(Dataset::new(combined, sources))
    }

    /// Read a single file without schema checks
    pub fn read_file(&self, path: &Path) -> Result<DataFrame> {
        let bytes = std::fs::read(path)?;
        let decoded = self.encoding.decode(bytes);

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            // Infer dtypes from every row so a late float does not fail an int column
            .with_infer_schema_length(None)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(decoded))
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))
    }
}

/// Stack frames row-wise.
///
/// Column names must match in order. A numeric column whose dtype differs
/// between files is widened to `Float64` on both sides; any other dtype
/// difference is a schema mismatch.
fn stack_frames(frames: Vec<(PathBuf, DataFrame)>) -> Result<DataFrame> {
    let mut iter = frames.into_iter();
    let (_, mut combined) = iter
        .next()
        .ok_or_else(|| PipelineError::DataError("nothing to stack".to_string()))?;

    for (path, mut next) in iter {
        let left: Vec<String> = combined
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let right: Vec<String> = next
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        if left != right {
            return Err(PipelineError::SchemaMismatch {
                path,
                reason: format!("columns [{}] do not match [{}]", right.join(", "), left.join(", ")),
            });
        }

        for name in &left {
            let left_dtype = combined.column(name)?.dtype().clone();
            let right_dtype = next.column(name)?.dtype().clone();
            if left_dtype == right_dtype {
                continue;
            }
            if is_numeric_dtype(&left_dtype) && is_numeric_dtype(&right_dtype) {
                let widened_left = combined.column(name)?.cast(&DataType::Float64)?;
                let widened_right = next.column(name)?.cast(&DataType::Float64)?;
                combined.with_column(widened_left)?;
                next.with_column(widened_right)?;
            } else {
                return Err(PipelineError::SchemaMismatch {
                    path,
                    reason: format!(
                        "column '{}' is {} here but {} in earlier files",
                        name, right_dtype, left_dtype
                    ),
                });
            }
        }

        combined.vstack_mut(&next)?;
    }

    Ok(combined)
}
