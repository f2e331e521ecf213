//! Dataset loading and schema validation
//!
//! - [`DatasetLoader`] reads delimited-text files in a configured encoding,
//!   stacks them row-wise and checks the required columns once.
//! - [`DatasetSchema`] and [`DatasetPreset`] describe which columns a
//!   dataset must carry and which of them feed the model.

mod loader;
mod schema;

pub use loader::{Dataset, DatasetLoader, TextEncoding};
pub use schema::{is_numeric_dtype, ColumnKind, ColumnSpec, DatasetPreset, DatasetSchema, FeatureSpec};
