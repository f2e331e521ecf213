//! Evaluation plots written as raster images

pub mod roc;
pub use roc::{render_roc_curve, save_roc_curve, RocPlotConfig};
