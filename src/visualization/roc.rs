//! ROC curve chart

use crate::error::{PipelineError, Result};
use crate::training::RocCurve;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::fmt::Display;
use std::path::Path;
use std::sync::OnceLock;

static SANS_SERIF: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static FONT_READY: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Number of dashes on the chance diagonal
const DIAGONAL_DASHES: usize = 25;

/// Canvas geometry for the ROC plot
#[derive(Debug, Clone, Copy)]
pub struct RocPlotConfig {
    pub width: u32,
    pub height: u32,
    /// Blank border around the chart, in pixels
    pub margin: u32,
    /// Curve stroke width, in pixels
    pub line_width: u32,
}

impl Default for RocPlotConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            margin: 20,
            line_width: 2,
        }
    }
}

fn plot_error(err: impl Display) -> PipelineError {
    PipelineError::ArtifactError(format!("ROC plot: {}", err))
}

fn ensure_font() -> Result<()> {
    FONT_READY
        .get_or_init(|| {
            register_font("sans-serif", FontStyle::Normal, SANS_SERIF)
                .map_err(|_| "bundled sans-serif font could not be parsed".to_string())
        })
        .clone()
        .map_err(PipelineError::ArtifactError)
}

/// Draw the curve, labelled with its AUC, against the dashed chance diagonal.
pub fn render_roc_curve(curve: &RocCurve, config: RocPlotConfig) -> Result<RgbImage> {
    ensure_font()?;

    let (width, height) = (config.width, config.height);
    let line_width = config.line_width;
    let mut buf = vec![255u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Receiver Operating Characteristic", ("sans-serif", 22))
            .margin(config.margin)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(0f64..1f64, 0f64..1.05f64)
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("False Positive Rate")
            .y_desc("True Positive Rate")
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series((0..DIAGONAL_DASHES).map(|i| {
                let from = i as f64 / DIAGONAL_DASHES as f64;
                let to = (i as f64 + 0.5) / DIAGONAL_DASHES as f64;
                PathElement::new(vec![(from, from), (to, to)], RED.stroke_width(1))
            }))
            .map_err(plot_error)?;

        let points = curve.fpr.iter().copied().zip(curve.tpr.iter().copied());
        chart
            .draw_series(LineSeries::new(points, BLUE.stroke_width(line_width)))
            .map_err(plot_error)?
            .label(format!("ROC curve (area = {:.2})", curve.auc()))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(line_width)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(plot_error)?;

        root.present().map_err(plot_error)?;
    }

    RgbImage::from_raw(width, height, buf)
        .ok_or_else(|| plot_error("pixel buffer does not match the canvas size"))
}

/// Render and write a PNG
pub fn save_roc_curve(curve: &RocCurve, path: &Path, config: RocPlotConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    render_roc_curve(curve, config)?.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
