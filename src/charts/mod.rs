pub mod style;

use crate::config::{ChartSpec, Config};
use crate::history::History;
use anyhow::{Context, Result, anyhow};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CHART_SIZE: (u32, u32) = (1000, 600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChartSkip {
    #[error("column is not in the history table")]
    MissingColumn,
    #[error("column has no values")]
    NoValues,
    #[error("chart could not be rendered")]
    RenderFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartOutcome {
    Rendered { column: String, path: PathBuf },
    Skipped { column: String, reason: ChartSkip },
}

impl ChartOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered { .. })
    }
}

/// Renders every configured chart whose column has data. Skips and render
/// failures are reported per chart and never abort the batch.
pub fn render_all(config: &Config, history: &History) -> Vec<ChartOutcome> {
    config
        .charts
        .iter()
        .map(|chart| {
            let path = config.chart_path(chart);
            let outcome = render_chart(history, chart, &path);

            match &outcome {
                ChartOutcome::Rendered { column, path } => {
                    info!(column = %column, path = %path.display(), "chart rendered");
                }
                ChartOutcome::Skipped { column, reason } => {
                    info!(column = %column, reason = %reason, "chart skipped");
                }
            }

            outcome
        })
        .collect()
}

pub fn render_chart(history: &History, chart: &ChartSpec, path: &Path) -> ChartOutcome {
    let skipped = |reason| ChartOutcome::Skipped {
        column: chart.column.clone(),
        reason,
    };

    if !history.has_column(&chart.column) {
        return skipped(ChartSkip::MissingColumn);
    }

    let series = history.series(&chart.column);
    if series.is_empty() {
        return skipped(ChartSkip::NoValues);
    }

    match draw_line_chart(&series, chart, path) {
        Ok(()) => ChartOutcome::Rendered {
            column: chart.column.clone(),
            path: path.to_path_buf(),
        },
        Err(error) => {
            warn!(column = %chart.column, error = %error, "failed to render chart");
            skipped(ChartSkip::RenderFailed)
        }
    }
}

fn draw_line_chart(
    series: &[(chrono::NaiveDate, i64)],
    chart: &ChartSpec,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create chart directory: {}", parent.display()))?;
    }

    let (first, points) = style::day_offsets(series).context("Empty chart series")?;
    let last_offset = points.last().map(|(offset, _)| *offset).unwrap_or_default();
    let x_range = 0..last_offset.max(1);
    let y_range = style::padded_range(points.iter().map(|(_, value)| *value));
    let color = style::parse_color(chart.color.as_deref());
    let label_count = points.len().clamp(2, 12);
    let date_formatter = |offset: &i64| style::date_label(first, *offset);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut plot = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(110)
        .y_label_area_size(90)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_error)?;

    plot.configure_mesh()
        .x_desc("Date")
        .y_desc(chart.column.as_str())
        .x_labels(label_count)
        .x_label_formatter(&date_formatter)
        .x_label_style(
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .draw()
        .map_err(plot_error)?;

    plot.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
        .map_err(plot_error)?;
    plot.draw_series(
        points
            .iter()
            .map(|point| Circle::new(*point, 3, color.filled())),
    )
    .map_err(plot_error)?;

    root.present()
        .map_err(plot_error)
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;

    Ok(())
}

fn plot_error<E: std::fmt::Display>(error: E) -> anyhow::Error {
    anyhow!("{error}")
}
