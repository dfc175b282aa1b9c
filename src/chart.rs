//! Draws computed metric views to PNG files with plotters.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::info;
use plotters::prelude::*;

use crate::dataset::Dataset;
use crate::error::{CourseLensError, Result};
use crate::metrics::{Metric, MetricView, Series};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

const PALETTE: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, YELLOW];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChartStyle {
    Bar,
    Line,
    Pie,
    Table,
}

impl ChartStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Table => "table",
        }
    }
}

/// Deterministic chart filename for a metric: spaces become underscores,
/// regeneration overwrites the previous file.
pub fn chart_filename(metric_name: &str) -> String {
    format!("chart_{}.png", metric_name.replace(' ', "_"))
}

/// Compute and draw one metric in the requested style, writing the PNG into
/// `out_dir` and returning its path.
pub fn render(metric: Metric, style: ChartStyle, dataset: &Dataset, out_dir: &Path) -> Result<PathBuf> {
    let name = metric.name();
    let path = out_dir.join(chart_filename(name));

    match metric.compute(dataset) {
        // The trend always draws as a dual line plot with a legend; the
        // requested style is deliberately not applied to this metric.
        MetricView::Dual { registered, completed } => {
            draw_dual_line(&path, name, &registered, &completed)?;
        }
        MetricView::Single(series) => {
            if series.values.is_empty() {
                return Err(CourseLensError::Render(format!("{name}: no data to plot")));
            }
            match style {
                ChartStyle::Bar => draw_bar(&path, name, &series)?,
                ChartStyle::Line => draw_line(&path, name, &series)?,
                ChartStyle::Pie => draw_pie(&path, name, &series)?,
                ChartStyle::Table => draw_table(&path, name, &series)?,
            }
        }
    }

    info!("Chart written to: {}", path.display());
    Ok(path)
}

fn render_err(name: &str, e: impl std::fmt::Display) -> CourseLensError {
    CourseLensError::Render(format!("{name}: {e}"))
}

fn value_bounds(values: &[i64]) -> (f64, f64) {
    let min = values.iter().min().copied().unwrap_or(0).min(0);
    let max = values.iter().max().copied().unwrap_or(0).max(1);
    (min as f64, max as f64 + 1.0)
}

fn label_at(labels: &[String], x: f64) -> String {
    let index = x.round();
    if index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

fn draw_bar(path: &Path, name: &str, series: &Series) -> Result<()> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(name, e))?;

    let n = series.values.len();
    let (y_min, y_max) = value_bounds(&series.values);

    let mut chart = ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(40)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)
        .map_err(|e| render_err(name, e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| label_at(&series.labels, *x))
        .draw()
        .map_err(|e| render_err(name, e))?;

    chart
        .draw_series(series.values.iter().enumerate().map(|(i, &v)| {
            Rectangle::new([(i as f64 - 0.4, 0.0), (i as f64 + 0.4, v as f64)], BLUE.filled())
        }))
        .map_err(|e| render_err(name, e))?;

    root.present().map_err(|e| render_err(name, e))?;
    Ok(())
}

fn draw_line(path: &Path, name: &str, series: &Series) -> Result<()> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(name, e))?;

    let n = series.values.len();
    let (y_min, y_max) = value_bounds(&series.values);

    let mut chart = ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(40)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)
        .map_err(|e| render_err(name, e))?;

    chart
        .configure_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| label_at(&series.labels, *x))
        .draw()
        .map_err(|e| render_err(name, e))?;

    chart
        .draw_series(LineSeries::new(
            series.values.iter().enumerate().map(|(i, &v)| (i as f64, v as f64)),
            &BLUE,
        ))
        .map_err(|e| render_err(name, e))?;

    root.present().map_err(|e| render_err(name, e))?;
    Ok(())
}

fn draw_pie(path: &Path, name: &str, series: &Series) -> Result<()> {
    // Zero-valued slices draw as empty wedges; negatives have no angle and
    // an all-zero series has no total to split.
    if series.values.iter().any(|&v| v < 0) {
        return Err(CourseLensError::Render(format!(
            "{name}: pie charts cannot represent negative values"
        )));
    }
    if series.values.iter().sum::<i64>() == 0 {
        return Err(CourseLensError::Render(format!(
            "{name}: pie charts need at least one positive value"
        )));
    }

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(name, e))?;
    let root = root
        .titled(name, ("sans-serif", 30).into_font())
        .map_err(|e| render_err(name, e))?;

    let center = (WIDTH as i32 / 2, HEIGHT as i32 / 2);
    let radius = 200.0;
    let sizes: Vec<f64> = series.values.iter().map(|&v| v as f64).collect();
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &series.labels);
    pie.label_style(("sans-serif", 18).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 16).into_font().color(&BLACK));

    root.draw(&pie).map_err(|e| render_err(name, e))?;
    root.present().map_err(|e| render_err(name, e))?;
    Ok(())
}

/// A literal two-column table render: metric value on the left, count on
/// the right.
fn draw_table(path: &Path, name: &str, series: &Series) -> Result<()> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(name, e))?;

    let header = ("sans-serif", 22).into_font();
    let body = ("sans-serif", 18).into_font();

    root.draw(&Text::new(format!("{name} | Value"), (40, 40), header))
        .map_err(|e| render_err(name, e))?;

    for (i, (label, value)) in series.labels.iter().zip(&series.values).enumerate() {
        let y = 80 + i as i32 * 26;
        root.draw(&Text::new(format!("{label} | {value}"), (40, y), body.clone()))
            .map_err(|e| render_err(name, e))?;
    }

    root.present().map_err(|e| render_err(name, e))?;
    Ok(())
}

fn draw_dual_line(path: &Path, name: &str, registered: &Series, completed: &Series) -> Result<()> {
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(name, e))?;

    let n = registered.labels.len().max(1);
    let max = registered
        .values
        .iter()
        .chain(&completed.values)
        .max()
        .copied()
        .unwrap_or(0)
        .max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(40)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..(max as f64 + 1.0))
        .map_err(|e| render_err(name, e))?;

    chart
        .configure_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| label_at(&registered.labels, *x))
        .draw()
        .map_err(|e| render_err(name, e))?;

    chart
        .draw_series(LineSeries::new(
            registered.values.iter().enumerate().map(|(i, &v)| (i as f64, v as f64)),
            &BLUE,
        ))
        .map_err(|e| render_err(name, e))?
        .label("Registered")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            completed.values.iter().enumerate().map(|(i, &v)| (i as f64, v as f64)),
            &RED,
        ))
        .map_err(|e| render_err(name, e))?
        .label("Completed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| render_err(name, e))?;

    root.present().map_err(|e| render_err(name, e))?;
    Ok(())
}
