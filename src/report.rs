//! Assembles insight text and chart images into a paginated PDF document.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{info, warn};
use printpdf::image_crate::GenericImageView;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};

use crate::chart::ChartStyle;
use crate::error::{CourseLensError, Result};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const CONTENT_WIDTH_MM: f32 = 170.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const WRAP_COLUMNS: usize = 95;
// Text on a chart-bearing page stops here; the image occupies the area below.
const CHART_AREA_TOP_MM: f32 = 170.0;

/// One metric's contribution to the report.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub insight: String,
    pub style: ChartStyle,
    pub chart_path: Option<PathBuf>,
}

fn report_err(e: impl std::fmt::Display) -> CourseLensError {
    CourseLensError::Report(e.to_string())
}

/// Build the report document: each entry starts on its own page, in
/// insertion order, with a metric header, the wrapped insight text and the
/// chart image (when its file exists; entries without a chart render
/// text-only). Text that runs past the page flows onto continuation pages,
/// with the chart anchored on the entry's first page. Writing to the same
/// path overwrites any previous document.
pub fn assemble(entries: &IndexMap<String, ReportEntry>, path: &Path) -> Result<PathBuf> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        "Course Insights Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(report_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(report_err)?;

    for (index, (metric, entry)) in entries.iter().enumerate() {
        let mut layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            doc.get_page(page).get_layer(layer)
        };

        let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
        layer.use_text(format!("Metric: {metric}"), 14.0, Mm(MARGIN_MM), Mm(y), &bold);
        y -= 2.0 * LINE_HEIGHT_MM;

        let chart = entry.chart_path.as_deref().filter(|p| p.exists());
        if let Some(chart_file) = chart {
            info!("Embedding {} chart for {metric}", entry.style.as_str());
            place_chart(&layer, chart_file)?;
        }

        // The image occupies the lower part of the entry's first page;
        // continuation pages get the full text area.
        let mut floor = if chart.is_some() { CHART_AREA_TOP_MM } else { MARGIN_MM };
        for line in wrap(&entry.insight, WRAP_COLUMNS) {
            if y < floor {
                let (page, new_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
                layer = doc.get_page(page).get_layer(new_layer);
                y = PAGE_HEIGHT_MM - MARGIN_MM;
                floor = MARGIN_MM;
            }
            if !line.is_empty() {
                layer.use_text(line, 12.0, Mm(MARGIN_MM), Mm(y), &regular);
            }
            y -= LINE_HEIGHT_MM;
        }
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(report_err)?;

    info!("Report written to: {}", path.display());
    Ok(path.to_path_buf())
}

/// Build a text-only paginated document from raw insight text (the daily
/// digest has no charts).
pub fn assemble_text(title: &str, text: &str, path: &Path) -> Result<PathBuf> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(report_err)?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    for line in wrap(text, WRAP_COLUMNS) {
        if y < MARGIN_MM {
            let (page, new_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            layer = doc.get_page(page).get_layer(new_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        if !line.is_empty() {
            layer.use_text(line, 12.0, Mm(MARGIN_MM), Mm(y), &regular);
        }
        y -= LINE_HEIGHT_MM;
    }

    let file = File::create(path)?;
    doc.save(&mut BufWriter::new(file)).map_err(report_err)?;

    info!("Report written to: {}", path.display());
    Ok(path.to_path_buf())
}

/// Scale the chart to the fixed content width and anchor it in the lower
/// half of the page.
fn place_chart(layer: &PdfLayerReference, chart: &Path) -> Result<()> {
    let decoded = match printpdf::image_crate::open(chart) {
        Ok(decoded) => decoded,
        Err(e) => {
            // A corrupt chart degrades that page to text-only.
            warn!("Skipping unreadable chart {}: {e}", chart.display());
            return Ok(());
        }
    };

    let pixel_width = decoded.dimensions().0 as f32;
    let dpi = pixel_width * 25.4 / CONTENT_WIDTH_MM;

    let image = Image::from_dynamic_image(&decoded);
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(MARGIN_MM)),
            translate_y: Some(Mm(30.0)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            // A token wider than the line gets hard-broken at the column
            // limit; the tail fragment starts the next line.
            if word.chars().count() > columns {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(columns) {
                    if chunk.len() == columns {
                        lines.push(chunk.iter().collect());
                    } else {
                        current = chunk.iter().collect();
                    }
                }
                continue;
            }
            if !current.is_empty() && current.len() + word.len() + 1 > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}
