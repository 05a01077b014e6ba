//! Report output.
//!
//! This module assembles the Excel workbook and writes all artifacts of a
//! run. Artifacts are staged as temporary files next to their targets and
//! only renamed into place once every one of them was written, so a failed
//! run leaves no partial outputs behind.

use super::chart::{y_axis_range, RenderedChart};
use crate::config::{ChartConfig, OutputConfig};
use crate::error::{Result, YieldError};
use crate::models::{Report, YieldTable};
use rust_xlsxwriter::{
    Chart, ChartDataLabel, ChartType, Format, FormatAlign, FormatBorder, Image, Workbook,
    XlsxError,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Column headers of the data sheet.
pub const HEADERS: [&str; 2] = ["Wafer_ID", "Yield"];

/// Column widths are capped at this many characters.
const MAX_COLUMN_WIDTH: usize = 50;

/// Displayed size of the chart image on the chart sheet, in pixels.
const CHART_IMAGE_SIZE: (u32, u32) = (1000, 571);

/// A file to be written as part of the report.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Build the report workbook in memory.
///
/// The data sheet holds a header row and one row per record in table order.
/// The chart sheet holds the rendered chart image.
pub fn build_workbook(
    table: &YieldTable,
    chart: &RenderedChart,
    output: &OutputConfig,
    chart_config: &ChartConfig,
    path: &Path,
) -> Result<Vec<u8>> {
    populate_workbook(table, chart, output, chart_config).map_err(|e| YieldError::OutputWrite {
        path: path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })
}

fn populate_workbook(
    table: &YieldTable,
    chart: &RenderedChart,
    output: &OutputConfig,
    chart_config: &ChartConfig,
) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_background_color(0x2E86AB)
        .set_font_color(0xFFFFFF)
        .set_border(FormatBorder::Thin);
    let number = Format::new().set_num_format("0.00");

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(output.data_sheet_name.as_str())?;

        for (col, title) in HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        let mut id_width = HEADERS[0].len();
        let mut yield_width = HEADERS[1].len();

        for (index, record) in table.iter().enumerate() {
            let row = index as u32 + 1;
            sheet.write_string(row, 0, record.wafer_id())?;
            sheet.write_number_with_format(row, 1, record.yield_percent(), &number)?;

            id_width = id_width.max(record.wafer_id().chars().count());
            yield_width = yield_width.max(format!("{:.2}", record.yield_percent()).len());
        }

        sheet.set_column_width(0, ((id_width + 2).min(MAX_COLUMN_WIDTH)) as f64)?;
        sheet.set_column_width(1, ((yield_width + 2).min(MAX_COLUMN_WIDTH)) as f64)?;
        sheet.set_freeze_panes(1, 0)?;

        if output.native_chart && !table.is_empty() {
            let last_row = table.len() as u32;
            let sheet_name = output.data_sheet_name.as_str();
            let (y_min, y_max) = y_axis_range(table, chart_config.y_axis_padding);

            let mut native = Chart::new(ChartType::Line);
            native
                .add_series()
                .set_categories((sheet_name, 1, 0, last_row, 0))
                .set_values((sheet_name, 1, 1, last_row, 1))
                .set_name("Wafer Yield")
                .set_data_label(ChartDataLabel::new().show_value());
            native.title().set_name(chart_config.title.as_str());
            native.x_axis().set_name(chart_config.x_label.as_str());
            native
                .y_axis()
                .set_name(chart_config.y_label.as_str())
                .set_min(y_min)
                .set_max(y_max);

            sheet.insert_chart(1, 3, &native)?;
        }
    }

    {
        let image = Image::new_from_buffer(&chart.png)?.set_scale_to_size(
            CHART_IMAGE_SIZE.0,
            CHART_IMAGE_SIZE.1,
            true,
        );

        let sheet = workbook.add_worksheet();
        sheet.set_name(output.chart_sheet_name.as_str())?;
        sheet.insert_image(0, 0, &image)?;
    }

    workbook.save_to_buffer()
}

/// Generate a JSON run report.
pub fn generate_json_report(report: &Report) -> anyhow::Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write all artifacts, or none of them.
///
/// Files already at the target paths are moved aside before being replaced
/// and put back if a later artifact fails, so a failed run keeps the
/// previous report.
pub fn write_artifacts(artifacts: &[Artifact]) -> Result<()> {
    let mut staged = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let output_error = |source: std::io::Error| YieldError::OutputWrite {
            path: artifact.path.clone(),
            source,
        };

        let dir = match artifact.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(output_error)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".wafer-yield-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(output_error)?;
        temp.write_all(&artifact.bytes).map_err(output_error)?;
        temp.as_file().sync_all().map_err(output_error)?;

        debug!("Staged {} ({} bytes)", artifact.path.display(), artifact.bytes.len());
        staged.push((temp, &artifact.path));
    }

    let mut persisted: Vec<&PathBuf> = Vec::with_capacity(staged.len());
    let mut backups: Vec<(TempPath, &PathBuf)> = Vec::new();

    // Remaining staged files and backups are deleted when dropped.
    for (temp, path) in staged {
        let result = move_aside(path)
            .and_then(|backup| {
                if let Some(backup) = backup {
                    backups.push((backup, path));
                }
                temp.persist(path).map_err(|e| e.error)
            });

        if let Err(source) = result {
            for done in &persisted {
                let _ = std::fs::remove_file(done);
            }
            for (backup, original) in &backups {
                if let Err(e) = std::fs::rename(backup, original) {
                    warn!("Could not restore {}: {}", original.display(), e);
                }
            }
            return Err(YieldError::OutputWrite {
                path: path.clone(),
                source,
            });
        }

        info!("Wrote {}", path.display());
        persisted.push(path);
    }

    Ok(())
}

/// Rename an existing regular file at `path` to a temporary name beside it.
fn move_aside(path: &Path) -> std::io::Result<Option<TempPath>> {
    if !path.is_file() {
        return Ok(None);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let backup = tempfile::Builder::new()
        .prefix(".wafer-yield-previous-")
        .tempfile_in(dir)?
        .into_temp_path();
    std::fs::rename(path, &backup)?;
    debug!("Moved previous {} aside", path.display());
    Ok(Some(backup))
}
