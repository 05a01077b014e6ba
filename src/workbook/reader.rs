//! Reading wafer data out of summary workbooks.
//!
//! Each workbook contributes at most one [`WaferRecord`]: the identifier and
//! yield cells of its first worksheet. Anything unreadable is reported as an
//! error for the caller to log and skip.

use super::cell::CellRef;
use crate::config::{InputConfig, ProcessingConfig};
use crate::error::{Result, YieldError};
use crate::models::WaferRecord;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, warn};

/// Where the two values live and how the yield is interpreted.
#[derive(Debug, Clone)]
pub struct CellMapping {
    pub wafer_id: CellRef,
    pub yield_cell: CellRef,
    /// Multiply numeric yields <= 1.0 by 100.
    pub scale_fractions: bool,
    /// Range outside which a yield is kept but warned about.
    pub expected_range: Option<(f64, f64)>,
}

impl Default for CellMapping {
    fn default() -> Self {
        Self {
            wafer_id: CellRef::new(3, 1),
            yield_cell: CellRef::new(10, 3),
            scale_fractions: false,
            expected_range: Some((0.0, 100.0)),
        }
    }
}

impl CellMapping {
    /// Builds the mapping from configuration, parsing the A1 references once.
    pub fn from_config(input: &InputConfig, processing: &ProcessingConfig) -> Result<Self> {
        Ok(Self {
            wafer_id: input.wafer_id_cell.parse()?,
            yield_cell: input.yield_cell.parse()?,
            scale_fractions: processing.scale_fractions,
            expected_range: processing
                .warn_out_of_range
                .then_some((processing.min_yield, processing.max_yield)),
        })
    }
}

/// Opens a workbook and extracts its wafer record.
///
/// Cells are read from the first worksheet, not the sheet that was active
/// when the workbook was saved.
pub fn read_wafer_record(path: &Path, mapping: &CellMapping) -> Result<WaferRecord> {
    let mut workbook = open_workbook_auto(path).map_err(|e| YieldError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(YieldError::FileRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
        None => {
            return Err(YieldError::FileRead {
                path: path.to_path_buf(),
                message: "workbook has no worksheets".to_string(),
            })
        }
    };

    let id_cell = range.get_value(mapping.wafer_id.position());
    let yield_cell = range.get_value(mapping.yield_cell.position());

    let wafer_id = wafer_id_from_cell(id_cell).map_err(|reason| YieldError::CellExtraction {
        path: path.to_path_buf(),
        cell: format!("Wafer ID ({})", mapping.wafer_id),
        reason,
    })?;

    let yield_percent = yield_from_cell(yield_cell, mapping.scale_fractions).map_err(|reason| {
        YieldError::CellExtraction {
            path: path.to_path_buf(),
            cell: format!("Yield ({})", mapping.yield_cell),
            reason,
        }
    })?;

    if let Some((min, max)) = mapping.expected_range {
        if !(min..=max).contains(&yield_percent) {
            warn!(
                "Yield {:.2}% out of range [{}, {}] in {}",
                yield_percent,
                min,
                max,
                path.display()
            );
        }
    }

    debug!(
        "Extracted {}: ID={}, Yield={:.2}%",
        path.display(),
        wafer_id,
        yield_percent
    );

    WaferRecord::new(wafer_id, yield_percent, path).ok_or_else(|| YieldError::CellExtraction {
        path: path.to_path_buf(),
        cell: format!("Yield ({})", mapping.yield_cell),
        reason: "value is not finite".to_string(),
    })
}

/// Converts the identifier cell into a non-empty string.
pub fn wafer_id_from_cell(cell: Option<&Data>) -> std::result::Result<String, String> {
    let id = match cell {
        None | Some(Data::Empty) => return Err("cell is empty".to_string()),
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => {
            s.trim().to_string()
        }
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Error(e)) => return Err(format!("cell holds an error value ({})", e)),
        Some(other) => other.to_string(),
    };

    if id.is_empty() {
        return Err("cell is blank".to_string());
    }
    Ok(id)
}

/// Converts the yield cell into a finite percentage.
///
/// Text like `"98.5%"` is accepted. Numeric cells are taken as already being
/// on the 0-100 scale unless `scale_fractions` is set.
pub fn yield_from_cell(cell: Option<&Data>, scale_fractions: bool) -> std::result::Result<f64, String> {
    let value = match cell {
        None | Some(Data::Empty) => return Err("cell is empty".to_string()),
        Some(Data::Float(f)) => scale(*f, scale_fractions),
        Some(Data::Int(i)) => scale(*i as f64, scale_fractions),
        Some(Data::String(s)) => parse_percent_text(s)?,
        Some(Data::Error(e)) => return Err(format!("cell holds an error value ({})", e)),
        Some(other) => return Err(format!("expected a number, found '{}'", other)),
    };

    if !value.is_finite() {
        return Err("value is not finite".to_string());
    }
    Ok(value)
}

fn scale(value: f64, scale_fractions: bool) -> f64 {
    if scale_fractions && value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

fn parse_percent_text(text: &str) -> std::result::Result<f64, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("cell is blank".to_string());
    }

    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number
        .parse::<f64>()
        .map_err(|_| format!("expected a number, found '{}'", text))
}
