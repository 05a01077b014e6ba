//! Data models for the yield report.
//!
//! This module contains the records extracted from wafer summary workbooks
//! and the structures the report is assembled from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One wafer's identifier and yield, read from a single workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaferRecord {
    wafer_id: String,
    yield_percent: f64,
    source: PathBuf,
}

impl WaferRecord {
    /// Creates a record, rejecting non-finite yields.
    pub fn new(wafer_id: impl Into<String>, yield_percent: f64, source: impl Into<PathBuf>) -> Option<Self> {
        if !yield_percent.is_finite() {
            return None;
        }

        Some(Self {
            wafer_id: wafer_id.into(),
            yield_percent,
            source: source.into(),
        })
    }

    pub fn wafer_id(&self) -> &str {
        &self.wafer_id
    }

    pub fn yield_percent(&self) -> f64 {
        self.yield_percent
    }

    /// Workbook the record was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Records in the order they were extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YieldTable {
    records: Vec<WaferRecord>,
}

impl YieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: WaferRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WaferRecord> {
        self.records.iter()
    }

    /// Stable sort by wafer identifier; duplicates keep their relative order.
    pub fn sort_by_id(&mut self) {
        self.records.sort_by(|a, b| a.wafer_id.cmp(&b.wafer_id));
    }

    /// Lowest and highest yield, `None` for an empty table.
    pub fn yield_bounds(&self) -> Option<(f64, f64)> {
        self.records.iter().map(|r| r.yield_percent).fold(None, |acc, y| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    }
}

impl<'a> IntoIterator for &'a YieldTable {
    type Item = &'a WaferRecord;
    type IntoIter = std::slice::Iter<'a, WaferRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<WaferRecord> for YieldTable {
    fn from_iter<I: IntoIterator<Item = WaferRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// A discovered workbook that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Descriptive statistics over the table's yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation; needs at least two records.
    pub std_dev: Option<f64>,
}

impl YieldSummary {
    /// Computes the summary for a table.
    pub fn from_table(table: &YieldTable) -> Self {
        let count = table.len();
        if count == 0 {
            return Self::default();
        }

        let values: Vec<f64> = table.iter().map(WaferRecord::yield_percent).collect();
        let mean = values.iter().sum::<f64>() / count as f64;
        let (min, max) = table.yield_bounds().unwrap_or((mean, mean));

        let std_dev = if count > 1 {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(variance.sqrt())
        } else {
            None
        };

        Self {
            count,
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
            std_dev,
        }
    }
}

/// Metadata about a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Directory that was scanned.
    pub input_directory: PathBuf,
    /// Marker the file names had to contain.
    pub marker: String,
    /// Date and time of the run.
    pub generated_at: DateTime<Utc>,
    /// Number of workbooks discovered.
    pub files_discovered: usize,
    /// Number of workbooks skipped.
    pub files_skipped: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// Everything a run produced, as written to the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub records: YieldTable,
    pub skipped: Vec<SkippedFile>,
    pub summary: YieldSummary,
}
