//! Record aggregation and statistics.
//!
//! This module reads every discovered workbook in order, collects the
//! records that could be extracted and keeps a note of the ones that could not.

use crate::models::{SkippedFile, YieldSummary, YieldTable};
use crate::scanner::ScannedFile;
use crate::workbook::{read_wafer_record, CellMapping};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Options for building the table.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Sort by wafer ID once all files are read.
    pub sort_by_id: bool,
    /// Whether to show a progress bar.
    pub show_progress: bool,
}

/// Outcome of reading all discovered workbooks.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub table: YieldTable,
    pub skipped: Vec<SkippedFile>,
}

impl Aggregation {
    /// Number of files that were looked at.
    pub fn files_processed(&self) -> usize {
        self.table.len() + self.skipped.len()
    }
}

/// Extract a record from each file, in the given order.
///
/// Files that cannot be read are logged and skipped; they never abort the run
/// and never contribute a partial row. Duplicate wafer IDs are all kept.
pub fn build_table(
    files: &[ScannedFile],
    mapping: &CellMapping,
    options: &AggregateOptions,
) -> Aggregation {
    let progress_bar = if options.show_progress && !files.is_empty() {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut aggregation = Aggregation {
        table: YieldTable::new(),
        skipped: Vec::new(),
    };

    for file in files {
        if let Some(ref pb) = progress_bar {
            pb.set_message(file.relative.clone());
        }

        match read_wafer_record(&file.path, mapping) {
            Ok(record) => {
                debug!("{} -> {}", record.source().display(), record.wafer_id());
                aggregation.table.push(record);
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.relative, e);
                aggregation.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    if options.sort_by_id {
        aggregation.table.sort_by_id();
    }

    info!(
        "Processed {} files: {} records, {} skipped",
        aggregation.files_processed(),
        aggregation.table.len(),
        aggregation.skipped.len()
    );

    aggregation
}

/// Generate a text summary of yield statistics.
pub fn generate_summary_text(summary: &YieldSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Wafers: {}", summary.count));

    let stats = [
        ("Average Yield", summary.mean),
        ("Max Yield", summary.max),
        ("Min Yield", summary.min),
        ("Std Deviation", summary.std_dev),
    ];
    for (label, value) in stats {
        match value {
            Some(v) => lines.push(format!("{}: {:.2}%", label, v)),
            None => lines.push(format!("{}: n/a", label)),
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_summary(dir: &Path, name: &str, wafer_id: &str, yield_value: Option<f64>) -> ScannedFile {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(3, 1, wafer_id).unwrap();
        if let Some(y) = yield_value {
            sheet.write_number(10, 3, y).unwrap();
        }

        let path = dir.join(name);
        workbook.save(&path).unwrap();
        ScannedFile {
            path,
            relative: name.to_string(),
            size: 0,
        }
    }

    fn ids(aggregation: &Aggregation) -> Vec<&str> {
        aggregation.table.iter().map(|r| r.wafer_id()).collect()
    }

    #[test]
    fn test_keeps_discovery_order() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_summary(dir.path(), "Wafer_Summary_a.xlsx", "W9", Some(91.0)),
            write_summary(dir.path(), "Wafer_Summary_b.xlsx", "W1", Some(95.0)),
            write_summary(dir.path(), "Wafer_Summary_c.xlsx", "W5", Some(93.0)),
        ];

        let aggregation = build_table(&files, &CellMapping::default(), &AggregateOptions::default());
        assert_eq!(ids(&aggregation), vec!["W9", "W1", "W5"]);
        assert!(aggregation.skipped.is_empty());
    }

    #[test]
    fn test_sort_by_id_option() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_summary(dir.path(), "Wafer_Summary_a.xlsx", "W9", Some(91.0)),
            write_summary(dir.path(), "Wafer_Summary_b.xlsx", "W1", Some(95.0)),
        ];

        let options = AggregateOptions {
            sort_by_id: true,
            ..AggregateOptions::default()
        };
        let aggregation = build_table(&files, &CellMapping::default(), &options);
        assert_eq!(ids(&aggregation), vec!["W1", "W9"]);
    }

    #[test]
    fn test_bad_file_is_skipped_and_others_kept() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("Wafer_Summary_2.xlsx");
        std::fs::write(&broken, b"garbage").unwrap();

        let files = vec![
            write_summary(dir.path(), "Wafer_Summary_1.xlsx", "W1", Some(95.2)),
            ScannedFile {
                path: broken.clone(),
                relative: "Wafer_Summary_2.xlsx".to_string(),
                size: 7,
            },
            write_summary(dir.path(), "Wafer_Summary_3.xlsx", "W3", None),
            write_summary(dir.path(), "Wafer_Summary_4.xlsx", "W4", Some(97.8)),
        ];

        let aggregation = build_table(&files, &CellMapping::default(), &AggregateOptions::default());

        assert_eq!(ids(&aggregation), vec!["W1", "W4"]);
        assert_eq!(aggregation.skipped.len(), 2);
        assert_eq!(aggregation.skipped[0].path, broken);
        assert!(aggregation.skipped[1].reason.contains("D11"));
        assert!(aggregation.table.len() <= files.len());
        assert_eq!(aggregation.files_processed(), files.len());
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write_summary(dir.path(), "Wafer_Summary_1.xlsx", "W1", Some(95.0)),
            write_summary(dir.path(), "Wafer_Summary_1_retest.xlsx", "W1", Some(96.0)),
        ];

        let aggregation = build_table(&files, &CellMapping::default(), &AggregateOptions::default());
        assert_eq!(aggregation.table.len(), 2);
    }

    #[test]
    fn test_no_files() {
        let aggregation = build_table(&[], &CellMapping::default(), &AggregateOptions::default());
        assert!(aggregation.table.is_empty());
        assert_eq!(aggregation.files_processed(), 0);
    }

    #[test]
    fn test_generate_summary_text() {
        let summary = YieldSummary {
            count: 3,
            mean: Some(94.0),
            min: Some(90.0),
            max: Some(98.0),
            std_dev: Some(4.0),
        };

        let text = generate_summary_text(&summary);
        assert!(text.contains("Total Wafers: 3"));
        assert!(text.contains("Average Yield: 94.00%"));
        assert!(text.contains("Std Deviation: 4.00%"));

        let empty = generate_summary_text(&YieldSummary::default());
        assert!(empty.contains("Average Yield: n/a"));
    }
}
