//! The yield pipeline: discover, extract, aggregate, render, write.

use crate::analysis::{build_table, AggregateOptions};
use crate::config::Config;
use crate::error::YieldError;
use crate::models::{Report, ReportMetadata, YieldSummary};
use crate::report::{self, Artifact};
use crate::scanner::{FileScanner, ScanConfig};
use crate::workbook::CellMapping;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: Report,
    pub excel_path: PathBuf,
    pub chart_path: PathBuf,
    pub json_path: Option<PathBuf>,
}

/// Run the whole pipeline once.
///
/// Per-file problems are logged and recorded in the report. Only invalid
/// configuration, a missing input directory, or a failure to produce the
/// outputs is returned as an error.
pub fn run(config: &Config, show_progress: bool) -> Result<PipelineOutcome> {
    let start_time = Instant::now();

    config.validate().context("Invalid configuration")?;

    let mapping = CellMapping::from_config(&config.input, &config.processing)
        .context("Invalid cell mapping in configuration")?;

    // Step 1: Discover
    let scanner = FileScanner::new(
        config.input.directory.clone(),
        ScanConfig::from(&config.input),
    );
    let files = scanner.scan()?;

    if files.is_empty() {
        warn!(
            "{}; writing an empty report",
            YieldError::NoInputFilesFound {
                dir: config.input.directory.clone(),
                marker: config.input.marker.clone(),
            }
        );
    }

    // Steps 2 and 3: Extract and aggregate
    let options = AggregateOptions {
        sort_by_id: config.processing.sort_by_id,
        show_progress,
    };
    let aggregation = build_table(&files, &mapping, &options);
    let summary = YieldSummary::from_table(&aggregation.table);

    // Step 4: Render
    info!("Rendering chart for {} wafers", aggregation.table.len());
    let chart = report::render_chart(&aggregation.table, &config.chart)?;
    info!(
        "Chart rendered at {}x{} pixels ({} DPI)",
        chart.width, chart.height, chart.dpi
    );

    // Step 5: Write
    let excel_path = config.excel_path();
    let chart_path = config.chart_path();
    let json_path = config.json_path();

    let workbook = report::build_workbook(
        &aggregation.table,
        &chart,
        &config.output,
        &config.chart,
        &excel_path,
    )?;

    let yield_report = Report {
        metadata: ReportMetadata {
            input_directory: config.input.directory.clone(),
            marker: config.input.marker.clone(),
            generated_at: Utc::now(),
            files_discovered: files.len(),
            files_skipped: aggregation.skipped.len(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        records: aggregation.table,
        skipped: aggregation.skipped,
        summary,
    };

    let mut artifacts = vec![
        Artifact::new(&excel_path, workbook),
        Artifact::new(&chart_path, chart.png),
    ];
    if let Some(ref path) = json_path {
        let json = report::generate_json_report(&yield_report)?;
        artifacts.push(Artifact::new(path, json.into_bytes()));
    }

    report::write_artifacts(&artifacts)?;

    Ok(PipelineOutcome {
        report: yield_report,
        excel_path,
        chart_path,
        json_path,
    })
}
