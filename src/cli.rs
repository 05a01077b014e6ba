//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{MAX_DPI, MIN_DPI};
use crate::workbook::CellRef;
use clap::Parser;
use std::path::PathBuf;

/// wafer-yield - Wafer yield report generator
///
/// Scans a directory for Wafer_Summary workbooks, reads the wafer ID and
/// yield from each, and writes an Excel report plus a 300 DPI line chart.
///
/// Examples:
///   wafer-yield ./lot42
///   wafer-yield ./lot42 --output-dir reports --sort-by-id
///   wafer-yield ./lot42 --yield-cell E12 --json run.json
///   wafer-yield ./lot42 --dry-run
///   wafer-yield --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory to scan for workbooks (searched recursively)
    ///
    /// Falls back to the config file value, then the current directory.
    #[arg(value_name = "DIR", env = "WAFER_YIELD_DIR")]
    pub directory: Option<PathBuf>,

    /// Directory to write the report files to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// File name of the Excel report
    #[arg(long, value_name = "FILE")]
    pub excel: Option<String>,

    /// File name of the chart image
    #[arg(long, value_name = "FILE")]
    pub image: Option<String>,

    /// Also write a JSON run report with this file name
    #[arg(long, value_name = "FILE")]
    pub json: Option<String>,

    /// Substring a workbook's file name must contain
    #[arg(long, value_name = "TEXT")]
    pub marker: Option<String>,

    /// Workbook extensions to include (comma-separated)
    ///
    /// Example: --extensions xlsx,xlsm,xls
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Cell holding the wafer ID (A1 notation)
    #[arg(long, value_name = "CELL")]
    pub wafer_id_cell: Option<String>,

    /// Cell holding the yield percentage (A1 notation)
    #[arg(long, value_name = "CELL")]
    pub yield_cell: Option<String>,

    /// Sort rows by wafer ID instead of discovery order
    #[arg(long)]
    pub sort_by_id: bool,

    /// Resolution of the chart image
    #[arg(long, value_name = "DPI")]
    pub dpi: Option<u32>,

    /// Maximum number of workbooks to process
    #[arg(long, value_name = "COUNT")]
    pub max_files: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .wafer-yield.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// List the workbooks that would be processed and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .wafer-yield.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(dpi) = self.dpi {
            if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
                return Err(format!("DPI must be between {} and {}", MIN_DPI, MAX_DPI));
            }
        }

        if self.max_files == Some(0) {
            return Err("Max files must be at least 1".to_string());
        }

        for cell in [&self.wafer_id_cell, &self.yield_cell].into_iter().flatten() {
            if cell.parse::<CellRef>().is_err() {
                return Err(format!("Invalid cell reference: {}", cell));
            }
        }

        if let Some(ref dir) = self.directory {
            if !dir.exists() {
                return Err(format!("Directory does not exist: {}", dir.display()));
            }
            if !dir.is_dir() {
                return Err(format!("Path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            directory: None,
            output_dir: None,
            excel: None,
            image: None,
            json: None,
            marker: None,
            extensions: None,
            wafer_id_cell: None,
            yield_cell: None,
            sort_by_id: false,
            dpi: None,
            max_files: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_extensions_list() {
        let args = Args::parse_from(["wafer-yield", "--extensions", "xlsx,xlsm"]);
        assert_eq!(
            args.extensions,
            Some(vec!["xlsx".to_string(), "xlsm".to_string()])
        );
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_cell() {
        let mut args = make_args();
        args.yield_cell = Some("11D".to_string());
        assert!(args.validate().is_err());

        args.yield_cell = Some("D11".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_dpi_and_max_files() {
        let mut args = make_args();
        args.dpi = Some(10);
        assert!(args.validate().is_err());

        args.dpi = Some(300);
        args.max_files = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_directory() {
        let mut args = make_args();
        args.directory = Some(PathBuf::from("/definitely/not/here/wafers"));
        assert!(args.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        args.directory = Some(dir.path().to_path_buf());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
