//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.wafer-yield.toml` files.

use crate::workbook::CellRef;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".wafer-yield.toml";

/// Accepted chart resolution range.
pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 1200;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where and what to scan.
    #[serde(default)]
    pub input: InputConfig,

    /// Output artifacts.
    #[serde(default)]
    pub output: OutputConfig,

    /// Chart appearance.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Table post-processing.
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Input discovery and cell mapping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Root directory to scan.
    #[serde(default = "default_input_directory")]
    pub directory: PathBuf,

    /// Substring a file name must contain.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Workbook extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names that are never entered.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Cell holding the wafer identifier (A1 notation).
    #[serde(default = "default_wafer_id_cell")]
    pub wafer_id_cell: String,

    /// Cell holding the yield percentage (A1 notation).
    #[serde(default = "default_yield_cell")]
    pub yield_cell: String,

    /// Maximum number of workbooks to process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            directory: default_input_directory(),
            marker: default_marker(),
            extensions: default_extensions(),
            excludes: default_excludes(),
            wafer_id_cell: default_wafer_id_cell(),
            yield_cell: default_yield_cell(),
            max_files: None,
        }
    }
}

fn default_input_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_marker() -> String {
    "Wafer_Summary".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["xlsx", "xls"].into_iter().map(String::from).collect()
}

fn default_excludes() -> Vec<String> {
    vec![".git", "target", "node_modules", "__pycache__", ".venv", "venv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_wafer_id_cell() -> String {
    "B4".to_string()
}

fn default_yield_cell() -> String {
    "D11".to_string()
}

/// Output artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the artifacts are written to.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Workbook file name.
    #[serde(default = "default_excel_filename")]
    pub excel_filename: String,

    /// Chart image file name.
    #[serde(default = "default_chart_filename")]
    pub chart_filename: String,

    /// Name of the sheet holding the table.
    #[serde(default = "default_data_sheet_name")]
    pub data_sheet_name: String,

    /// Name of the sheet holding the chart image.
    #[serde(default = "default_chart_sheet_name")]
    pub chart_sheet_name: String,

    /// Also place a native Excel line chart next to the table.
    #[serde(default = "default_true")]
    pub native_chart: bool,

    /// Optional JSON run report file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_report: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            excel_filename: default_excel_filename(),
            chart_filename: default_chart_filename(),
            data_sheet_name: default_data_sheet_name(),
            chart_sheet_name: default_chart_sheet_name(),
            native_chart: true,
            json_report: None,
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_excel_filename() -> String {
    "wafer_yield_report.xlsx".to_string()
}

fn default_chart_filename() -> String {
    "wafer_yield_chart.png".to_string()
}

fn default_data_sheet_name() -> String {
    "Yield Data".to_string()
}

fn default_chart_sheet_name() -> String {
    "Yield Chart".to_string()
}

fn default_true() -> bool {
    true
}

/// Chart appearance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_x_label")]
    pub x_label: String,

    #[serde(default = "default_y_label")]
    pub y_label: String,

    /// Figure width in inches.
    #[serde(default = "default_width_inches")]
    pub width_inches: f64,

    /// Figure height in inches.
    #[serde(default = "default_height_inches")]
    pub height_inches: f64,

    /// Raster resolution of the exported image.
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Margin added below the lowest and above the highest yield.
    #[serde(default = "default_y_axis_padding")]
    pub y_axis_padding: f64,

    #[serde(default = "default_line_color")]
    pub line_color: String,

    #[serde(default = "default_marker_color")]
    pub marker_color: String,

    /// Plot area fill.
    #[serde(default = "default_background_color")]
    pub background_color: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            width_inches: default_width_inches(),
            height_inches: default_height_inches(),
            dpi: default_dpi(),
            y_axis_padding: default_y_axis_padding(),
            line_color: default_line_color(),
            marker_color: default_marker_color(),
            background_color: default_background_color(),
        }
    }
}

fn default_title() -> String {
    "Wafer Yield Analysis".to_string()
}

fn default_x_label() -> String {
    "Wafer ID".to_string()
}

fn default_y_label() -> String {
    "Yield (%)".to_string()
}

fn default_width_inches() -> f64 {
    14.0
}

fn default_height_inches() -> f64 {
    8.0
}

fn default_dpi() -> u32 {
    300
}

fn default_y_axis_padding() -> f64 {
    5.0
}

fn default_line_color() -> String {
    "#2E86AB".to_string()
}

fn default_marker_color() -> String {
    "#A23B72".to_string()
}

fn default_background_color() -> String {
    "#F8F9FA".to_string()
}

/// Table post-processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Sort rows by wafer identifier instead of discovery order.
    #[serde(default)]
    pub sort_by_id: bool,

    /// Treat numeric yields <= 1.0 as fractions and multiply by 100.
    #[serde(default)]
    pub scale_fractions: bool,

    /// Warn about yields outside `[min_yield, max_yield]`.
    #[serde(default = "default_true")]
    pub warn_out_of_range: bool,

    #[serde(default = "default_min_yield")]
    pub min_yield: f64,

    #[serde(default = "default_max_yield")]
    pub max_yield: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            sort_by_id: false,
            scale_fractions: false,
            warn_out_of_range: true,
            min_yield: default_min_yield(),
            max_yield: default_max_yield(),
        }
    }
}

fn default_min_yield() -> f64 {
    0.0
}

fn default_max_yield() -> f64 {
    100.0
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.directory {
            self.input.directory = dir.clone();
        }
        if let Some(ref marker) = args.marker {
            self.input.marker = marker.clone();
        }
        if let Some(ref extensions) = args.extensions {
            self.input.extensions = extensions.clone();
        }
        if let Some(ref cell) = args.wafer_id_cell {
            self.input.wafer_id_cell = cell.clone();
        }
        if let Some(ref cell) = args.yield_cell {
            self.input.yield_cell = cell.clone();
        }
        if let Some(max) = args.max_files {
            self.input.max_files = Some(max);
        }

        if let Some(ref dir) = args.output_dir {
            self.output.directory = dir.clone();
        }
        if let Some(ref name) = args.excel {
            self.output.excel_filename = name.clone();
        }
        if let Some(ref name) = args.image {
            self.output.chart_filename = name.clone();
        }
        if let Some(ref name) = args.json {
            self.output.json_report = Some(name.clone());
        }

        if let Some(dpi) = args.dpi {
            self.chart.dpi = dpi;
        }

        // Flags only ever switch sorting on
        if args.sort_by_id {
            self.processing.sort_by_id = true;
        }
    }

    /// Check values that may come from the config file.
    ///
    /// Applies the same limits as the command-line checks, so a bad file
    /// fails before any workbook is read.
    pub fn validate(&self) -> Result<()> {
        if self.input.max_files == Some(0) {
            bail!("input.max_files must be at least 1");
        }

        for (key, cell) in [
            ("input.wafer_id_cell", &self.input.wafer_id_cell),
            ("input.yield_cell", &self.input.yield_cell),
        ] {
            if cell.parse::<CellRef>().is_err() {
                bail!("{} is not a valid cell reference: {}", key, cell);
            }
        }

        if !(MIN_DPI..=MAX_DPI).contains(&self.chart.dpi) {
            bail!(
                "chart.dpi must be between {} and {} (got {})",
                MIN_DPI,
                MAX_DPI,
                self.chart.dpi
            );
        }

        for (key, value) in [
            ("chart.width_inches", self.chart.width_inches),
            ("chart.height_inches", self.chart.height_inches),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{} must be a positive number (got {})", key, value);
            }
        }

        if !self.chart.y_axis_padding.is_finite() || self.chart.y_axis_padding < 0.0 {
            bail!(
                "chart.y_axis_padding must not be negative (got {})",
                self.chart.y_axis_padding
            );
        }

        if self.processing.min_yield > self.processing.max_yield {
            bail!(
                "processing.min_yield ({}) is above processing.max_yield ({})",
                self.processing.min_yield,
                self.processing.max_yield
            );
        }

        Ok(())
    }

    /// Path of the workbook artifact.
    pub fn excel_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.excel_filename)
    }

    /// Path of the image artifact.
    pub fn chart_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.chart_filename)
    }

    /// Path of the JSON report, if one was requested.
    pub fn json_path(&self) -> Option<PathBuf> {
        self.output
            .json_report
            .as_ref()
            .map(|name| self.output.directory.join(name))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.marker, "Wafer_Summary");
        assert_eq!(config.input.wafer_id_cell, "B4");
        assert_eq!(config.input.yield_cell, "D11");
        assert_eq!(config.input.extensions, vec!["xlsx", "xls"]);
        assert_eq!(config.output.excel_filename, "wafer_yield_report.xlsx");
        assert_eq!(config.output.chart_filename, "wafer_yield_chart.png");
        assert_eq!(config.chart.dpi, 300);
        assert!(!config.processing.sort_by_id);
        assert!(!config.processing.scale_fractions);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[input]
directory = "/data/wafers"
yield_cell = "E12"

[output]
excel_filename = "lot42.xlsx"
native_chart = false

[chart]
dpi = 150

[processing]
sort_by_id = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.directory, PathBuf::from("/data/wafers"));
        assert_eq!(config.input.yield_cell, "E12");
        assert_eq!(config.input.wafer_id_cell, "B4");
        assert_eq!(config.output.excel_filename, "lot42.xlsx");
        assert!(!config.output.native_chart);
        assert_eq!(config.chart.dpi, 150);
        assert_eq!(config.chart.title, "Wafer Yield Analysis");
        assert!(config.processing.sort_by_id);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.chart.dpi = 150;

        let args = Args::parse_from([
            "wafer-yield",
            "/data/lot7",
            "--output-dir",
            "out",
            "--yield-cell",
            "E12",
            "--sort-by-id",
            "--json",
            "run.json",
        ]);
        config.merge_with_args(&args);

        assert_eq!(config.input.directory, PathBuf::from("/data/lot7"));
        assert_eq!(config.input.yield_cell, "E12");
        assert_eq!(config.input.wafer_id_cell, "B4");
        assert_eq!(config.excel_path(), PathBuf::from("out/wafer_yield_report.xlsx"));
        assert_eq!(config.json_path(), Some(PathBuf::from("out/run.json")));
        // not passed on the command line, so the file value stays
        assert_eq!(config.chart.dpi, 150);
        assert!(config.processing.sort_by_id);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_file_values() {
        let toml_content = r#"
[input]
max_files = 0
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("input.max_files"));

        let mut config = Config::default();
        config.chart.dpi = 0;
        assert!(config.validate().unwrap_err().to_string().contains("chart.dpi"));
        config.chart.dpi = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chart.width_inches = 0.0;
        assert!(config.validate().unwrap_err().to_string().contains("chart.width_inches"));

        let mut config = Config::default();
        config.chart.height_inches = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chart.y_axis_padding = -1.0;
        assert!(config.validate().is_err());
        config.chart.y_axis_padding = 0.0;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.input.yield_cell = "11D".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("input.yield_cell"));

        let mut config = Config::default();
        config.processing.min_yield = 90.0;
        config.processing.max_yield = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[chart]"));
        assert!(toml_str.contains("[processing]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.input.yield_cell, "D11");
    }
}
