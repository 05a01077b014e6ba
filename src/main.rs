//! wafer-yield - Wafer yield report generator
//!
//! A CLI tool that collects the wafer ID and yield from every
//! Wafer_Summary workbook in a directory and writes an Excel report
//! with a line chart, plus the chart as a standalone PNG.
//!
//! Exit codes:
//!   0 - Success (also when no records could be extracted)
//!   1 - Fatal error (configuration, input directory, output write failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod scanner;
mod workbook;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("wafer-yield v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            eprintln!("   No report files were written.");
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .wafer-yield.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to change the input directory, cell positions, and chart style.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow.
fn run_analysis(args: &Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.validate().context("Invalid configuration")?;

    // Handle --dry-run: scan files and exit
    if args.dry_run {
        return handle_dry_run(&config);
    }

    println!(
        "🔍 Scanning {} for '{}' workbooks...",
        config.input.directory.display(),
        config.input.marker
    );

    let outcome = pipeline::run(&config, !args.quiet)?;
    let report = &outcome.report;

    // Print summary
    println!("\n📊 Wafer Yield Summary:");
    println!("   Files found: {}", report.metadata.files_discovered);
    println!("   Files skipped: {}", report.metadata.files_skipped);
    for line in analysis::generate_summary_text(&report.summary).lines() {
        println!("   {}", line);
    }
    for skipped in &report.skipped {
        println!("   ⚠️  {}: {}", skipped.path.display(), skipped.reason);
    }

    println!("\n{}", "=".repeat(60));
    println!("✅ Analysis complete!");
    println!("   Excel report: {}", outcome.excel_path.display());
    println!("   Chart image:  {}", outcome.chart_path.display());
    if let Some(ref json_path) = outcome.json_path {
        println!("   JSON report:  {}", json_path.display());
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("{}", "=".repeat(60));

    Ok(())
}

/// Handle --dry-run: list the workbooks that would be read, exit.
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("\n🔍 Dry run: scanning for workbooks (nothing is read or written)...\n");

    let file_scanner = scanner::FileScanner::new(
        config.input.directory.clone(),
        scanner::ScanConfig::from(&config.input),
    );
    let files = file_scanner.scan()?;

    if files.is_empty() {
        println!("   No workbooks containing '{}' found.", config.input.marker);
    } else {
        println!("   Found {} workbooks that would be processed:\n", files.len());
        for file in &files {
            println!("     📄 {} ({} bytes)", file.relative, file.size);
        }
        println!(
            "\n   Cells: Wafer ID = {}, Yield = {}",
            config.input.wafer_id_cell, config.input.yield_cell
        );
    }

    println!("\n✅ Dry run complete. No files were written.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
