//! Error types for the yield pipeline.
//!
//! Per-file variants (`FileRead`, `CellExtraction`) are caught where they
//! happen and turned into skipped files. `NoInputFilesFound` is only logged.
//! Everything else ends the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the discovery, extraction, rendering and output stages.
#[derive(Debug, Error)]
pub enum YieldError {
    /// No workbook in the input directory matched the marker.
    #[error("no files containing '{marker}' found in {}", dir.display())]
    NoInputFilesFound { dir: PathBuf, marker: String },

    /// The input directory is missing or not a directory.
    #[error("input directory not found: {}", .0.display())]
    InputDirectory(PathBuf),

    /// A workbook could not be opened or has no readable worksheet.
    #[error("cannot read {}: {message}", path.display())]
    FileRead { path: PathBuf, message: String },

    /// A required cell was empty or held the wrong kind of value.
    #[error("{cell} in {}: {reason}", path.display())]
    CellExtraction {
        path: PathBuf,
        cell: String,
        reason: String,
    },

    /// A malformed A1 cell reference in configuration or arguments.
    #[error("invalid cell reference '{0}'")]
    InvalidCellRef(String),

    /// The chart could not be turned into an image.
    #[error("chart rendering failed: {0}")]
    Render(String),

    /// An output artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = YieldError> = std::result::Result<T, E>;
