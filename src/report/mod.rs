//! Report rendering and output.

pub mod chart;
pub mod writer;

pub use chart::render_chart;
pub use writer::{build_workbook, generate_json_report, write_artifacts, Artifact};
