//! Input workbook access.

pub mod cell;
pub mod reader;

pub use cell::CellRef;
pub use reader::{read_wafer_record, CellMapping};
