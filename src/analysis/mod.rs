//! Table assembly.
//!
//! Turns discovered workbooks into the ordered yield table.

pub mod aggregator;

pub use aggregator::*;
