//! Report output.
//!
//! This module prints the console analysis and assembles the generated
//! Markdown report.

pub mod console;
pub mod generator;

pub use console::print_analysis;
pub use generator::ReportAssembler;
