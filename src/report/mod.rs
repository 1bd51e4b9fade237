//! Report and table output.

pub mod generator;

pub use generator::{render_report, render_table, write_output};
