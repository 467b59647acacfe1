//! Shared utilities.

pub mod report;
pub mod telemetry;

pub use report::{matrices_report, process_table_report, released_list};
pub use telemetry::init_tracing;
