//! Command line helpers for the flipper report.
pub mod report;
