//! HTML reporting: plotly charts inside a maud document.
pub mod analysis;
pub mod plots;
pub mod report;

pub use analysis::build_report;
pub use report::{Report, ReportSection};
