pub mod csv;
pub mod json;

pub use csv::{write_branch, write_branches_file};
pub use json::{write_summary, write_summary_file, BranchReport, FlightSummary};
