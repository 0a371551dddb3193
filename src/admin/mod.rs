#![forbid(unsafe_code)]

//! Store inspection utilities backing the command line tool.

mod stats;
mod verify;

/// Table summary of a store.
pub use stats::{stats, StatsReport, TableStats};

/// Hierarchy consistency checks.
///
/// Builds the hierarchy index and reports dangling links, ambiguous
/// constituency membership and missing protocols or results tables.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyReport, VerifySeverity};
