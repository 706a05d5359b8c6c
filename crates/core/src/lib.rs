//! Domain types shared by every Researcher crate.
//!
//! Holds the analysis job record and its status state machine, report
//! building, the canonical error type, and the message constants used for
//! live updates.
//! No I/O lives here.

pub mod analysis;
pub mod error;
pub mod job_events;
pub mod report;
pub mod types;
