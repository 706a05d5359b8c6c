//! Repository layer.
//!
//! Each repository provides async queries that accept `&PgPool` as the
//! first argument. [`PgJobStore`] adapts them to the [`crate::JobStore`]
//! trait.

pub mod analysis_repo;

pub use analysis_repo::{AnalysisRepo, PgJobStore};
