//! Two-phase analysis pipeline.
//!
//! [`Orchestrator`] drives one analysis at a time per id through
//! `pending -> researching -> analyzing -> completed | failed`, persisting
//! the record and broadcasting an update after every transition.
//!
//! - [`ProviderChain`]: ordered research providers, tried until one succeeds.
//! - [`RunRegistry`]: ids with a run in flight; rejects duplicate runs.

pub mod fallback;
pub mod orchestrator;
pub mod registry;

pub use fallback::{with_deadline, ChainError, ProviderChain, ResearchOutput};
pub use orchestrator::{Orchestrator, PipelineConfig, RunHandle, RunOutcome};
pub use registry::{RunGuard, RunRegistry};
