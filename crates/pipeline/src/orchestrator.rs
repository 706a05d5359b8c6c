//! Supervised analysis runs.
//!
//! Each run is a tokio task owned by the orchestrator's [`TaskTracker`].
//! For every transition the record is mutated in memory, written through
//! [`JobStore::put`], then announced via [`NotificationHub::broadcast`],
//! in that order, before the next phase starts.

use std::sync::Arc;
use std::time::Duration;

use researcher_core::analysis::{
    Analysis, AnalysisStatus, NewAnalysis, UpdateAnalysis, PARAM_ANALYSIS_RESULTS,
    PARAM_RESEARCH_DATA,
};
use researcher_core::error::CoreError;
use researcher_core::types::DbId;
use researcher_db::{JobStore, StoreError};
use researcher_events::{HubEvent, NotificationHub};
use researcher_providers::{ProviderError, SharedProvider};
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;

use crate::fallback::{with_deadline, ChainError, ProviderChain};
use crate::registry::{RunGuard, RunRegistry};

/// Default outer deadline for a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Tunables for the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Upper bound on each provider call; `None` disables the outer deadline.
    pub provider_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Some(DEFAULT_PROVIDER_TIMEOUT),
        }
    }
}

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

/// Final state of one run, as reported by its task.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Analysis),
    Failed(Analysis),
    /// The task ended without reporting, e.g. it panicked.
    Lost { job_id: DbId },
}

impl RunOutcome {
    fn from_analysis(analysis: Analysis) -> Self {
        match analysis.status {
            AnalysisStatus::Completed => Self::Completed(analysis),
            _ => Self::Failed(analysis),
        }
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            Self::Completed(a) | Self::Failed(a) => Some(a),
            Self::Lost { .. } => None,
        }
    }

    pub fn into_analysis(self) -> Option<Analysis> {
        match self {
            Self::Completed(a) | Self::Failed(a) => Some(a),
            Self::Lost { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Handle to a run in flight. Dropping it does not cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    job_id: DbId,
    outcome: oneshot::Receiver<Analysis>,
}

impl RunHandle {
    pub fn job_id(&self) -> DbId {
        self.job_id
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> RunOutcome {
        match self.outcome.await {
            Ok(analysis) => RunOutcome::from_analysis(analysis),
            Err(_) => RunOutcome::Lost {
                job_id: self.job_id,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Run failures
// ---------------------------------------------------------------------------

/// Why a run stopped early. Only ever rendered into `parameters.error`.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Research(#[from] ChainError),

    #[error("Analysis phase failed: {0}")]
    Synthesis(#[from] ProviderError),

    #[error("Failed to persist analysis: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// What a run broadcasts before its first transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Announce {
    /// Freshly created record: subscribers get the `pending` snapshot.
    Pending,
    Nothing,
}

/// Starts analysis runs and tracks them until they finish.
///
/// Cheap to clone; clones share the same registry and task tracker.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    hub: Arc<NotificationHub>,
    research: ProviderChain,
    synthesis: SharedProvider,
    registry: Arc<RunRegistry>,
    tracker: TaskTracker,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        hub: Arc<NotificationHub>,
        research: ProviderChain,
        synthesis: SharedProvider,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            hub,
            research: research.with_deadline(config.provider_timeout),
            synthesis,
            registry: Arc::new(RunRegistry::new()),
            tracker: TaskTracker::new(),
            config,
        }
    }

    /// Create a pending analysis and start its run.
    ///
    /// The run announces the `pending` snapshot before its first transition,
    /// so every update for the job comes from a single task. If another
    /// caller started the run while the record was being created, the new
    /// record is returned without a handle.
    pub async fn submit(
        &self,
        input: NewAnalysis,
    ) -> Result<(Analysis, Option<RunHandle>), CoreError> {
        input.validate()?;
        if self.tracker.is_closed() {
            return Err(shutting_down());
        }

        let analysis = self.store.create(input).await?;
        tracing::info!(job_id = analysis.id, topic = %analysis.topic, "Analysis created");

        match self.registry.try_claim(analysis.id) {
            Ok(guard) => {
                let handle = self.spawn_run(guard, analysis.clone(), Announce::Pending);
                Ok((analysis, Some(handle)))
            }
            Err(_) => {
                tracing::debug!(job_id = analysis.id, "Run already started by another caller");
                Ok((analysis, None))
            }
        }
    }

    /// Start the run for an existing pending analysis.
    ///
    /// The in-flight check comes before any store access, so a conflicting
    /// call never touches the record of the running job.
    pub async fn start_run(&self, id: DbId) -> Result<RunHandle, CoreError> {
        if self.tracker.is_closed() {
            return Err(shutting_down());
        }
        let guard = self.registry.try_claim(id)?;

        let analysis = self.get(id).await?;
        if analysis.status != AnalysisStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Analysis {id} is {} and cannot be started",
                analysis.status
            )));
        }

        Ok(self.spawn_run(guard, analysis, Announce::Nothing))
    }

    pub async fn get(&self, id: DbId) -> Result<Analysis, CoreError> {
        self.store
            .get(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Analysis",
                id,
            })
    }

    pub fn in_flight(&self) -> Vec<DbId> {
        self.registry.in_flight()
    }

    pub fn is_running(&self, id: DbId) -> bool {
        self.registry.is_running(id)
    }

    /// Edit the title or description of an analysis that is not running.
    ///
    /// Holds the id's run claim for the duration of the write, so a run
    /// cannot start underneath it.
    pub async fn update_details(
        &self,
        id: DbId,
        changes: UpdateAnalysis,
    ) -> Result<Analysis, CoreError> {
        let _guard = self.registry.try_claim(id)?;
        let mut analysis = self.get(id).await?;
        changes.apply(&mut analysis)?;
        self.store.put(&analysis).await?;
        Ok(analysis)
    }

    /// Delete an analysis that is not running.
    pub async fn delete(&self, id: DbId) -> Result<(), CoreError> {
        let _guard = self.registry.try_claim(id)?;
        if !self.store.delete(id).await? {
            return Err(CoreError::NotFound {
                entity: "Analysis",
                id,
            });
        }
        tracing::info!(job_id = id, "Analysis deleted");
        Ok(())
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Stop accepting runs and wait up to `grace` for tracked runs to end.
    ///
    /// Returns `true` if every run finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.registry.in_flight();
        if !in_flight.is_empty() {
            tracing::info!(count = in_flight.len(), "Waiting for in-flight analyses");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = ?self.registry.in_flight(),
                    "Analyses still running after shutdown grace period",
                );
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run task
    // -----------------------------------------------------------------------

    fn spawn_run(&self, guard: RunGuard, analysis: Analysis, announce: Announce) -> RunHandle {
        let job_id = guard.id();
        let (tx, rx) = oneshot::channel();
        let this = self.clone();

        self.tracker.spawn(async move {
            let finished = this.execute(analysis, announce).await;
            // Release the id before reporting so `wait()` observers see the
            // run as no longer in flight.
            drop(guard);
            let _ = tx.send(finished);
        });

        RunHandle {
            job_id,
            outcome: rx,
        }
    }

    async fn execute(&self, mut analysis: Analysis, announce: Announce) -> Analysis {
        let job_id = analysis.id;
        tracing::info!(job_id, "Analysis run started");

        if announce == Announce::Pending {
            self.hub
                .broadcast(job_id, HubEvent::update(&analysis))
                .await;
        }

        match self.run_phases(&mut analysis).await {
            Ok(()) => {
                tracing::info!(job_id, "Analysis completed");
            }
            Err(e) => self.record_failure(&mut analysis, e).await,
        }
        analysis
    }

    async fn run_phases(&self, analysis: &mut Analysis) -> Result<(), RunError> {
        self.transition(analysis, AnalysisStatus::Researching).await?;

        let research = self
            .research
            .fetch_research(&analysis.topic, &analysis.parameters)
            .await?;
        tracing::debug!(
            job_id = analysis.id,
            provider = %research.provider,
            chars = research.text.len(),
            "Research phase finished",
        );
        analysis.append_parameter(PARAM_RESEARCH_DATA, research.text.clone().into())?;
        self.transition(analysis, AnalysisStatus::Analyzing).await?;

        let results = with_deadline(
            self.synthesis.name(),
            self.config.provider_timeout,
            self.synthesis.synthesize(&research.text, &analysis.parameters),
        )
        .await?;
        analysis.append_parameter(PARAM_ANALYSIS_RESULTS, results)?;
        self.transition(analysis, AnalysisStatus::Completed).await?;

        Ok(())
    }

    /// Mutate, persist, broadcast.
    async fn transition(
        &self,
        analysis: &mut Analysis,
        next: AnalysisStatus,
    ) -> Result<(), RunError> {
        let previous = analysis.status;
        let previous_progress = analysis.progress;
        analysis.advance(next)?;
        if let Err(e) = self.store.put(analysis).await {
            // The write never landed; fail from the last persisted status.
            analysis.status = previous;
            analysis.progress = previous_progress;
            return Err(e.into());
        }
        let delivered = self
            .hub
            .broadcast(analysis.id, HubEvent::update(analysis))
            .await;
        tracing::debug!(job_id = analysis.id, status = %next, delivered, "Analysis transition");
        Ok(())
    }

    /// Terminal failure: record `failed`, then persist and broadcast best effort.
    async fn record_failure(&self, analysis: &mut Analysis, err: RunError) {
        let job_id = analysis.id;
        let message = err.to_string();
        tracing::error!(job_id, status = %analysis.status, error = %message, "Analysis failed");

        if let Err(e) = analysis.fail(message) {
            tracing::error!(job_id, error = %e, "Could not mark analysis as failed");
            return;
        }
        if let Err(e) = self.store.put(analysis).await {
            tracing::error!(job_id, error = %e, "Failed to persist failed analysis");
        }
        self.hub
            .broadcast(job_id, HubEvent::update(analysis))
            .await;
    }
}

fn shutting_down() -> CoreError {
    CoreError::Conflict("Pipeline is shutting down; no new runs are accepted".into())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use researcher_providers::ProviderFailure;

    use super::*;

    #[test]
    fn outcome_follows_final_status() {
        let mut analysis =
            Analysis::from_new(1, NewAnalysis::from_topic("t"), chrono::Utc::now());
        analysis.advance(AnalysisStatus::Researching).unwrap();
        analysis.fail("x").unwrap();

        let outcome = RunOutcome::from_analysis(analysis.clone());
        assert!(!outcome.is_completed());
        assert_eq!(outcome.analysis(), Some(&analysis));
        assert_eq!(RunOutcome::Lost { job_id: 1 }.into_analysis(), None);
    }

    #[test]
    fn synthesis_error_message_names_phase_and_provider() {
        let err = RunError::from(ProviderError::new(
            "openai",
            ProviderFailure::Malformed("content is not JSON".into()),
        ));
        let message = err.to_string();
        assert!(message.starts_with("Analysis phase failed: openai request failed"));
    }

    #[test]
    fn store_error_message_is_prefixed() {
        let err = RunError::from(StoreError::NotFound(9));
        assert_matches!(err, RunError::Store(_));
        assert_eq!(err.to_string(), "Failed to persist analysis: Analysis 9 not found");
    }

    #[test]
    fn default_config_has_outer_deadline() {
        assert_eq!(
            PipelineConfig::default().provider_timeout,
            Some(DEFAULT_PROVIDER_TIMEOUT)
        );
    }
}
