//! The capability pair every inference backend implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Options bag passed through from the analysis record.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// An external inference backend.
///
/// Implementations hold only transport configuration; they keep no state
/// between calls and perform no retries.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Short stable name used in logs and error messages.
    fn name(&self) -> &str;

    /// Gather research text on `topic`.
    async fn fetch_research(&self, topic: &str, options: &Options) -> Result<String, ProviderError>;

    /// Turn research text into a structured JSON object.
    async fn synthesize(
        &self,
        research: &str,
        options: &Options,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Providers are shared between the pipeline and every run task.
pub type SharedProvider = Arc<dyn InferenceProvider>;
