//! Ordered provider fallback for the research phase.

use std::future::Future;
use std::time::Duration;

use researcher_core::error::CoreError;
use researcher_providers::provider::Options;
use researcher_providers::{ProviderError, ProviderFailure, SharedProvider};

/// Run a provider call under an optional outer deadline.
///
/// Expiry becomes [`ProviderFailure::Timeout`] attributed to `provider`.
pub async fn with_deadline<T, F>(
    provider: &str,
    deadline: Option<Duration>,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(provider, ProviderFailure::Timeout(limit))),
        },
        None => call.await,
    }
}

/// Research text plus the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOutput {
    pub text: String,
    pub provider: String,
}

/// Every provider in the chain failed.
#[derive(Debug, thiserror::Error)]
#[error("Research phase failed: {}", join_attempts(.attempts))]
pub struct ChainError {
    /// One error per provider, in the order they were tried.
    pub attempts: Vec<ProviderError>,
}

fn join_attempts(attempts: &[ProviderError]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Providers tried in sequence for research, stopping at the first success.
///
/// With the default wiring this is `[primary, secondary]`: one fallback,
/// no repeated retries.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<SharedProvider>,
    deadline: Option<Duration>,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl ProviderChain {
    pub fn new(providers: Vec<SharedProvider>) -> Result<Self, CoreError> {
        if providers.is_empty() {
            return Err(CoreError::Validation(
                "Research provider chain must not be empty".into(),
            ));
        }
        Ok(Self {
            providers,
            deadline: None,
        })
    }

    /// The usual two-entry chain.
    pub fn primary_with_fallback(primary: SharedProvider, secondary: SharedProvider) -> Self {
        Self {
            providers: vec![primary, secondary],
            deadline: None,
        }
    }

    /// Bound every individual provider call.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn fetch_research(
        &self,
        topic: &str,
        options: &Options,
    ) -> Result<ResearchOutput, ChainError> {
        let mut attempts = Vec::new();

        for (position, provider) in self.providers.iter().enumerate() {
            let name = provider.name();
            match with_deadline(name, self.deadline, provider.fetch_research(topic, options)).await
            {
                Ok(text) => {
                    if position > 0 {
                        tracing::info!(provider = name, "Research succeeded on fallback provider");
                    }
                    return Ok(ResearchOutput {
                        text,
                        provider: name.to_string(),
                    });
                }
                Err(e) => {
                    let has_next = position + 1 < self.providers.len();
                    tracing::warn!(
                        provider = name,
                        error = %e,
                        fallback = has_next,
                        "Research provider failed",
                    );
                    attempts.push(e);
                }
            }
        }

        Err(ChainError { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use researcher_providers::InferenceProvider;

    use super::*;

    struct Fixed {
        name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl InferenceProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_research(&self, _: &str, _: &Options) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(ProviderError::new(
                    self.name,
                    ProviderFailure::Malformed("boom".into()),
                )),
            }
        }

        async fn synthesize(&self, _: &str, _: &Options) -> Result<serde_json::Value, ProviderError> {
            unreachable!("research only")
        }
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let primary = Fixed::new("primary", Some("from primary"));
        let secondary = Fixed::new("secondary", Some("from secondary"));
        let chain = ProviderChain::primary_with_fallback(primary.clone(), secondary.clone());

        let out = chain.fetch_research("t", &Options::new()).await.unwrap();
        assert_eq!(out.text, "from primary");
        assert_eq!(out.provider, "primary");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_failure_falls_back_once() {
        let primary = Fixed::new("primary", None);
        let secondary = Fixed::new("secondary", Some("ok"));
        let chain = ProviderChain::primary_with_fallback(primary.clone(), secondary.clone());

        let out = chain.fetch_research("t", &Options::new()).await.unwrap();
        assert_eq!(out.text, "ok");
        assert_eq!(out.provider, "secondary");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_attempt() {
        let chain = ProviderChain::primary_with_fallback(
            Fixed::new("primary", None),
            Fixed::new("secondary", None),
        );

        let err = chain.fetch_research("t", &Options::new()).await.unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        let message = err.to_string();
        assert!(message.starts_with("Research phase failed: primary request failed"));
        assert!(message.contains("; secondary request failed"));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_matches!(ProviderChain::new(Vec::new()), Err(CoreError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_hang_into_timeout() {
        let result: Result<(), ProviderError> = with_deadline(
            "slow",
            Some(Duration::from_secs(5)),
            std::future::pending(),
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.provider, "slow");
        assert_matches!(err.cause, ProviderFailure::Timeout(d) if d == Duration::from_secs(5));
    }
}
