use std::time::Duration;

/// A single provider call failed.
#[derive(Debug, thiserror::Error)]
#[error("{provider} request failed: {cause}")]
pub struct ProviderError {
    /// Name of the provider that failed, e.g. `"perplexity"`.
    pub provider: String,
    pub cause: ProviderFailure,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, cause: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            cause,
        }
    }
}

/// Why a provider call failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    /// The HTTP request itself failed (network, DNS, TLS, client timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response arrived but did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The call did not finish within the caller's deadline.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_provider_and_cause() {
        let err = ProviderError::new(
            "perplexity",
            ProviderFailure::Api {
                status: 503,
                body: "overloaded".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "perplexity request failed: API error (503): overloaded"
        );
    }

    #[test]
    fn timeout_display_uses_seconds() {
        let err = ProviderError::new("openai", ProviderFailure::Timeout(Duration::from_secs(300)));
        assert_eq!(err.to_string(), "openai request failed: timed out after 300s");
    }
}
