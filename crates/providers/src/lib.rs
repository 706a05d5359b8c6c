//! Clients for the external inference providers.
//!
//! Every backend implements [`InferenceProvider`]: a research call that
//! returns free text and a synthesis call that returns a JSON object.
//! Failures surface as [`ProviderError`]; clients never retry.

pub mod chat;
pub mod error;
pub mod openai;
pub mod perplexity;
pub mod prompts;
pub mod provider;

pub use error::{ProviderError, ProviderFailure};
pub use openai::OpenAiProvider;
pub use perplexity::PerplexityProvider;
pub use provider::{InferenceProvider, SharedProvider};
