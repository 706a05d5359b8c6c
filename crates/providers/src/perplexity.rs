//! Perplexity: search-grounded research backend.

use async_trait::async_trait;

use crate::chat::{parse_json_object, ChatClient, ChatMessage, ChatRequest};
use crate::error::{ProviderError, ProviderFailure};
use crate::prompts::{
    research_prompt, synthesis_prompt, RESEARCH_SYSTEM_PROMPT, SYNTHESIS_SYSTEM_PROMPT,
};
use crate::provider::{InferenceProvider, Options};

pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// Online model with live web search.
pub const PERPLEXITY_DEFAULT_MODEL: &str = "llama-3.1-sonar-huge-128k-online";

/// Low temperature keeps research focused.
const RESEARCH_TEMPERATURE: f32 = 0.2;
const RESEARCH_TOP_P: f32 = 0.9;
const SYNTHESIS_TEMPERATURE: f32 = 0.7;

/// Perplexity chat-completions backend.
pub struct PerplexityProvider {
    chat: ChatClient,
    model: String,
}

impl PerplexityProvider {
    pub const NAME: &'static str = "perplexity";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(ChatClient::new(PERPLEXITY_BASE_URL, api_key))
    }

    /// Use a pre-built client (custom base URL or shared connection pool).
    pub fn with_client(chat: ChatClient) -> Self {
        Self {
            chat,
            model: PERPLEXITY_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn error(&self, cause: ProviderFailure) -> ProviderError {
        ProviderError::new(Self::NAME, cause)
    }
}

#[async_trait]
impl InferenceProvider for PerplexityProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_research(&self, topic: &str, options: &Options) -> Result<String, ProviderError> {
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
                ChatMessage::user(research_prompt(topic, options)),
            ],
            RESEARCH_TEMPERATURE,
        )
        .with_top_p(RESEARCH_TOP_P);

        tracing::info!(provider = Self::NAME, model = %self.model, "Sending research request");
        let content = self.chat.complete(&request).await.map_err(|e| self.error(e))?;
        tracing::info!(provider = Self::NAME, chars = content.len(), "Received research response");
        Ok(content)
    }

    async fn synthesize(
        &self,
        research: &str,
        _options: &Options,
    ) -> Result<serde_json::Value, ProviderError> {
        // Perplexity has no JSON response mode; the prompt asks for an object
        // and the content is parsed leniently.
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
                ChatMessage::user(synthesis_prompt(research)),
            ],
            SYNTHESIS_TEMPERATURE,
        );

        tracing::info!(provider = Self::NAME, model = %self.model, "Sending synthesis request");
        let content = self.chat.complete(&request).await.map_err(|e| self.error(e))?;
        parse_json_object(&content).map_err(|e| self.error(e))
    }
}
