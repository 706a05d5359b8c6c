//! OpenAI: structured synthesis backend, also usable for research.

use async_trait::async_trait;

use crate::chat::{parse_json_object, ChatClient, ChatMessage, ChatRequest};
use crate::error::{ProviderError, ProviderFailure};
use crate::prompts::{
    research_prompt, synthesis_prompt, RESEARCH_SYSTEM_PROMPT, SYNTHESIS_SYSTEM_PROMPT,
};
use crate::provider::{InferenceProvider, Options};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

const RESEARCH_TEMPERATURE: f32 = 0.2;
const SYNTHESIS_TEMPERATURE: f32 = 0.7;

/// OpenAI chat-completions backend.
pub struct OpenAiProvider {
    chat: ChatClient,
    model: String,
}

impl OpenAiProvider {
    pub const NAME: &'static str = "openai";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(ChatClient::new(OPENAI_BASE_URL, api_key))
    }

    pub fn with_client(chat: ChatClient) -> Self {
        Self {
            chat,
            model: OPENAI_DEFAULT_MODEL.to_string(),
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
impl InferenceProvider for OpenAiProvider {
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
        );

        tracing::info!(provider = Self::NAME, model = %self.model, "Sending research request");
        self.chat.complete(&request).await.map_err(|e| self.error(e))
    }

    async fn synthesize(
        &self,
        research: &str,
        _options: &Options,
    ) -> Result<serde_json::Value, ProviderError> {
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
                ChatMessage::user(synthesis_prompt(research)),
            ],
            SYNTHESIS_TEMPERATURE,
        )
        .with_json_object();

        tracing::info!(provider = Self::NAME, model = %self.model, "Sending synthesis request");
        let content = self.chat.complete(&request).await.map_err(|e| self.error(e))?;
        tracing::info!(provider = Self::NAME, chars = content.len(), "Received synthesis response");
        parse_json_object(&content).map_err(|e| self.error(e))
    }
}
