use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::ConfigError;
use crate::prompt::Prompt;
use crate::provider::{
    build_http_client, error_for_response, AiProvider, ProviderError, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};

/// Chat-completions backend (OpenAI wire format).
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    budget_chars: usize,
}

impl OpenAiProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .resolve_api_key()?
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: "openai".to_string(),
            })?;

        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url(),
            api_key,
            model: config.model().to_string(),
            budget_chars: config.budget_chars(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(url).bearer_auth(&self.api_key).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("openai health check failed: {}", e);
                false
            }
        }
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.model, "sending chat completion request");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(content)
    }
}
