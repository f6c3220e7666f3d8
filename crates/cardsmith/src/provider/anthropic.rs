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

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages-API backend (Anthropic wire format).
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    budget_chars: usize,
}

impl AnthropicProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .resolve_api_key()?
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: "anthropic".to_string(),
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        let request = self
            .client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("anthropic health check failed: {}", e);
                false
            }
        }
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
            system: &prompt.system,
            messages: vec![UserMessage {
                role: "user",
                content: &prompt.user,
            }],
        };

        debug!(model = %self.model, "sending messages request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let content = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_pages;
    use crate::extractor::PageBlock;
    use mockito::Server;

    fn test_prompt() -> Prompt {
        let blocks = vec![PageBlock::new(1, "The Krebs cycle produces ATP.".to_string())];
        let chunk = chunk_pages(&blocks, 10_000).remove(0);
        crate::prompt::build_prompt(&chunk, "bio.pdf", 5)
    }

    fn provider_for(server: &Server) -> AnthropicProvider {
        let config = ProviderConfig {
            kind: crate::config::ProviderKind::Anthropic,
            api_key: Some("test-key".to_string()),
            base_url: Some(server.url()),
            ..ProviderConfig::default()
        };
        AnthropicProvider::from_config(&config).unwrap()
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = ProviderConfig {
            kind: crate::config::ProviderKind::Anthropic,
            ..ProviderConfig::default()
        };
        let result = AnthropicProvider::from_config(&config);
        assert!(matches!(result, Err(ConfigError::MissingApiKey { .. })));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": [{"type": "text", "text": "{\"flashcards\": []}"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let raw = provider.generate(&test_prompt()).await.unwrap();

        assert!(raw.contains("flashcards"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_overloaded_is_retryable() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"error": {"type": "overloaded_error"}}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let err = provider.generate(&test_prompt()).await.unwrap_err();

        assert!(err.retryable());
    }

    #[tokio::test]
    async fn test_generate_empty_content_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": []}"#)
            .create_async()
            .await;

        let provider = provider_for(&server);
        let err = provider.generate(&test_prompt()).await.unwrap_err();

        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(401)
            .create_async()
            .await;

        let provider = provider_for(&server);
        assert!(!provider.health_check().await);
    }
}
