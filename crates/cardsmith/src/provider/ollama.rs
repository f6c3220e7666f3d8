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

/// Local-inference backend (Ollama wire format). No authentication; the
/// server is expected on localhost or a configured base URL.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    budget_chars: usize,
}

impl OllamaProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url(),
            model: config.model().to_string(),
            budget_chars: config.budget_chars(),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Reachable AND the configured model is pulled.
    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("ollama server returned {}", response.status());
                return false;
            }
            Err(e) => {
                warn!("ollama server unreachable: {}", e);
                return false;
            }
        };

        match response.json::<TagsResponse>().await {
            Ok(tags) => {
                let available = tags.models.iter().any(|m| m.name == self.model);
                if !available {
                    warn!(model = %self.model, "configured model not present on ollama server");
                }
                available
            }
            Err(e) => {
                warn!("failed to decode ollama tags: {}", e);
                false
            }
        }
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        // Ollama takes a single prompt string; the instruction block and the
        // chunk content are concatenated.
        let body = GenerateRequest {
            model: &self.model,
            prompt: prompt.combined(),
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: TEMPERATURE,
                num_predict: MAX_OUTPUT_TOKENS,
            },
        };

        debug!(model = %self.model, "sending generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(parsed.response)
    }
}
