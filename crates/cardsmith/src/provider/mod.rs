pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ConfigError;
use crate::prompt::Prompt;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use stub::StubProvider;

/// Sampling temperature used for every backend.
pub(crate) const TEMPERATURE: f32 = 0.7;

/// Output token budget per generation call.
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 4000;

/// Fallback retry delay when a 429 carries no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Upper bound on API error text carried into error values.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors surfaced by provider backends. Whether the orchestrator may retry
/// is a property of the value, inspected through [`ProviderError::retryable`]
/// rather than inferred from messages.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),

    #[error("Generation call timed out after {0}s")]
    Timeout(u64),
}

impl ProviderError {
    /// Transport faults, rate limits, timeouts, and 5xx responses are worth
    /// retrying; auth failures and malformed payloads are not.
    pub fn retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_)
            | ProviderError::RateLimit { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Auth(_)
            | ProviderError::EmptyResponse
            | ProviderError::UnexpectedResponse(_) => false,
        }
    }
}

/// An interchangeable text-generation backend.
///
/// Variants differ only in envelope construction, authentication, and the
/// field path carrying the generated text; nothing outside this module
/// branches on which one is active.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Character budget for one generation call, used by the chunker.
    fn budget_chars(&self) -> usize;

    /// Lightweight reachability probe for the operational surface; never
    /// called on the generation path.
    async fn health_check(&self) -> bool;

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Constructs the configured provider. This is the single point of provider
/// selection; callers receive a trait object and stay backend-agnostic.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn AiProvider>, ConfigError> {
    let provider: Arc<dyn AiProvider> = match config.kind {
        ProviderKind::Openai => Arc::new(OpenAiProvider::from_config(config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
    };

    info!(provider = provider.name(), model = config.model(), "AI provider initialized");

    Ok(provider)
}

pub(crate) fn build_http_client(config: &ProviderConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Maps a non-success HTTP response onto the error taxonomy. The body is
/// truncated before it can bloat `Document.error_message`.
pub(crate) async fn error_for_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return ProviderError::RateLimit { retry_after_secs };
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ProviderError::Auth(message)
    } else {
        ProviderError::Api {
            status: status.as_u16(),
            message,
        }
    }
}
