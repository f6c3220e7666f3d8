use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// The configured AI backend. Exactly one implementation is selected from
/// this value at construction time; nothing downstream branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Openai
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    /// Model identifier; falls back to a per-kind default.
    #[serde(default)]
    pub model: Option<String>,
    /// API key, either a literal value or an `env:VAR_NAME` reference.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL override, mainly for self-hosted backends and tests.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_context_window_tokens")]
    pub context_window_tokens: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_context_window_tokens() -> usize {
    4096
}

fn default_provider_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            context_window_tokens: default_context_window_tokens(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// Manual Debug so a configured API key never reaches logs or error output.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("context_window_tokens", &self.context_window_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match &self.model {
            Some(model) => model,
            None => match self.kind {
                ProviderKind::Openai => "gpt-4",
                ProviderKind::Anthropic => "claude-3-sonnet-20240229",
                ProviderKind::Ollama => "llama2",
            },
        }
    }

    pub fn base_url(&self) -> String {
        let url = match &self.base_url {
            Some(url) => url.as_str(),
            None => match self.kind {
                ProviderKind::Openai => "https://api.openai.com",
                ProviderKind::Anthropic => "https://api.anthropic.com",
                ProviderKind::Ollama => "http://localhost:11434",
            },
        };
        url.trim_end_matches('/').to_string()
    }

    /// Character budget for a single generation call: ~4 characters per
    /// token, capped at 70% of the context window to leave room for the
    /// instruction block and the response.
    pub fn budget_chars(&self) -> usize {
        self.context_window_tokens * 4 * 70 / 100
    }

    /// Resolves the API key, following an `env:VAR_NAME` indirection when
    /// present. Returns `Ok(None)` when no key is configured at all.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ConfigError> {
        let Some(raw) = &self.api_key else {
            return Ok(None);
        };

        if let Some(name) = raw.strip_prefix("env:") {
            return match std::env::var(name) {
                Ok(value) if !value.is_empty() => Ok(Some(value)),
                _ => Err(ConfigError::EnvVarNotSet {
                    name: name.to_string(),
                }),
            };
        }

        Ok(Some(raw.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on cards per document; over-producing responses are
    /// capped at the first N in response order.
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base for exponential retry backoff (seconds).
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Bound on a single provider generate call.
    #[serde(default = "default_generate_timeout_secs")]
    pub generate_timeout_secs: u64,
    /// Ceiling on a whole document task; exceeding it fails the task
    /// instead of leaving the document stuck in processing.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_max_cards() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    2
}

fn default_generate_timeout_secs() -> u64 {
    60
}

fn default_task_timeout_secs() -> u64 {
    600
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_cards: default_max_cards(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            generate_timeout_secs: default_generate_timeout_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            worker_count: default_worker_count(),
        }
    }
}
