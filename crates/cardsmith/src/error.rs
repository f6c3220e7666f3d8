use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardsmithError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("Parse error: {0}")]
    Parse(#[from] crate::parser::ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("API key is required for provider '{provider}'")]
    MissingApiKey { provider: String },

    #[error("Environment variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to extract PDF: {0}")]
    Pdf(String),

    #[error("Failed to extract DOCX: {0}")]
    Docx(String),

    #[error("Failed to extract PPTX: {0}")]
    Pptx(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read stored file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Document '{0}' already has a task in flight")]
    DocumentBusy(String),

    #[error("Task queue is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, CardsmithError>;
