use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Store(#[from] crate::error::StoreError),

    #[error("extraction failed: {0}")]
    Extract(#[from] crate::error::ExtractError),

    #[error("provider call failed: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("no valid flashcards generated: {0}")]
    NoValidCards(String),
}

impl PipelineError {
    /// Only provider-stage faults can be transient; extraction, storage, and
    /// aggregation failures are permanent on first occurrence.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Provider(e) => e.retryable(),
            PipelineError::Store(_)
            | PipelineError::Extract(_)
            | PipelineError::NoValidCards(_) => false,
        }
    }
}

/// Non-fatal pipeline events, carried alongside the produced cards.
#[derive(Debug, Clone)]
pub enum PipelineWarning {
    /// A single page exceeded the chunk budget and was cut down; the page is
    /// still cited but not fully covered.
    PageTruncated { page: u32 },

    /// One chunk produced nothing usable; sibling chunks were unaffected.
    ChunkFailed {
        chunk: usize,
        min_page: u32,
        max_page: u32,
        reason: String,
    },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::PageTruncated { page } => {
                write!(f, "page {} truncated to fit the chunk budget", page)
            }
            PipelineWarning::ChunkFailed {
                chunk,
                min_page,
                max_page,
                reason,
            } => write!(
                f,
                "chunk {} (pages {}-{}): {}",
                chunk, min_page, max_page, reason
            ),
        }
    }
}
