pub mod chunker;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod store;
pub mod worker;

pub use chunker::{chunk_pages, Chunk};
pub use config::{load_config, Config, GenerationConfig, ProviderConfig, ProviderKind};
pub use error::{
    CardsmithError, ConfigError, ExtractError, QueueError, Result, StoreError,
};
pub use extractor::{DocumentFormat, ExtractorRegistry, PageBlock};
pub use model::{CardError, Document, DocumentStatus, FlashcardData};
pub use parser::{parse_flashcards, ParseError};
pub use pipeline::{GenerationOutcome, GenerationSettings, Pipeline, PipelineError, PipelineWarning};
pub use prompt::{build_prompt, Prompt};
pub use provider::{build_provider, AiProvider, ProviderError, StubProvider};
pub use store::{
    CardRepository, DocumentRepository, FileStore, LocalFileStore, MemoryCardRepo,
    MemoryDocumentRepo, MemoryFileStore,
};
pub use worker::{ProcessingTask, TaskQueue, TaskStatus, TaskStore};
