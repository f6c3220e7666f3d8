use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn};

use crate::chunker::{chunk_pages, Chunk};
use crate::config::Config;
use crate::error::ConfigError;
use crate::extractor::{ExtractorRegistry, PageBlock};
use crate::model::{Document, FlashcardData};
use crate::parser::parse_flashcards;
use crate::prompt::build_prompt;
use crate::provider::{build_provider, AiProvider, ProviderError};
use crate::store::FileStore;

use super::error::{PipelineError, PipelineWarning};

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_cards: usize,
    pub generate_timeout: Duration,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_cards: config.generation.max_cards,
            generate_timeout: Duration::from_secs(config.generation.generate_timeout_secs),
        }
    }
}

/// Everything the pipeline produced for one document. Warnings cover partial
/// coverage (truncated pages, failed chunks) without failing the run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub cards: Vec<FlashcardData>,
    pub warnings: Vec<PipelineWarning>,
}

/// Per-document generation pipeline: fetch bytes, extract page blocks, chunk
/// to the provider budget, and drive generate/parse per chunk.
///
/// Status transitions and card persistence live with the orchestrator so a
/// retried attempt never repeats a side effect.
pub struct Pipeline {
    extractors: ExtractorRegistry,
    provider: Arc<dyn AiProvider>,
    files: Arc<dyn FileStore>,
    settings: GenerationSettings,
}

enum ChunkFailure {
    /// Aborts the attempt; the orchestrator decides whether to retry.
    Fatal(PipelineError),
    /// Recorded as a warning; sibling chunks continue.
    Skipped(String),
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        files: Arc<dyn FileStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            extractors: ExtractorRegistry::new(),
            provider,
            files,
            settings,
        }
    }

    /// Production constructor; selects the provider from config.
    pub fn from_config(config: &Config, files: Arc<dyn FileStore>) -> Result<Self, ConfigError> {
        let provider = build_provider(&config.provider)?;
        let settings = GenerationSettings::from_config(config);
        Ok(Self::new(provider, files, settings))
    }

    pub fn provider(&self) -> &Arc<dyn AiProvider> {
        &self.provider
    }

    pub async fn run(&self, document: &Document) -> Result<GenerationOutcome, PipelineError> {
        info!(
            document_id = %document.id,
            filename = %document.filename,
            provider = self.provider.name(),
            "starting flashcard generation"
        );

        let bytes = self.files.get_file(&document.file_path).await?;
        let pages = self.step_extract(&bytes, &document.filename)?;

        if pages.is_empty() {
            return Err(PipelineError::NoValidCards(
                "document contained no extractable text".to_string(),
            ));
        }

        let (chunks, mut warnings) = self.step_chunk(&pages);

        let mut cards: Vec<FlashcardData> = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if cards.len() >= self.settings.max_cards {
                debug!(chunk = index + 1, "card budget reached, skipping remaining chunks");
                break;
            }
            let remaining = self.settings.max_cards - cards.len();

            match self.generate_chunk(document, chunk, remaining).await {
                Ok(mut chunk_cards) => {
                    // The provider may over-produce; keep the first N in
                    // response order.
                    chunk_cards.truncate(remaining);
                    info!(
                        chunk = index + 1,
                        min_page = chunk.min_page(),
                        max_page = chunk.max_page(),
                        cards = chunk_cards.len(),
                        "chunk produced cards"
                    );
                    cards.append(&mut chunk_cards);
                }
                Err(ChunkFailure::Fatal(error)) => return Err(error),
                Err(ChunkFailure::Skipped(reason)) => {
                    warn!(chunk = index + 1, %reason, "chunk produced no usable cards");
                    warnings.push(PipelineWarning::ChunkFailed {
                        chunk: index + 1,
                        min_page: chunk.min_page(),
                        max_page: chunk.max_page(),
                        reason,
                    });
                }
            }
        }

        if cards.is_empty() {
            return Err(PipelineError::NoValidCards(summarize_failures(&warnings)));
        }

        info!(
            document_id = %document.id,
            cards = cards.len(),
            warnings = warnings.len(),
            "generation finished"
        );

        Ok(GenerationOutcome { cards, warnings })
    }

    fn step_extract(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<Vec<PageBlock>, PipelineError> {
        let _span = info_span!("extract", filename = %filename).entered();
        let pages = self.extractors.extract(bytes, filename)?;
        debug!(pages = pages.len(), "extracted page blocks");
        Ok(pages)
    }

    fn step_chunk(&self, pages: &[PageBlock]) -> (Vec<Chunk>, Vec<PipelineWarning>) {
        let _span = info_span!("chunk").entered();
        let chunks = chunk_pages(pages, self.provider.budget_chars());

        let warnings: Vec<PipelineWarning> = chunks
            .iter()
            .filter(|c| c.is_truncated())
            .map(|c| PipelineWarning::PageTruncated { page: c.min_page() })
            .collect();

        debug!(chunks = chunks.len(), truncated = warnings.len(), "chunked document");
        (chunks, warnings)
    }

    async fn generate_chunk(
        &self,
        document: &Document,
        chunk: &Chunk,
        max_cards: usize,
    ) -> Result<Vec<FlashcardData>, ChunkFailure> {
        let prompt = build_prompt(chunk, &document.filename, max_cards);

        let raw = match tokio::time::timeout(
            self.settings.generate_timeout,
            self.provider.generate(&prompt),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => return Err(ChunkFailure::Fatal(PipelineError::Provider(error))),
            Err(_) => {
                return Err(ChunkFailure::Fatal(PipelineError::Provider(
                    ProviderError::Timeout(self.settings.generate_timeout.as_secs()),
                )))
            }
        };

        parse_flashcards(&raw, &document.filename)
            .map_err(|error| ChunkFailure::Skipped(error.to_string()))
    }
}

fn summarize_failures(warnings: &[PipelineWarning]) -> String {
    let failures: Vec<String> = warnings
        .iter()
        .filter(|w| matches!(w, PipelineWarning::ChunkFailed { .. }))
        .map(|w| w.to_string())
        .collect();

    if failures.is_empty() {
        "no chunk produced a valid flashcard".to_string()
    } else {
        failures.join("; ")
    }
}
