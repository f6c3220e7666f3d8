use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of an uploaded document as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A user-uploaded document tracked through the generation lifecycle.
///
/// Created by the upload collaborator with status `Uploaded`; after that only
/// the orchestrator mutates it, and never concurrently for the same id (the
/// task queue keeps at most one task in flight per document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    /// Original filename, also the display name used in card citations.
    pub filename: String,
    /// Storage-layer path the raw bytes can be fetched from.
    pub file_path: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    /// Deck the generated cards were attached to, set on completion.
    pub deck_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        user_id: impl Into<String>,
        filename: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            filename: filename.into(),
            file_path: file_path.into(),
            status: DocumentStatus::Uploaded,
            error_message: None,
            deck_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = DocumentStatus::Processing;
        self.error_message = None;
        self.touch();
    }

    pub fn mark_completed(&mut self, deck_id: String) {
        self.status = DocumentStatus::Completed;
        self.deck_id = Some(deck_id);
        self.error_message = None;
        self.touch();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = DocumentStatus::Failed;
        self.error_message = Some(error.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Minimum length for a usable source attribution string.
const MIN_SOURCE_LEN: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("question cannot be empty")]
    EmptyQuestion,

    #[error("answer cannot be empty")]
    EmptyAnswer,

    #[error("source attribution is required")]
    EmptySource,

    #[error("source attribution must include document name and page")]
    SourceTooShort,

    #[error("source attribution does not reference document '{0}'")]
    SourceMissingDocument(String),
}

/// A validated flashcard produced by the parser and consumed by the
/// orchestrator.
///
/// The only way to obtain an instance is [`FlashcardData::new`], which
/// enforces the source-attribution invariant. An existing value is therefore
/// always valid; there is no post-hoc filtering step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardData {
    question: String,
    answer: String,
    source: String,
}

impl FlashcardData {
    /// Validates and constructs a flashcard. `display_name` is the document
    /// name every `source` must embed (matched case-insensitively).
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        source: impl Into<String>,
        display_name: &str,
    ) -> Result<Self, CardError> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(CardError::EmptyQuestion);
        }

        let answer = answer.into().trim().to_string();
        if answer.is_empty() {
            return Err(CardError::EmptyAnswer);
        }

        let source = source.into().trim().to_string();
        if source.is_empty() {
            return Err(CardError::EmptySource);
        }
        if source.chars().count() < MIN_SOURCE_LEN {
            return Err(CardError::SourceTooShort);
        }
        if !source.to_lowercase().contains(&display_name.to_lowercase()) {
            return Err(CardError::SourceMissingDocument(display_name.to_string()));
        }

        Ok(Self {
            question,
            answer,
            source,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
