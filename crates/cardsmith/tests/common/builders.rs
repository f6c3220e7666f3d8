//! Builders for wiring a complete in-memory pipeline world: stub provider,
//! memory stores, and a running task queue.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cardsmith::{
    AiProvider, CardRepository, Document, DocumentRepository, FileStore, GenerationConfig,
    GenerationSettings, MemoryCardRepo, MemoryDocumentRepo, MemoryFileStore, Pipeline,
    ProcessingTask, StubProvider, TaskQueue,
};

pub struct TestWorld {
    pub queue: TaskQueue,
    pub files: Arc<MemoryFileStore>,
    pub documents: Arc<MemoryDocumentRepo>,
    pub cards: Arc<MemoryCardRepo>,
    pub stub: Arc<StubProvider>,
}

pub struct WorldBuilder {
    budget_chars: usize,
    generation: GenerationConfig,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self {
            budget_chars: 8000,
            generation: GenerationConfig {
                max_cards: 20,
                max_attempts: 3,
                backoff_base_secs: 0,
                generate_timeout_secs: 5,
                task_timeout_secs: 30,
                worker_count: 2,
            },
        }
    }

    /// Shrinks the provider budget so small fixtures split into chunks.
    pub fn budget_chars(mut self, budget: usize) -> Self {
        self.budget_chars = budget;
        self
    }

    pub fn max_cards(mut self, max_cards: usize) -> Self {
        self.generation.max_cards = max_cards;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.generation.max_attempts = max_attempts;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.generation.task_timeout_secs = secs;
        self
    }

    pub fn start(self) -> TestWorld {
        let stub = Arc::new(StubProvider::new().with_budget(self.budget_chars));
        let provider = Arc::clone(&stub) as Arc<dyn AiProvider>;
        let files = Arc::new(MemoryFileStore::new());
        let documents = Arc::new(MemoryDocumentRepo::new());
        let cards = Arc::new(MemoryCardRepo::new());

        let pipeline = Pipeline::new(
            provider,
            Arc::clone(&files) as Arc<dyn FileStore>,
            GenerationSettings {
                max_cards: self.generation.max_cards,
                generate_timeout: Duration::from_secs(self.generation.generate_timeout_secs),
            },
        );

        let queue = TaskQueue::start(
            pipeline,
            Arc::clone(&documents) as Arc<dyn DocumentRepository>,
            Arc::clone(&cards) as Arc<dyn CardRepository>,
            &self.generation,
        );

        TestWorld {
            queue,
            files,
            documents,
            cards,
            stub,
        }
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Stores bytes in the file store and registers the matching document.
    pub async fn upload(&self, filename: &str, content: &[u8]) -> Document {
        let path = format!("uploads/{}", filename);
        self.files.put(path.clone(), content.to_vec());

        let document = Document::new("user-1", filename, path);
        self.documents.insert(document.clone()).await.unwrap();
        document
    }

    /// Enqueues the document and polls until its task reaches a terminal
    /// status.
    pub async fn process(&self, document_id: &str) -> ProcessingTask {
        let task_id = self.queue.enqueue(document_id).await.unwrap();
        self.wait_for(&task_id).await
    }

    pub async fn wait_for(&self, task_id: &str) -> ProcessingTask {
        for _ in 0..600 {
            if let Some(task) = self.queue.task_status(task_id) {
                if task.is_finished() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not finish in time", task_id);
    }

    pub async fn document(&self, document_id: &str) -> Document {
        self.documents
            .find(document_id)
            .await
            .unwrap()
            .expect("document should exist")
    }
}

/// Renders a well-formed provider reply from (question, source) pairs.
pub fn flashcards_reply(entries: &[(&str, &str)]) -> String {
    let cards: Vec<String> = entries
        .iter()
        .map(|(question, source)| {
            format!(
                r#"{{"question": "{}", "answer": "A complete answer.", "source": "{}"}}"#,
                question, source
            )
        })
        .collect();
    format!(r#"{{"flashcards": [{}]}}"#, cards.join(","))
}

/// A plain-text fixture that extracts into exactly `pages` page blocks of
/// fifty lines each, with distinct factual statements per page.
pub fn text_fixture(pages: usize) -> Vec<u8> {
    let mut content = String::new();
    for page in 1..=pages {
        for line in 1..=50 {
            content.push_str(&format!(
                "Fact {}.{}: statement number {} on page {}.\n",
                page, line, line, page
            ));
        }
    }
    content.into_bytes()
}

/// Pulls the cited page number out of a card source string.
pub fn cited_page(source: &str) -> Option<u32> {
    let marker = "Page ";
    let start = source.find(marker)? + marker.len();
    let digits: String = source[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
