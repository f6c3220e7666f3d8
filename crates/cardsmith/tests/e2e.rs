//! End-to-end tests driving documents through the full queue: upload,
//! enqueue, extraction, chunking, generation against the stub provider,
//! validation, and persistence.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use cardsmith::{
    AiProvider, DocumentRepository, DocumentStatus, MemoryDocumentRepo, Prompt, ProviderError,
    TaskStatus,
};

use common::builders::{cited_page, flashcards_reply, text_fixture, TestWorld, WorldBuilder};

// ── Scenario: well-formed response over a small document ──

#[tokio::test]
async fn two_page_text_document_yields_three_cited_cards() {
    let world = WorldBuilder::new().start();
    let document = world.upload("study-notes.txt", &text_fixture(2)).await;

    world.stub.enqueue_response(flashcards_reply(&[
        ("What is fact 1.1?", "study-notes.txt - Page 1"),
        ("What is fact 1.30?", "study-notes.txt - Page 1"),
        ("What is fact 2.5?", "study-notes.txt - Page 2"),
    ]));

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.cards_generated, 3);
    // Both pages fit one chunk, so a single generate call.
    assert_eq!(world.stub.calls(), 1);

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Completed);
    assert!(updated.deck_id.is_some());
    assert!(updated.error_message.is_none());

    let cards = world.cards.cards();
    assert_eq!(cards.len(), 3);
    for (deck_id, card) in &cards {
        assert_eq!(deck_id, updated.deck_id.as_ref().unwrap());
        assert!(card.source().contains("study-notes.txt"));
        let page = cited_page(card.source()).expect("source cites a page");
        assert!((1..=2).contains(&page));
    }
}

// ── Scenario: syntactically invalid provider output ──

#[tokio::test]
async fn malformed_response_fails_document_with_parse_error() {
    let world = WorldBuilder::new().start();
    let document = world.upload("study-notes.txt", &text_fixture(1)).await;

    world
        .stub
        .enqueue_response(r#"{"flashcards": [{"question": "unbalanced"#);

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    // A malformed response from a healthy provider is permanent.
    assert_eq!(task.attempts, 1);

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Failed);
    assert!(
        updated.error_message.as_ref().unwrap().contains("parse"),
        "error was: {:?}",
        updated.error_message
    );

    assert_eq!(world.cards.count(), 0);
}

// ── Scenario: partially valid response ──

#[tokio::test]
async fn invalid_card_dropped_valid_card_persisted() {
    let world = WorldBuilder::new().start();
    let document = world.upload("study-notes.txt", &text_fixture(1)).await;

    world.stub.enqueue_response(flashcards_reply(&[
        ("Good card?", "study-notes.txt - Page 1"),
        // Source omits the document name; dropped at validation.
        ("Bad card?", "Page 1 of some other file"),
    ]));

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.cards_generated, 1);

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Completed);

    let cards = world.cards.cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].1.question(), "Good card?");
}

// ── Scenario: transient rate limits before success ──

#[tokio::test]
async fn rate_limited_twice_succeeds_on_third_attempt() {
    let world = WorldBuilder::new().start();
    let document = world.upload("study-notes.txt", &text_fixture(1)).await;

    world.stub.enqueue_error(ProviderError::RateLimit {
        retry_after_secs: 0,
    });
    world.stub.enqueue_error(ProviderError::RateLimit {
        retry_after_secs: 0,
    });
    world
        .stub
        .enqueue_response(flashcards_reply(&[("Q?", "study-notes.txt - Page 1")]));

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.attempts, 3);
    assert_eq!(world.stub.calls(), 3);
    assert_eq!(world.cards.count(), 1);

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Completed);
}

#[tokio::test]
async fn always_rate_limited_provider_called_exactly_max_attempts_times() {
    let world = WorldBuilder::new().max_attempts(3).start();
    let document = world.upload("study-notes.txt", &text_fixture(1)).await;

    for _ in 0..10 {
        world.stub.enqueue_error(ProviderError::RateLimit {
            retry_after_secs: 0,
        });
    }

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(world.stub.calls(), 3);
    assert_eq!(task.attempts, 3);

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Failed);
    assert!(updated
        .error_message
        .as_ref()
        .unwrap()
        .contains("Rate limit"));
}

// ── Scenario: multi-chunk document with per-chunk citations ──

#[tokio::test]
async fn large_document_splits_into_chunks_with_disjoint_page_ranges() {
    // Each 50-line page is ~2000 characters; a 2200-char budget forces one
    // page per chunk.
    let world = WorldBuilder::new().budget_chars(2200).start();
    let document = world.upload("handbook.txt", &text_fixture(2)).await;

    world.stub.enqueue_response(flashcards_reply(&[
        ("From the first page?", "handbook.txt - Page 1"),
        ("Also from page one?", "handbook.txt - Page 1"),
    ]));
    world.stub.enqueue_response(flashcards_reply(&[(
        "From the second page?",
        "handbook.txt - Page 2",
    )]));

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.cards_generated, 3);
    assert_eq!(world.stub.calls(), 2);

    // Each generate call saw only its own chunk's pages.
    let prompts = world.stub.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].user.contains("[Page 1]"));
    assert!(!prompts[0].user.contains("[Page 2]"));
    assert!(prompts[1].user.contains("[Page 2]"));
    assert!(!prompts[1].user.contains("[Page 1]"));

    // Cards from each chunk cite only pages within that chunk's range.
    let cards = world.cards.cards();
    assert_eq!(cards.len(), 3);
    for (_, card) in &cards[..2] {
        assert_eq!(cited_page(card.source()), Some(1));
    }
    assert_eq!(cited_page(cards[2].1.source()), Some(2));
}

// ── Unsupported formats and empty documents ──

#[tokio::test]
async fn unsupported_extension_fails_without_provider_call() {
    let world = WorldBuilder::new().start();
    let document = world.upload("slides.key", b"keynote bytes").await;

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempts, 1);
    assert_eq!(world.stub.calls(), 0);

    let updated = world.document(&document.id).await;
    assert!(updated
        .error_message
        .as_ref()
        .unwrap()
        .contains("Unsupported"));
}

#[tokio::test]
async fn empty_document_fails_with_descriptive_error() {
    let world = WorldBuilder::new().start();
    let document = world.upload("blank.txt", b"\n\n\n").await;

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(world.stub.calls(), 0);

    let updated = world.document(&document.id).await;
    assert!(updated
        .error_message
        .as_ref()
        .unwrap()
        .contains("no extractable text"));
}

// ── Cancellation: document deleted while its task is in flight ──

/// Provider that deletes the owning document mid-generation, then returns a
/// valid response. Exercises the check-then-act guard in front of card
/// persistence.
struct DeletingProvider {
    documents: Arc<MemoryDocumentRepo>,
    document_id: std::sync::Mutex<String>,
}

#[async_trait]
impl AiProvider for DeletingProvider {
    fn name(&self) -> &str {
        "deleting-stub"
    }

    fn budget_chars(&self) -> usize {
        8000
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        let id = self.document_id.lock().unwrap().clone();
        self.documents.delete(&id).await.ok();
        Ok(flashcards_reply(&[("Q?", "doomed.txt - Page 1")]))
    }
}

#[tokio::test]
async fn document_deleted_mid_flight_discards_cards() {
    // Assembled by hand: the provider needs the same repo the queue uses.
    let documents = Arc::new(MemoryDocumentRepo::new());
    let provider = Arc::new(DeletingProvider {
        documents: Arc::clone(&documents),
        document_id: std::sync::Mutex::new(String::new()),
    });
    let world = build_world_with(Arc::clone(&provider), documents);

    let document = world.upload("doomed.txt", b"Some content to study.").await;
    *provider.document_id.lock().unwrap() = document.id.clone();

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.last_error.as_ref().unwrap().contains("deleted"));
    // No orphaned cards were written.
    assert_eq!(world.cards.count(), 0);
    assert!(world.documents.find(&document.id).await.unwrap().is_none());
}

fn build_world_with(
    provider: Arc<DeletingProvider>,
    documents: Arc<MemoryDocumentRepo>,
) -> TestWorld {
    use cardsmith::{
        CardRepository, FileStore, GenerationConfig, GenerationSettings, MemoryCardRepo,
        MemoryFileStore, Pipeline, TaskQueue,
    };
    use std::time::Duration;

    let files = Arc::new(MemoryFileStore::new());
    let cards = Arc::new(MemoryCardRepo::new());

    let pipeline = Pipeline::new(
        provider as Arc<dyn AiProvider>,
        Arc::clone(&files) as Arc<dyn FileStore>,
        GenerationSettings {
            max_cards: 20,
            generate_timeout: Duration::from_secs(5),
        },
    );

    let generation = GenerationConfig {
        max_cards: 20,
        max_attempts: 3,
        backoff_base_secs: 0,
        generate_timeout_secs: 5,
        task_timeout_secs: 30,
        worker_count: 1,
    };

    let queue = TaskQueue::start(
        pipeline,
        Arc::clone(&documents) as Arc<dyn DocumentRepository>,
        Arc::clone(&cards) as Arc<dyn CardRepository>,
        &generation,
    );

    TestWorld {
        queue,
        files,
        documents,
        cards,
        stub: Arc::new(cardsmith::StubProvider::new()),
    }
}

// ── Whole-task ceiling ──

/// Provider that never answers within the task timeout.
struct StallingProvider;

#[async_trait]
impl AiProvider for StallingProvider {
    fn name(&self) -> &str {
        "stalling-stub"
    }

    fn budget_chars(&self) -> usize {
        8000
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        Ok("unreachable".to_string())
    }
}

#[tokio::test]
async fn stalled_task_is_forcibly_failed_not_left_processing() {
    use cardsmith::{
        CardRepository, FileStore, GenerationConfig, GenerationSettings, MemoryCardRepo,
        MemoryFileStore, Pipeline, TaskQueue,
    };
    use std::time::Duration;

    let files = Arc::new(MemoryFileStore::new());
    let documents = Arc::new(MemoryDocumentRepo::new());
    let cards = Arc::new(MemoryCardRepo::new());

    let pipeline = Pipeline::new(
        Arc::new(StallingProvider) as Arc<dyn AiProvider>,
        Arc::clone(&files) as Arc<dyn FileStore>,
        GenerationSettings {
            max_cards: 20,
            generate_timeout: Duration::from_secs(300),
        },
    );

    let generation = GenerationConfig {
        max_cards: 20,
        max_attempts: 3,
        backoff_base_secs: 0,
        generate_timeout_secs: 300,
        task_timeout_secs: 1,
        worker_count: 1,
    };

    let queue = TaskQueue::start(
        pipeline,
        Arc::clone(&documents) as Arc<dyn DocumentRepository>,
        Arc::clone(&cards) as Arc<dyn CardRepository>,
        &generation,
    );

    let world = TestWorld {
        queue,
        files,
        documents,
        cards,
        stub: Arc::new(cardsmith::StubProvider::new()),
    };

    let document = world.upload("slow.txt", b"content").await;
    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.last_error.as_ref().unwrap().contains("timed out"));

    let updated = world.document(&document.id).await;
    assert_eq!(updated.status, DocumentStatus::Failed);
}

// ── Card budget across chunks ──

#[tokio::test]
async fn card_budget_caps_across_chunks_in_response_order() {
    let world = WorldBuilder::new().budget_chars(2200).max_cards(3).start();
    let document = world.upload("handbook.txt", &text_fixture(2)).await;

    world.stub.enqueue_response(flashcards_reply(&[
        ("C1?", "handbook.txt - Page 1"),
        ("C2?", "handbook.txt - Page 1"),
    ]));
    world.stub.enqueue_response(flashcards_reply(&[
        ("C3?", "handbook.txt - Page 2"),
        ("C4?", "handbook.txt - Page 2"),
    ]));

    let task = world.process(&document.id).await;

    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.cards_generated, 3);

    let cards = world.cards.cards();
    let questions: Vec<&str> = cards.iter().map(|(_, c)| c.question()).collect();
    assert_eq!(questions, vec!["C1?", "C2?", "C3?"]);
}
