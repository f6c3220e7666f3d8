//! Scripted provider for tests and collaborator harnesses.
//!
//! Lets callers exercise the full pipeline without network access by
//! queueing canned responses or errors, and records every prompt it was
//! asked to generate from.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::prompt::Prompt;
use crate::provider::{AiProvider, ProviderError};

pub struct StubProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<Prompt>>,
    calls: AtomicUsize,
    budget_chars: usize,
    healthy: bool,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            budget_chars: 8000,
            healthy: true,
        }
    }

    /// Overrides the chunking budget, letting tests force multi-chunk runs
    /// with small documents.
    pub fn with_budget(mut self, budget_chars: usize) -> Self {
        self.budget_chars = budget_chars;
        self
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    /// Queues a raw response; replies are consumed in FIFO order.
    pub fn enqueue_response(&self, raw: impl Into<String>) {
        self.lock_replies().push_back(Ok(raw.into()));
    }

    pub fn enqueue_error(&self, error: ProviderError) {
        self.lock_replies().push_back(Err(error));
    }

    /// Number of `generate` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        match self.prompts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, ProviderError>>> {
        match self.replies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.prompts.lock() {
            Ok(mut guard) => guard.push(prompt.clone()),
            Err(poisoned) => poisoned.into_inner().push(prompt.clone()),
        }

        self.lock_replies()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }
}
