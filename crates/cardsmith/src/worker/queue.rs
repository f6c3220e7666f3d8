use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::GenerationConfig;
use crate::error::QueueError;
use crate::model::{Document, DocumentStatus};
use crate::pipeline::{GenerationOutcome, Pipeline};
use crate::store::{CardRepository, DocumentRepository};
use crate::worker::task::{ProcessingTask, TaskStore};

/// Retry backoff never grows past this.
const MAX_BACKOFF_SECS: u64 = 60;

struct QueuedJob {
    task_id: String,
    document_id: String,
}

/// Asynchronous task queue driving the generation pipeline on a tokio
/// worker pool.
///
/// Submission is fire-and-forget: `enqueue` returns a task id immediately
/// and all pipeline work happens on a worker. At most one task per document
/// id is in flight at a time, so two runs can never race on the same
/// document's status or double-create cards.
///
/// Must be started from within a tokio runtime.
pub struct TaskQueue {
    sender: mpsc::Sender<QueuedJob>,
    tasks: Arc<TaskStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskQueue {
    pub fn start(
        pipeline: Pipeline,
        documents: Arc<dyn DocumentRepository>,
        cards: Arc<dyn CardRepository>,
        generation: &GenerationConfig,
    ) -> Self {
        let worker_count = generation.worker_count.max(1);
        let (sender, receiver) = mpsc::channel::<QueuedJob>(worker_count * 2);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let tasks = Arc::new(TaskStore::new());
        let in_flight: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        let orchestrator = Arc::new(Orchestrator {
            pipeline,
            documents,
            cards,
            tasks: Arc::clone(&tasks),
            max_attempts: generation.max_attempts,
            backoff_base_secs: generation.backoff_base_secs,
            task_timeout: Duration::from_secs(generation.task_timeout_secs),
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let orchestrator = Arc::clone(&orchestrator);
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(run_worker(worker_id, receiver, orchestrator, in_flight))
            })
            .collect();

        info!(worker_count, "started generation workers");

        Self {
            sender,
            tasks,
            in_flight,
            workers,
        }
    }

    /// Submits a document for processing and returns the task id. Rejects a
    /// document that is already queued or in flight.
    pub async fn enqueue(&self, document_id: &str) -> Result<String, QueueError> {
        {
            let mut in_flight = lock_in_flight(&self.in_flight);
            if !in_flight.insert(document_id.to_string()) {
                return Err(QueueError::DocumentBusy(document_id.to_string()));
            }
        }

        let task = ProcessingTask::new(document_id);
        let task_id = task.id.clone();
        self.tasks.insert(task);

        let job = QueuedJob {
            task_id: task_id.clone(),
            document_id: document_id.to_string(),
        };

        if self.sender.send(job).await.is_err() {
            lock_in_flight(&self.in_flight).remove(document_id);
            self.tasks.mark_failed(&task_id, "task queue is closed");
            return Err(QueueError::Closed);
        }

        debug!(task_id = %task_id, document_id, "task enqueued");

        Ok(task_id)
    }

    pub fn task_status(&self, task_id: &str) -> Option<ProcessingTask> {
        self.tasks.get(task_id)
    }

    pub fn tasks(&self) -> Arc<TaskStore> {
        Arc::clone(&self.tasks)
    }

    /// Stops accepting work and waits for in-flight tasks to finish.
    pub async fn shutdown(self) {
        info!("shutting down task queue");
        drop(self.sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!(worker = i, "worker panicked: {}", e);
            }
        }

        info!("all generation workers stopped");
    }
}

fn lock_in_flight(
    in_flight: &Arc<Mutex<HashSet<String>>>,
) -> std::sync::MutexGuard<'_, HashSet<String>> {
    match in_flight.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("in-flight set lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>,
    orchestrator: Arc<Orchestrator>,
    in_flight: Arc<Mutex<HashSet<String>>>,
) {
    debug!(worker_id, "worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(job) = job else {
            break;
        };

        let document_id = job.document_id.clone();
        orchestrator.process(job).await;
        lock_in_flight(&in_flight).remove(&document_id);
    }

    debug!(worker_id, "worker stopped");
}

/// Runs one task through the pipeline with retries, and owns every side
/// effect: document status transitions, card persistence, task bookkeeping.
struct Orchestrator {
    pipeline: Pipeline,
    documents: Arc<dyn DocumentRepository>,
    cards: Arc<dyn CardRepository>,
    tasks: Arc<TaskStore>,
    max_attempts: u32,
    backoff_base_secs: u64,
    task_timeout: Duration,
}

impl Orchestrator {
    async fn process(&self, job: QueuedJob) {
        let QueuedJob {
            task_id,
            document_id,
        } = job;

        let mut document = match self.documents.find(&document_id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!(%document_id, "enqueued document does not exist");
                self.tasks
                    .mark_failed(&task_id, &format!("document not found: {}", document_id));
                return;
            }
            Err(e) => {
                error!(%document_id, "failed to load document: {}", e);
                self.tasks.mark_failed(&task_id, &e.to_string());
                return;
            }
        };

        match document.status {
            DocumentStatus::Completed => {
                info!(%document_id, "document already completed, nothing to do");
                self.tasks.mark_succeeded(&task_id, 0);
                return;
            }
            DocumentStatus::Processing => {
                warn!(%document_id, "document already marked processing");
                self.tasks
                    .mark_failed(&task_id, "document is already being processed");
                return;
            }
            DocumentStatus::Uploaded | DocumentStatus::Failed => {}
        }

        document.mark_processing();
        if let Err(e) = self.documents.update(&document).await {
            error!(%document_id, "failed to mark document processing: {}", e);
            self.tasks.mark_failed(&task_id, &e.to_string());
            return;
        }

        for attempt in 1..=self.max_attempts {
            self.tasks.mark_started(&task_id, attempt);

            match tokio::time::timeout(self.task_timeout, self.pipeline.run(&document)).await {
                Ok(Ok(outcome)) => {
                    self.finalize(&task_id, &mut document, outcome).await;
                    return;
                }
                Ok(Err(error)) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = backoff_delay(self.backoff_base_secs, attempt);
                    warn!(
                        document_id = %document.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable failure, rescheduling: {}",
                        error
                    );
                    self.tasks
                        .mark_retrying(&task_id, attempt, &error.to_string());
                    tokio::time::sleep(delay).await;
                }
                Ok(Err(error)) => {
                    self.fail(&task_id, &mut document, &error.to_string()).await;
                    return;
                }
                Err(_) => {
                    let message = format!(
                        "processing timed out after {}s",
                        self.task_timeout.as_secs()
                    );
                    self.fail(&task_id, &mut document, &message).await;
                    return;
                }
            }
        }
    }

    async fn finalize(&self, task_id: &str, document: &mut Document, outcome: GenerationOutcome) {
        // The owning document may have been deleted while the pipeline ran;
        // check right before the one external write and discard if so.
        match self.documents.find(&document.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(
                    document_id = %document.id,
                    discarded = outcome.cards.len(),
                    "document deleted during processing, discarding cards"
                );
                self.tasks
                    .mark_failed(task_id, "document was deleted during processing");
                return;
            }
            Err(e) => {
                error!(document_id = %document.id, "delete-guard lookup failed: {}", e);
                self.tasks.mark_failed(task_id, &e.to_string());
                return;
            }
        }

        let deck_id = document
            .deck_id
            .clone()
            .unwrap_or_else(|| document.id.clone());

        let mut persisted = 0usize;
        for card in &outcome.cards {
            match self.cards.create_card(&deck_id, card).await {
                Ok(()) => persisted += 1,
                Err(e) => error!(%deck_id, "failed to persist flashcard: {}", e),
            }
        }

        document.mark_completed(deck_id);
        if let Err(e) = self.documents.update(document).await {
            error!(document_id = %document.id, "failed to mark document completed: {}", e);
        }

        self.tasks.mark_succeeded(task_id, persisted);

        info!(
            document_id = %document.id,
            cards = persisted,
            warnings = outcome.warnings.len(),
            "document processing completed"
        );
    }

    async fn fail(&self, task_id: &str, document: &mut Document, message: &str) {
        warn!(document_id = %document.id, "document processing failed: {}", message);

        document.mark_failed(message);
        if let Err(e) = self.documents.update(document).await {
            error!(document_id = %document.id, "failed to mark document failed: {}", e);
        }

        self.tasks.mark_failed(task_id, message);
    }
}

/// Exponential backoff computed from the attempt number, with ±20% jitter.
/// Deterministic in shape given the attempt count; the jitter only spreads
/// simultaneous retries apart.
fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let raw = base_secs.saturating_mul(1u64 << exponent);
    let capped = raw.min(MAX_BACKOFF_SECS);

    if capped == 0 {
        return Duration::ZERO;
    }

    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_secs_f64(capped as f64 * jitter)
}
