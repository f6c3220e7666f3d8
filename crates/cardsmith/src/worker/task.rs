use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Lifecycle of one asynchronous generation task. Reported to collaborators
/// through task-status lookups; independent of, but mirrored into, the
/// owning document's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Started,
    Retrying,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingTask {
    pub id: String,
    pub document_id: String,
    pub status: TaskStatus,
    /// Number of pipeline attempts begun so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Cards persisted on success.
    pub cards_generated: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingTask {
    pub fn new(document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            cards_generated: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// In-memory task registry shared between the queue and its workers.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, ProcessingTask>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: ProcessingTask) {
        self.write_lock().insert(task.id.clone(), task);
    }

    pub fn get(&self, task_id: &str) -> Option<ProcessingTask> {
        self.read_lock().get(task_id).cloned()
    }

    pub fn all(&self) -> Vec<ProcessingTask> {
        let mut tasks: Vec<ProcessingTask> = self.read_lock().values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub fn mark_started(&self, task_id: &str, attempt: u32) {
        self.with_task(task_id, |task| {
            task.status = TaskStatus::Started;
            task.attempts = attempt;
        });
    }

    pub fn mark_retrying(&self, task_id: &str, attempt: u32, error: &str) {
        self.with_task(task_id, |task| {
            task.status = TaskStatus::Retrying;
            task.attempts = attempt;
            task.last_error = Some(error.to_string());
        });
    }

    pub fn mark_succeeded(&self, task_id: &str, cards_generated: usize) {
        self.with_task(task_id, |task| {
            task.status = TaskStatus::Succeeded;
            task.cards_generated = cards_generated;
            task.last_error = None;
        });
    }

    pub fn mark_failed(&self, task_id: &str, error: &str) {
        self.with_task(task_id, |task| {
            task.status = TaskStatus::Failed;
            task.last_error = Some(error.to_string());
        });
    }

    fn with_task<F: FnOnce(&mut ProcessingTask)>(&self, task_id: &str, f: F) {
        let mut tasks = self.write_lock();
        match tasks.get_mut(task_id) {
            Some(task) => {
                f(task);
                task.updated_at = Utc::now();
            }
            None => warn!(task_id, "update for unknown task"),
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ProcessingTask>> {
        match self.tasks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("task store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ProcessingTask>> {
        match self.tasks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("task store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
