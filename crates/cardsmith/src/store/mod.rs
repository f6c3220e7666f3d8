//! Contracts consumed from the surrounding application: byte retrieval for
//! uploaded files and persistence for documents and cards. The pipeline only
//! depends on these traits; the filesystem and in-memory implementations
//! here cover local deployments and tests.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Document, FlashcardData};

pub use local::LocalFileStore;
pub use memory::{MemoryCardRepo, MemoryDocumentRepo, MemoryFileStore};

/// Byte retrieval from the storage backend that holds uploaded documents.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn get_file(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

/// Document persistence owned by the surrounding application.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: Document) -> Result<(), StoreError>;
    async fn find(&self, document_id: &str) -> Result<Option<Document>, StoreError>;
    async fn update(&self, document: &Document) -> Result<(), StoreError>;
    async fn delete(&self, document_id: &str) -> Result<(), StoreError>;
}

/// Card persistence owned by the surrounding application.
#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn create_card(&self, deck_id: &str, card: &FlashcardData) -> Result<(), StoreError>;
}
