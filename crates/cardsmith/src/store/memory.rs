//! In-memory repository implementations. Used by the test suite and by
//! embedding applications that bring their own persistence later.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::model::{Document, FlashcardData};
use crate::store::{CardRepository, DocumentRepository, FileStore};

#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let mut files = match self.files.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("file store lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        files.insert(path.into(), bytes.into());
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn get_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let files = match self.files.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("file store lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::Repository(format!("no such file: {}", path)))
    }
}

#[derive(Default)]
pub struct MemoryDocumentRepo {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryDocumentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Document>> {
        match self.documents.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("document repo lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Document>> {
        match self.documents.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("document repo lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepo {
    async fn insert(&self, document: Document) -> Result<(), StoreError> {
        self.write_lock().insert(document.id.clone(), document);
        Ok(())
    }

    async fn find(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.read_lock().get(document_id).cloned())
    }

    async fn update(&self, document: &Document) -> Result<(), StoreError> {
        let mut documents = self.write_lock();
        if !documents.contains_key(&document.id) {
            return Err(StoreError::Repository(format!(
                "document not found: {}",
                document.id
            )));
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<(), StoreError> {
        self.write_lock().remove(document_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCardRepo {
    cards: RwLock<Vec<(String, FlashcardData)>>,
}

impl MemoryCardRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// All persisted cards as (deck_id, card) pairs, in insertion order.
    pub fn cards(&self) -> Vec<(String, FlashcardData)> {
        match self.cards.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn!("card repo lock poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    pub fn count(&self) -> usize {
        self.cards().len()
    }
}

#[async_trait]
impl CardRepository for MemoryCardRepo {
    async fn create_card(&self, deck_id: &str, card: &FlashcardData) -> Result<(), StoreError> {
        let mut cards = match self.cards.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("card repo lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        cards.push((deck_id.to_string(), card.clone()));
        Ok(())
    }
}
