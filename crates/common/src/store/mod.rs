//! Storage traits and in-memory reference backends
//!
//! Conversation state and documents are persisted behind small async traits
//! so the engine and pipeline stay independent of the storage mechanism. The
//! in-memory backends are the reference implementation and back the test
//! suite and development deployments.

use crate::errors::{AppError, Result};
use crate::models::{Citation, ConversationState, Document, DocumentStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Durable, keyed conversation state.
///
/// Every successful save bumps the stored version by one and returns the new
/// version; callers that need optimistic concurrency use `save_if_version`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<ConversationState>>;

    /// Atomically persist the state, bumping its version. Returns the new
    /// version.
    async fn save(&self, state: &ConversationState) -> Result<u64>;

    /// Compare-and-swap save: succeeds only when the stored version equals
    /// `expected` (0 for a new conversation).
    async fn save_if_version(&self, state: &ConversationState, expected: u64) -> Result<u64>;

    /// All stored conversations, oldest first.
    async fn list(&self) -> Result<Vec<ConversationState>>;

    /// Remove a conversation. Returns whether it existed.
    async fn delete(&self, conversation_id: Uuid) -> Result<bool>;
}

/// CRUD for document records and their citations.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: Document) -> Result<()>;

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>>;

    /// Replace the stored record. Errors if the document is unknown.
    async fn update(&self, document: Document) -> Result<()>;

    /// All stored documents, oldest upload first.
    async fn list(&self) -> Result<Vec<Document>>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, document_id: Uuid) -> Result<bool>;

    async fn update_status(&self, document_id: Uuid, status: DocumentStatus) -> Result<()>;

    /// Append citations to a document's pool.
    async fn add_citations(&self, document_id: Uuid, citations: Vec<Citation>) -> Result<()>;

    async fn get_citations(&self, document_id: Uuid) -> Result<Vec<Citation>>;
}

/// In-memory conversation store.
#[derive(Default, Clone)]
pub struct MemoryConversationStore {
    conversations: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, conversation_id: Uuid) -> Result<Option<ConversationState>> {
        Ok(self.conversations.read().await.get(&conversation_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<u64> {
        let mut conversations = self.conversations.write().await;
        let version = conversations
            .get(&state.conversation_id)
            .map(|stored| stored.version)
            .unwrap_or(0)
            + 1;
        let mut stored = state.clone();
        stored.version = version;
        conversations.insert(state.conversation_id, stored);
        Ok(version)
    }

    async fn save_if_version(&self, state: &ConversationState, expected: u64) -> Result<u64> {
        let mut conversations = self.conversations.write().await;
        let found = conversations
            .get(&state.conversation_id)
            .map(|stored| stored.version)
            .unwrap_or(0);
        if found != expected {
            return Err(AppError::StaleVersion {
                id: state.conversation_id.to_string(),
                expected,
                found,
            });
        }
        let version = expected + 1;
        let mut stored = state.clone();
        stored.version = version;
        conversations.insert(state.conversation_id, stored);
        Ok(version)
    }

    async fn list(&self) -> Result<Vec<ConversationState>> {
        let conversations = self.conversations.read().await;
        let mut all: Vec<ConversationState> = conversations.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }

    async fn delete(&self, conversation_id: Uuid) -> Result<bool> {
        Ok(self
            .conversations
            .write()
            .await
            .remove(&conversation_id)
            .is_some())
    }
}

/// In-memory document repository.
#[derive(Default, Clone)]
pub struct MemoryDocumentRepository {
    documents: Arc<RwLock<HashMap<Uuid, Document>>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, document: Document) -> Result<()> {
        self.documents.write().await.insert(document.id, document);
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&document_id).cloned())
    }

    async fn update(&self, document: Document) -> Result<()> {
        let mut documents = self.documents.write().await;
        if !documents.contains_key(&document.id) {
            return Err(AppError::DocumentNotFound {
                id: document.id.to_string(),
            });
        }
        documents.insert(document.id, document);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut all: Vec<Document> = documents.values().cloned().collect();
        all.sort_by_key(|d| d.uploaded_at);
        Ok(all)
    }

    async fn delete(&self, document_id: Uuid) -> Result<bool> {
        Ok(self.documents.write().await.remove(&document_id).is_some())
    }

    async fn update_status(&self, document_id: Uuid, status: DocumentStatus) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&document_id)
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;
        document.status = status;
        Ok(())
    }

    async fn add_citations(&self, document_id: Uuid, citations: Vec<Citation>) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&document_id)
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;
        document.citations.extend(citations);
        Ok(())
    }

    async fn get_citations(&self, document_id: Uuid) -> Result<Vec<Citation>> {
        let documents = self.documents.read().await;
        let document = documents
            .get(&document_id)
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })?;
        Ok(document.citations.clone())
    }
}
