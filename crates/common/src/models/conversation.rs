//! Durable per-conversation state

use super::{Citation, Document, DocumentSummary, Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// The durable state of one conversation thread.
///
/// Exclusively owned by the conversation store; the graph engine works on a
/// snapshot and writes it back at defined checkpoints. `turn_context` is
/// transient scratch data and is cleared at the start of every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: Uuid,
    pub title: String,

    /// Ordered, append-only message history.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Summaries of documents attached to the conversation.
    #[serde(default)]
    pub documents: Vec<DocumentSummary>,

    /// The conversation's citation pool.
    #[serde(default)]
    pub citations: Vec<Citation>,

    /// Documents currently in scope for context assembly.
    #[serde(default)]
    pub active_document_ids: BTreeSet<Uuid>,

    /// Per-turn scratch data (routing decision, document digest). Not part of
    /// durable history semantics.
    #[serde(default)]
    pub turn_context: HashMap<String, serde_json::Value>,

    /// Bumped by the store on every save; used for compare-and-swap.
    #[serde(default)]
    pub version: u64,

    pub created_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(conversation_id: Uuid, title: Option<String>) -> Self {
        let title = title.unwrap_or_else(|| {
            format!("Conversation {}", &conversation_id.to_string()[..8])
        });
        Self {
            conversation_id,
            title,
            messages: Vec::new(),
            documents: Vec::new(),
            citations: Vec::new(),
            active_document_ids: BTreeSet::new(),
            turn_context: HashMap::new(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Merge documents into the conversation: summaries, citation pool and
    /// active set. Already-known documents are skipped.
    pub fn add_documents(&mut self, documents: &[Document], summary_chars: usize) {
        for doc in documents {
            if self.documents.iter().any(|d| d.id == doc.id) {
                continue;
            }
            self.documents.push(doc.summarize(summary_chars));
            for citation in &doc.citations {
                if !self
                    .citations
                    .iter()
                    .any(|existing| existing.same_citation(citation))
                {
                    self.citations.push(citation.clone());
                }
            }
            self.active_document_ids.insert(doc.id);
        }
    }

    /// Look up a pool citation by id.
    pub fn citation_by_id(&self, id: &str) -> Option<&Citation> {
        self.citations
            .iter()
            .find(|c| c.id.as_deref() == Some(id))
    }

    /// Most recent user message, if any.
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }

    /// Most recent assistant message, if any.
    pub fn latest_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }
}
