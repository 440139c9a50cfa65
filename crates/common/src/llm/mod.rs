//! LLM collaborator abstraction
//!
//! The conversation graph and the extraction pipeline both consume the
//! backend through the [`LlmClient`] trait; the concrete client is injected
//! at construction time rather than held as process-wide state.

mod http;
mod mock;

pub use http::HttpLlmClient;
pub use mock::MockLlmClient;

use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One chat message in a generation request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Document content passed to the collaborator.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Plain text content.
    Text { text: String },
    /// Base64-encoded binary content with its media type.
    Base64 { media_type: String, data: String },
}

/// A typed document block attached to a generation request.
#[derive(Debug, Clone)]
pub struct DocumentBlock {
    pub title: String,
    pub source: DocumentSource,
    /// Ask the backend to attach structured citations to its answer.
    pub citations_enabled: bool,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub documents: Vec<DocumentBlock>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerateRequest {
    /// Request with a single user message and no documents.
    pub fn simple(system_prompt: impl Into<String>, user_content: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![ChatMessage::user(user_content)],
            documents: Vec::new(),
            max_tokens: 4000,
            temperature: 0.2,
        }
    }
}

/// A completion from the collaborator.
///
/// `raw_citations` carries whatever citation payloads the backend attached,
/// unparsed; callers run them through `citations::normalize`. The backend may
/// legitimately return none.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub raw_citations: Vec<Value>,
}

impl Completion {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw_citations: Vec::new(),
        }
    }
}

/// The external LLM service consumed as an opaque capability.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion>;
}
