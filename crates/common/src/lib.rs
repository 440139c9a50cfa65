//! FinSight Common Library
//!
//! Shared code for the FinSight services including:
//! - Canonical data model (citations, documents, messages, conversation state)
//! - Citation normalization and fallback synthesis
//! - LLM collaborator abstraction and HTTP client
//! - Storage traits with in-memory reference backends
//! - Error types and handling
//! - Configuration management

pub mod citations;
pub mod config;
pub mod errors;
pub mod llm;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::LlmClient;
pub use models::{Citation, ConversationState, Document, Message};
pub use store::{ConversationStore, DocumentRepository};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default text budget per document when building LLM context
pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 15_000;
