//! Canonical data model for FinSight
//!
//! Provides:
//! - Citation union type with wire-compatible serialization
//! - Document records and conversation-side summaries
//! - Messages and conversation state

mod citation;
mod conversation;
mod document;
mod message;

pub use citation::{Citation, CitationLocation, CitationProvenance};
pub use conversation::ConversationState;
pub use document::{truncate_chars, Document, DocumentStatus, DocumentSummary, DocumentType};
pub use message::{Message, MessageRole};
