//! FinSight Conversation Engine
//!
//! Executes the per-turn conversation graph:
//! - Router: classifies the user's turn and picks the next node
//! - Document Processor: distills active documents into a turn digest
//! - Response Generator: produces the answer and resolves citation markers
//! - Citation Processor: polishes citation formatting and commits the turn
//!
//! The graph itself is a pure state machine; persistence happens in the
//! engine wrapper between node transitions.

pub mod context;
pub mod engine;
pub mod graph;
pub mod nodes;
pub mod prompts;

pub use engine::{ConversationEngine, TurnOutcome};
pub use graph::{NodeKind, RouteDecision};
