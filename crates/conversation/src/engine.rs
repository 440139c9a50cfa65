//! Conversation engine: graph execution plus persistence
//!
//! Wraps the pure graph with checkpointing: the intermediate state is saved
//! after the user message is merged and after every completed node, so a
//! crash mid-turn loses at most the node in flight. Per-conversation mutual
//! exclusion keeps turns for one conversation strictly sequential while
//! different conversations run in parallel.

use crate::graph::{NodeKind, RouteDecision};
use crate::nodes::{self, NodeContext};
use finsight_common::config::AppConfig;
use finsight_common::errors::{AppError, Result};
use finsight_common::llm::LlmClient;
use finsight_common::models::{Citation, ConversationState, Message, MessageRole};
use finsight_common::store::{ConversationStore, DocumentRepository};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Assistant message used when a turn cannot produce a real answer.
const APOLOGY_TEXT: &str = "I apologize, but I was unable to process your request. \
     Please try again or rephrase your question.";

/// The result of one processed turn.
///
/// `turn_failed` is non-fatal: the apology message has been committed and
/// the conversation remains usable for subsequent turns.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub turn_failed: bool,
    /// The node failure behind a failed turn, as display text.
    pub error: Option<String>,
}

/// Executes conversation turns against the store, repository and LLM
/// collaborator injected at construction.
pub struct ConversationEngine {
    store: Arc<dyn ConversationStore>,
    nodes: NodeContext,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        repo: Arc<dyn DocumentRepository>,
        llm: Arc<dyn LlmClient>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            nodes: NodeContext { llm, repo, config },
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Per-conversation lock handle. The tokio mutex grants in FIFO order,
    /// so back-to-back turns execute in submission order.
    fn lock_for(&self, conversation_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(conversation_id).or_default().clone()
    }

    pub async fn create_conversation(&self, title: Option<String>) -> Result<ConversationState> {
        let mut state = ConversationState::new(Uuid::new_v4(), title);
        state.version = self.store.save(&state).await?;
        info!(conversation_id = %state.conversation_id, "Conversation created");
        Ok(state)
    }

    /// Attach documents to a conversation: merges their summaries and
    /// citations into the state and marks them active. Unknown document ids
    /// are rejected before any state mutation.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn add_documents(
        &self,
        conversation_id: Uuid,
        document_ids: &[Uuid],
    ) -> Result<ConversationState> {
        let lock = self.lock_for(conversation_id);
        let _turn = lock.lock().await;

        let mut state = self.load_state(conversation_id).await?;

        let mut documents = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            let document =
                self.nodes.repo.get(*id).await?.ok_or_else(|| AppError::DocumentNotFound {
                    id: id.to_string(),
                })?;
            documents.push(document);
        }

        state.add_documents(&documents, self.nodes.config.graph.summary_chars);
        state.version = self.store.save(&state).await?;
        info!(attached = documents.len(), "Documents attached");
        Ok(state)
    }

    /// Process one user turn: run the graph to END and return the assistant
    /// message with its citations.
    #[instrument(skip(self, content), fields(conversation_id = %conversation_id))]
    pub async fn process_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        explicit_document_ids: &[Uuid],
    ) -> Result<TurnOutcome> {
        if content.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Message content must not be empty".to_string(),
                field: Some("content".to_string()),
            });
        }

        let lock = self.lock_for(conversation_id);
        let _turn = lock.lock().await;

        let mut state = self.load_state(conversation_id).await?;

        // Validate referenced documents before mutating anything.
        let mut referenced = Vec::with_capacity(explicit_document_ids.len());
        for id in explicit_document_ids {
            let document =
                self.nodes.repo.get(*id).await?.ok_or_else(|| AppError::DocumentNotFound {
                    id: id.to_string(),
                })?;
            referenced.push(document);
        }

        state.turn_context.clear();
        state.messages.push(Message::user(content));
        state.add_documents(&referenced, self.nodes.config.graph.summary_chars);

        // Crash-safety checkpoint before the graph runs.
        state.version = self.store.save(&state).await?;
        let baseline = state.messages.len();

        let failure = self.run_graph(&mut state).await?;

        let appended = state.messages[baseline..]
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .cloned();

        let message = match appended {
            Some(message) => message,
            None => {
                let apology = Message::assistant(APOLOGY_TEXT, Vec::new());
                state.messages.push(apology.clone());
                apology
            }
        };

        state.version = self.store.save(&state).await?;

        let turn_failed = failure.is_some();
        if let Some(ref error) = failure {
            warn!(error = %error, "Turn failed, apology committed");
        } else {
            info!(
                citations = message.citations_used.len(),
                "Turn completed"
            );
        }

        Ok(TurnOutcome {
            message,
            turn_failed,
            error: failure.map(|e| e.to_string()),
        })
    }

    /// Drive the graph from ROUTER to END, persisting after each node.
    ///
    /// A collaborator failure aborts the remaining nodes and is returned for
    /// apology handling; infrastructure errors (store failures) propagate.
    async fn run_graph(&self, state: &mut ConversationState) -> Result<Option<AppError>> {
        let mut current = NodeKind::start();
        let mut draft: Option<(String, Vec<Citation>)> = None;

        while current != NodeKind::End {
            let mut route = RouteDecision::default();
            let result: Result<()> = match current {
                NodeKind::Router => {
                    route = nodes::run_router(&self.nodes, state).await;
                    Ok(())
                }
                NodeKind::DocumentProcessor => {
                    nodes::run_document_processor(&self.nodes, state).await
                }
                NodeKind::ResponseGenerator => {
                    match nodes::run_response_generator(&self.nodes, state).await {
                        Ok(answer) => {
                            draft = Some(answer);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                NodeKind::CitationProcessor => {
                    if let Some((text, citations_used)) = draft.take() {
                        match nodes::run_citation_processor(
                            &self.nodes,
                            state,
                            text,
                            citations_used.clone(),
                        )
                        .await
                        {
                            Ok(polished) => {
                                state
                                    .messages
                                    .push(Message::assistant(polished, citations_used));
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    } else {
                        Ok(())
                    }
                }
                NodeKind::End => Ok(()),
            };

            match result {
                Ok(()) => {
                    state.version = self.store.save(state).await?;
                    current = current.successor(route);
                }
                Err(e) if e.is_collaborator_error() => return Ok(Some(e)),
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Conversation history, newest-last, optionally limited to the most
    /// recent `limit` messages.
    pub async fn get_history(
        &self,
        conversation_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let state = self.load_state(conversation_id).await?;
        let messages = match limit {
            Some(limit) if limit < state.messages.len() => {
                state.messages[state.messages.len() - limit..].to_vec()
            }
            _ => state.messages,
        };
        Ok(messages)
    }

    pub async fn get_conversation(&self, conversation_id: Uuid) -> Result<ConversationState> {
        self.load_state(conversation_id).await
    }

    /// All conversations known to the store, oldest first.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationState>> {
        self.store.list().await
    }

    /// Remove a conversation and its turn lock. Returns whether it existed.
    ///
    /// Takes the turn lock first so an in-flight turn completes before the
    /// state disappears; the lock entry is evicted afterwards so the lock map
    /// does not grow with every conversation ever touched.
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> Result<bool> {
        let lock = self.lock_for(conversation_id);
        let _turn = lock.lock().await;

        let existed = self.store.delete(conversation_id).await?;

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&conversation_id);
        if existed {
            info!(conversation_id = %conversation_id, "Conversation deleted");
        }
        Ok(existed)
    }

    async fn load_state(&self, conversation_id: Uuid) -> Result<ConversationState> {
        self.store
            .load(conversation_id)
            .await?
            .ok_or_else(|| AppError::ConversationNotFound {
                id: conversation_id.to_string(),
            })
    }
}
