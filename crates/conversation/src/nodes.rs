//! Node implementations for the conversation graph
//!
//! Each node receives the current state, makes at most one collaborator
//! call, and returns its contribution. Persistence is the engine's job; the
//! nodes never touch the store.

use crate::context;
use crate::graph::RouteDecision;
use crate::prompts;
use finsight_common::config::AppConfig;
use finsight_common::errors::{AppError, Result};
use finsight_common::llm::{ChatMessage, Completion, GenerateRequest, LlmClient};
use finsight_common::models::{Citation, ConversationState, MessageRole};
use finsight_common::store::DocumentRepository;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turn-context key holding the document processor's digest.
pub const DIGEST_KEY: &str = "document_digest";
/// Turn-context key holding the router's decision.
pub const ROUTE_KEY: &str = "route";

/// Shared dependencies handed to every node.
pub struct NodeContext {
    pub llm: Arc<dyn LlmClient>,
    pub repo: Arc<dyn DocumentRepository>,
    pub config: AppConfig,
}

impl NodeContext {
    /// One collaborator call bounded by the configured deadline. A deadline
    /// overrun is a node failure, not a process concern.
    async fn call_llm(&self, request: GenerateRequest) -> Result<Completion> {
        let deadline = self.config.llm_deadline();
        match tokio::time::timeout(deadline, self.llm.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::CollaboratorTimeout {
                timeout_ms: deadline.as_millis() as u64,
            }),
        }
    }
}

/// Classify the user's turn. Any failure or unparseable label degrades to
/// the default route; routing never fails the turn.
pub async fn run_router(ctx: &NodeContext, state: &mut ConversationState) -> RouteDecision {
    let question = state
        .latest_user_message()
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let has_documents = !state.active_document_ids.is_empty();
    let prompt = format!(
        "Documents attached: {}\nUser message: {}",
        if has_documents { "yes" } else { "no" },
        question
    );

    let mut request = GenerateRequest::simple(prompts::ROUTER, prompt);
    request.max_tokens = 50;
    request.temperature = 0.0;

    let decision = match ctx.call_llm(request).await {
        Ok(completion) => RouteDecision::parse(&completion.text),
        Err(e) => {
            warn!(error = %e, "Routing call failed, using default route");
            RouteDecision::default()
        }
    };

    // A route into document processing makes no sense without documents.
    let decision = if decision == RouteDecision::ProcessDocuments && !has_documents {
        RouteDecision::GenerateResponse
    } else {
        decision
    };

    state.turn_context.insert(
        ROUTE_KEY.to_string(),
        serde_json::Value::String(decision.as_str().to_string()),
    );
    decision
}

/// Distill the active documents into a digest of facts relevant to the
/// pending question, stored in turn context rather than durable history.
pub async fn run_document_processor(ctx: &NodeContext, state: &mut ConversationState) -> Result<()> {
    let question = state
        .latest_user_message()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let digest = context::build_digest(state, &ctx.config.graph);
    let documents = context::build_document_blocks(state, ctx.repo.as_ref(), &ctx.config.graph).await?;

    let mut request = GenerateRequest::simple(
        prompts::DOCUMENT_PROCESSOR,
        format!("{}\n\nPending question: {}", digest, question),
    );
    request.documents = documents;
    request.max_tokens = ctx.config.llm.max_tokens;
    request.temperature = ctx.config.llm.temperature;

    let completion = ctx.call_llm(request).await?;
    debug!(chars = completion.text.len(), "Document digest produced");

    state.turn_context.insert(
        DIGEST_KEY.to_string(),
        serde_json::Value::String(completion.text),
    );
    Ok(())
}

/// Generate the answer and resolve its inline citation markers against the
/// conversation's citation pool.
pub async fn run_response_generator(
    ctx: &NodeContext,
    state: &mut ConversationState,
) -> Result<(String, Vec<Citation>)> {
    let digest = context::build_digest(state, &ctx.config.graph);
    let documents = context::build_document_blocks(state, ctx.repo.as_ref(), &ctx.config.graph).await?;

    let mut system_prompt = format!("{}\n\n{}", prompts::RESPONSE_GENERATOR, digest);
    if let Some(extracted) = state
        .turn_context
        .get(DIGEST_KEY)
        .and_then(serde_json::Value::as_str)
    {
        system_prompt.push_str("\n\nFacts extracted from the documents:\n");
        system_prompt.push_str(extracted);
    }

    let mut messages: Vec<ChatMessage> = state
        .messages
        .iter()
        .map(|m| ChatMessage {
            role: match m.role {
                MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        })
        .collect();
    if messages.is_empty() {
        messages.push(ChatMessage::user(""));
    }

    let request = GenerateRequest {
        system_prompt,
        messages,
        documents,
        max_tokens: ctx.config.llm.max_tokens,
        temperature: ctx.config.llm.temperature,
    };

    let completion = ctx.call_llm(request).await?;
    let citations_used = resolve_citation_markers(&completion.text, state);
    debug!(
        resolved = citations_used.len(),
        "Answer generated with resolved citations"
    );

    Ok((completion.text, citations_used))
}

/// Polish citation formatting in the drafted answer, returning the text the
/// engine commits as the assistant message.
///
/// A successful polish that tries to introduce citations outside the
/// resolved list, or that comes back empty, is rejected and the draft kept.
/// A failed collaborator call is a node failure and aborts the turn.
pub async fn run_citation_processor(
    ctx: &NodeContext,
    state: &ConversationState,
    draft: String,
    citations_used: Vec<Citation>,
) -> Result<String> {
    if citations_used.is_empty() {
        return Ok(draft);
    }

    let listing = citations_used
        .iter()
        .filter_map(|c| c.id.as_deref())
        .collect::<Vec<_>>()
        .join(", ");
    let mut request = GenerateRequest::simple(
        prompts::CITATION_PROCESSOR,
        format!("Citations used: {}\n\nAnswer:\n{}", listing, draft),
    );
    request.max_tokens = ctx.config.llm.max_tokens;
    request.temperature = 0.0;

    let completion = ctx.call_llm(request).await?;
    if completion.text.trim().is_empty() {
        return Ok(draft);
    }

    let reresolved = resolve_citation_markers(&completion.text, state);
    let introduced = reresolved
        .iter()
        .any(|c| !citations_used.iter().any(|used| used.same_citation(c)));
    if introduced {
        warn!("Citation polish introduced new citations, keeping draft");
        return Ok(draft);
    }

    Ok(completion.text)
}

/// Scan answer text for `[Citation: <id>]` markers and resolve each against
/// the conversation's citation pool. Unresolvable markers are dropped
/// silently; duplicates collapse to one entry.
pub fn resolve_citation_markers(text: &str, state: &ConversationState) -> Vec<Citation> {
    let marker = Regex::new(r"\[Citation:\s*([^\]]+)\]").unwrap();
    let mut resolved: Vec<Citation> = Vec::new();

    for captures in marker.captures_iter(text) {
        let Some(id) = captures.get(1) else { continue };
        let id = id.as_str().trim();
        let Some(citation) = state.citation_by_id(id) else {
            debug!(marker = id, "Dropping unresolvable citation marker");
            continue;
        };
        if !resolved.iter().any(|c| c.same_citation(citation)) {
            resolved.push(citation.clone());
        }
    }

    resolved
}
