//! Conversation handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use finsight_common::errors::{AppError, Result};
use finsight_common::models::{Citation, Message};

/// Create conversation request
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Create conversation response
#[derive(Serialize)]
pub struct CreateConversationResponse {
    pub conversation_id: Uuid,
    pub title: String,
    pub created_at: String,
}

/// Attach documents request
#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub document_ids: Vec<Uuid>,
}

/// Attach documents response
#[derive(Serialize)]
pub struct AddDocumentsResponse {
    pub conversation_id: Uuid,
    pub active_document_ids: Vec<Uuid>,
    pub citation_count: usize,
}

/// Send message request
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    /// Documents to pull into scope for this turn.
    #[serde(default)]
    pub document_ids: Vec<Uuid>,
}

/// Send message response: the assistant turn plus its citations.
#[derive(Serialize)]
pub struct SendMessageResponse {
    pub message: MessageBody,
    /// True when the turn degraded to an apology; the conversation remains
    /// usable.
    pub turn_failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct MessageBody {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub citations_used: Vec<Citation>,
    pub timestamp: String,
}

impl From<Message> for MessageBody {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            role: match message.role {
                finsight_common::models::MessageRole::User => "user".to_string(),
                finsight_common::models::MessageRole::Assistant => "assistant".to_string(),
            },
            content: message.content,
            citations_used: message.citations_used,
            timestamp: message.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// One conversation in a listing
#[derive(Serialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub title: String,
    pub message_count: usize,
    pub document_count: usize,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub conversation_id: Uuid,
    pub messages: Vec<MessageBody>,
}

/// Create a new conversation
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreateConversationResponse>)> {
    if let Some(title) = &request.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Title must not be empty when provided".to_string(),
                field: Some("title".to_string()),
            });
        }
    }

    let conversation = state.engine.create_conversation(request.title).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation_id: conversation.conversation_id,
            title: conversation.title,
            created_at: conversation.created_at.to_rfc3339(),
        }),
    ))
}

/// List all conversations, oldest first
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ListConversationsResponse>> {
    let conversations = state.engine.list_conversations().await?;

    Ok(Json(ListConversationsResponse {
        conversations: conversations
            .into_iter()
            .map(|c| ConversationSummary {
                conversation_id: c.conversation_id,
                title: c.title,
                message_count: c.messages.len(),
                document_count: c.documents.len(),
                created_at: c.created_at.to_rfc3339(),
            })
            .collect(),
    }))
}

/// Delete a conversation
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.engine.delete_conversation(conversation_id).await? {
        return Err(AppError::ConversationNotFound {
            id: conversation_id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Attach documents to a conversation
pub async fn add_documents(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<AddDocumentsRequest>,
) -> Result<Json<AddDocumentsResponse>> {
    if request.document_ids.is_empty() {
        return Err(AppError::Validation {
            message: "document_ids must not be empty".to_string(),
            field: Some("document_ids".to_string()),
        });
    }

    let conversation = state
        .engine
        .add_documents(conversation_id, &request.document_ids)
        .await?;

    Ok(Json(AddDocumentsResponse {
        conversation_id: conversation.conversation_id,
        active_document_ids: conversation.active_document_ids.into_iter().collect(),
        citation_count: conversation.citations.len(),
    }))
}

/// Process one user turn
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>> {
    let outcome = state
        .engine
        .process_message(conversation_id, &request.content, &request.document_ids)
        .await?;

    Ok(Json(SendMessageResponse {
        message: outcome.message.into(),
        turn_failed: outcome.turn_failed,
        error: outcome.error,
    }))
}

/// Conversation history, optionally limited to the most recent messages
pub async fn get_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let messages = state
        .engine
        .get_history(conversation_id, query.limit)
        .await?;

    Ok(Json(HistoryResponse {
        conversation_id,
        messages: messages.into_iter().map(MessageBody::from).collect(),
    }))
}
