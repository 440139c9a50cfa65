//! Document upload and status handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use finsight_common::errors::{AppError, Result};
use finsight_common::models::{Citation, Document, DocumentStatus};

/// Upload document request. Content is either plain text or base64-encoded
/// binary; exactly one must be provided.
#[derive(Debug, Deserialize)]
pub struct UploadDocumentRequest {
    pub title: String,
    pub mime_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
}

/// Upload document response
#[derive(Serialize)]
pub struct UploadDocumentResponse {
    pub document_id: Uuid,
    pub status: DocumentStatus,
}

/// Document status response
#[derive(Serialize)]
pub struct DocumentResponse {
    pub document_id: Uuid,
    pub title: String,
    pub mime_type: String,
    pub status: DocumentStatus,
    pub document_type: String,
    pub periods: Vec<String>,
    pub citation_count: usize,
    pub uploaded_at: String,
}

#[derive(Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentResponse>,
}

#[derive(Serialize)]
pub struct CitationsResponse {
    pub document_id: Uuid,
    pub citations: Vec<Citation>,
}

/// Upload a document and start extraction in the background
pub async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<UploadDocumentRequest>,
) -> Result<(StatusCode, Json<UploadDocumentResponse>)> {
    if request.title.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "title".to_string(),
        });
    }

    let mut document = Document::new(request.title.trim(), request.mime_type.trim());

    match (request.content, request.content_base64) {
        (Some(text), None) => {
            check_size(text.len(), &state)?;
            document.raw_text = Some(text);
        }
        (None, Some(encoded)) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| AppError::InvalidFormat {
                    message: format!("content_base64 is not valid base64: {}", e),
                })?;
            check_size(bytes.len(), &state)?;
            document.binary_content = Some(bytes);
        }
        (None, None) => {
            return Err(AppError::MissingField {
                field: "content".to_string(),
            });
        }
        (Some(_), Some(_)) => {
            return Err(AppError::Validation {
                message: "Provide either content or content_base64, not both".to_string(),
                field: None,
            });
        }
    }

    let document_id = document.id;
    state.repo.insert(document).await?;
    state.pipeline.spawn(document_id);

    tracing::info!(document_id = %document_id, "Document uploaded, extraction started");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadDocumentResponse {
            document_id,
            status: DocumentStatus::Pending,
        }),
    ))
}

/// Get a document's extraction status and metadata
pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let document = state
        .repo
        .get(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    Ok(Json(DocumentResponse {
        document_id: document.id,
        title: document.title,
        mime_type: document.mime_type,
        status: document.status,
        document_type: document.document_type.as_str().to_string(),
        periods: document.periods,
        citation_count: document.citations.len(),
        uploaded_at: document.uploaded_at.to_rfc3339(),
    }))
}

/// List all documents, oldest upload first
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<ListDocumentsResponse>> {
    let documents = state.repo.list().await?;

    Ok(Json(ListDocumentsResponse {
        documents: documents
            .into_iter()
            .map(|document| DocumentResponse {
                document_id: document.id,
                title: document.title,
                mime_type: document.mime_type,
                status: document.status,
                document_type: document.document_type.as_str().to_string(),
                periods: document.periods,
                citation_count: document.citations.len(),
                uploaded_at: document.uploaded_at.to_rfc3339(),
            })
            .collect(),
    }))
}

/// Delete a document
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.repo.delete(document_id).await? {
        return Err(AppError::DocumentNotFound {
            id: document_id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Re-run extraction for a document whose previous attempt failed or stalled
pub async fn retry_extraction(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<(StatusCode, Json<UploadDocumentResponse>)> {
    state
        .repo
        .get(document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: document_id.to_string(),
        })?;

    state
        .repo
        .update_status(document_id, DocumentStatus::Pending)
        .await?;
    state.pipeline.spawn(document_id);

    tracing::info!(document_id = %document_id, "Extraction retry started");

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadDocumentResponse {
            document_id,
            status: DocumentStatus::Pending,
        }),
    ))
}

/// Get a document's citation pool
pub async fn get_citations(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<CitationsResponse>> {
    let citations = state.repo.get_citations(document_id).await?;
    Ok(Json(CitationsResponse {
        document_id,
        citations,
    }))
}

fn check_size(size: usize, state: &AppState) -> Result<()> {
    let limit = state.config.server.max_upload_bytes;
    if size > limit {
        return Err(AppError::PayloadTooLarge { size, limit });
    }
    Ok(())
}
