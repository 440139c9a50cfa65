//! Document analysis handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use finsight_common::errors::Result;
use finsight_extraction::{AnalysisKind, AnalysisResult};

/// Run analysis request. Defaults to a comprehensive analysis.
#[derive(Debug, Deserialize)]
pub struct RunAnalysisRequest {
    #[serde(default)]
    pub kind: AnalysisKind,
}

#[derive(Serialize)]
pub struct AnalysisBody {
    pub analysis_id: Uuid,
    pub document_id: Uuid,
    pub kind: AnalysisKind,
    pub content: String,
    pub insights: Vec<String>,
    pub created_at: String,
}

impl From<AnalysisResult> for AnalysisBody {
    fn from(result: AnalysisResult) -> Self {
        Self {
            analysis_id: result.id,
            document_id: result.document_id,
            kind: result.kind,
            content: result.content,
            insights: result.insights,
            created_at: result.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct AnalysisListResponse {
    pub document_id: Uuid,
    pub analyses: Vec<AnalysisBody>,
}

/// Run an analysis over an extracted document
pub async fn run_analysis(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<RunAnalysisRequest>,
) -> Result<(StatusCode, Json<AnalysisBody>)> {
    let result = state.analysis.run(document_id, request.kind).await?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// Get one analysis result
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisBody>> {
    let result = state.analysis.get(analysis_id).await?;
    Ok(Json(result.into()))
}

/// List the analyses run against a document
pub async fn list_analyses(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<AnalysisListResponse>> {
    let analyses = state.analysis.list_for_document(document_id).await?;
    Ok(Json(AnalysisListResponse {
        document_id,
        analyses: analyses.into_iter().map(AnalysisBody::from).collect(),
    }))
}
