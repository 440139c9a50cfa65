//! LLM-driven document analysis
//!
//! Runs a named analysis (ratios, trends, benchmarking, sentiment, or a
//! comprehensive pass) over a fully extracted document and keeps the results
//! addressable by id. Analyses only run against documents whose extraction
//! has completed; everything else is rejected before any collaborator call.

use chrono::{DateTime, Utc};
use finsight_common::config::AppConfig;
use finsight_common::errors::{AppError, Result};
use finsight_common::llm::{Completion, GenerateRequest, LlmClient};
use finsight_common::models::{truncate_chars, Document, DocumentStatus};
use finsight_common::store::DocumentRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

/// The analysis variants offered over a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    FinancialRatios,
    TrendAnalysis,
    Benchmarking,
    SentimentAnalysis,
    #[default]
    Comprehensive,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::FinancialRatios => "financial_ratios",
            AnalysisKind::TrendAnalysis => "trend_analysis",
            AnalysisKind::Benchmarking => "benchmarking",
            AnalysisKind::SentimentAnalysis => "sentiment_analysis",
            AnalysisKind::Comprehensive => "comprehensive",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            AnalysisKind::FinancialRatios => {
                "You are a financial analyst. Compute the liquidity, \
                 profitability, solvency and efficiency ratios supported by \
                 the document, one line per ratio with the inputs you used. \
                 Finish with key insights as '- ' bullet lines."
            }
            AnalysisKind::TrendAnalysis => {
                "You are a financial analyst. Compare the reporting periods \
                 in the document and describe the direction and magnitude of \
                 each major metric across them. Finish with key insights as \
                 '- ' bullet lines."
            }
            AnalysisKind::Benchmarking => {
                "You are a financial analyst. Compare the document's figures \
                 against typical industry benchmarks, flagging metrics that \
                 deviate materially. Finish with key insights as '- ' bullet \
                 lines."
            }
            AnalysisKind::SentimentAnalysis => {
                "You are a financial analyst. Assess the tone of the \
                 document's narrative text (optimistic, neutral, cautious), \
                 quoting the phrases that carry it. Finish with key insights \
                 as '- ' bullet lines."
            }
            AnalysisKind::Comprehensive => {
                "You are a financial analyst. Write a comprehensive analysis \
                 of the document: key figures, ratios, period-over-period \
                 movement, and notable disclosures. Finish with key insights \
                 as '- ' bullet lines."
            }
        }
    }
}

/// One completed analysis over a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub document_id: Uuid,
    pub kind: AnalysisKind,
    /// The full analysis text returned by the collaborator.
    pub content: String,
    /// Bullet insights pulled out of the content for listing surfaces.
    pub insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Runs analyses against extracted documents and retains the results.
pub struct AnalysisService {
    repo: Arc<dyn DocumentRepository>,
    llm: Arc<dyn LlmClient>,
    config: AppConfig,
    results: RwLock<HashMap<Uuid, AnalysisResult>>,
}

impl AnalysisService {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        llm: Arc<dyn LlmClient>,
        config: AppConfig,
    ) -> Self {
        Self {
            repo,
            llm,
            config,
            results: RwLock::new(HashMap::new()),
        }
    }

    /// Run one analysis over a document and persist the result.
    #[instrument(skip(self), fields(document_id = %document_id, kind = kind.as_str()))]
    pub async fn run(&self, document_id: Uuid, kind: AnalysisKind) -> Result<AnalysisResult> {
        let document =
            self.repo
                .get(document_id)
                .await?
                .ok_or_else(|| AppError::DocumentNotFound {
                    id: document_id.to_string(),
                })?;

        let text = analyzable_text(&document, kind)?;
        let input = truncate_chars(text, self.config.extraction.structured_input_chars);

        let body = format!(
            "Document: {} (type: {})\nReporting periods: {}\n\n{}",
            document.title,
            document.document_type.as_str(),
            if document.periods.is_empty() {
                "unknown".to_string()
            } else {
                document.periods.join(", ")
            },
            input
        );

        let mut request = GenerateRequest::simple(kind.prompt(), body);
        request.max_tokens = self.config.llm.max_tokens;
        request.temperature = self.config.llm.temperature;

        let completion = self.call_llm(request).await?;
        let insights = extract_insights(&completion.text);

        let result = AnalysisResult {
            id: Uuid::new_v4(),
            document_id,
            kind,
            content: completion.text,
            insights,
            created_at: Utc::now(),
        };

        self.results
            .write()
            .await
            .insert(result.id, result.clone());
        info!(
            analysis_id = %result.id,
            insights = result.insights.len(),
            "Analysis completed"
        );
        Ok(result)
    }

    pub async fn get(&self, analysis_id: Uuid) -> Result<AnalysisResult> {
        self.results
            .read()
            .await
            .get(&analysis_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                resource_type: "analysis".to_string(),
                id: analysis_id.to_string(),
            })
    }

    /// All analyses run against one document, oldest first.
    pub async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<AnalysisResult>> {
        let results = self.results.read().await;
        let mut matching: Vec<AnalysisResult> = results
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

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

/// Check the document is analyzable for the requested kind and return its
/// extracted text.
fn analyzable_text(document: &Document, kind: AnalysisKind) -> Result<&str> {
    if document.status != DocumentStatus::Completed {
        return Err(AppError::Validation {
            message: format!("Document {} is not fully processed", document.id),
            field: None,
        });
    }

    let text = document
        .raw_text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation {
            message: format!("Document {} has no extracted text to analyze", document.id),
            field: None,
        })?;

    if kind == AnalysisKind::TrendAnalysis && document.periods.len() < 2 {
        return Err(AppError::Validation {
            message: "Trend analysis requires at least two reporting periods".to_string(),
            field: None,
        });
    }

    Ok(text)
}

/// Pull `- ` bullet lines out of the analysis text.
fn extract_insights(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .map(str::to_string)
        })
        .filter(|insight| !insight.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_common::llm::MockLlmClient;
    use finsight_common::store::MemoryDocumentRepository;

    fn service(repo: &MemoryDocumentRepository, llm: &Arc<MockLlmClient>) -> AnalysisService {
        AnalysisService::new(Arc::new(repo.clone()), llm.clone(), AppConfig::default())
    }

    async fn seed_completed_document(repo: &MemoryDocumentRepository) -> Uuid {
        let mut doc = Document::new("Q3 Report", "text/plain");
        doc.status = DocumentStatus::Completed;
        doc.periods = vec!["Q2 2023".to_string(), "Q3 2023".to_string()];
        doc.raw_text = Some("Net sales were $100M, up from $89M.".to_string());
        let id = doc.id;
        repo.insert(doc).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_run_and_get_roundtrip() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_completed_document(&repo).await;

        llm.push_text(
            "Net sales grew 12% quarter over quarter.\n\
             - Revenue growth accelerated\n\
             - Margins held steady",
        );

        let svc = service(&repo, &llm);
        let result = svc.run(id, AnalysisKind::Comprehensive).await.unwrap();

        assert_eq!(result.document_id, id);
        assert_eq!(result.kind, AnalysisKind::Comprehensive);
        assert!(result.content.contains("12%"));
        assert_eq!(
            result.insights,
            vec!["Revenue growth accelerated", "Margins held steady"]
        );

        let fetched = svc.get(result.id).await.unwrap();
        assert_eq!(fetched.content, result.content);

        let listed = svc.list_for_document(id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, result.id);
    }

    #[tokio::test]
    async fn test_unprocessed_document_is_rejected() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let doc = Document::new("pending.pdf", "application/pdf");
        let id = doc.id;
        repo.insert(doc).await.unwrap();

        let err = service(&repo, &llm)
            .run(id, AnalysisKind::Comprehensive)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_trend_analysis_needs_two_periods() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let mut doc = Document::new("Q3 Report", "text/plain");
        doc.status = DocumentStatus::Completed;
        doc.periods = vec!["Q3 2023".to_string()];
        doc.raw_text = Some("Net sales were $100M.".to_string());
        let id = doc.id;
        repo.insert(doc).await.unwrap();

        let err = service(&repo, &llm)
            .run(id, AnalysisKind::TrendAnalysis)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_unknown_analysis_id() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let err = service(&repo, &llm).get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_kind_wire_names() {
        let kind: AnalysisKind = serde_json::from_str(r#""financial_ratios""#).unwrap();
        assert_eq!(kind, AnalysisKind::FinancialRatios);
        assert_eq!(
            serde_json::to_string(&AnalysisKind::TrendAnalysis).unwrap(),
            r#""trend_analysis""#
        );
    }
}
