//! The extraction cascade

use crate::errors::ExtractionError;
use base64::Engine as _;
use finsight_common::citations::{normalize, synthesize_fallback_citations};
use finsight_common::config::AppConfig;
use finsight_common::errors::{AppError, Result};
use finsight_common::llm::{
    Completion, DocumentBlock, DocumentSource, GenerateRequest, LlmClient,
};
use finsight_common::models::{truncate_chars, Citation, Document, DocumentStatus, DocumentType};
use finsight_common::store::DocumentRepository;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const CLASSIFY_PROMPT: &str = "\
You classify financial documents. Given the document, reply with a JSON \
object only, in the form:
{\"document_type\": \"balance_sheet|income_statement|cash_flow|notes|financial_report|other\", \
\"periods\": [\"Q1 2023\", ...]}
List every reporting period the document covers.";

const EXTRACT_PROMPT: &str = "\
You are a financial document analyst. Read the attached document and write \
a thorough extraction of its financial content: key figures, reporting \
periods, segment breakdowns, and notable disclosures. Quote exact figures. \
Cite the source location of every fact you extract.";

const STRUCTURED_PROMPT: &str = "\
Extract the financial data from the following document text as a structured \
summary: one line per metric in the form 'metric: value (period)'. Include \
only data present in the text.";

/// Drives uploaded documents through extraction to a terminal status.
///
/// One pipeline instance serves all documents; each document is processed by
/// a detached task so uploads never block on extraction.
pub struct ExtractionPipeline {
    repo: Arc<dyn DocumentRepository>,
    llm: Arc<dyn LlmClient>,
    config: AppConfig,
}

impl ExtractionPipeline {
    pub fn new(
        repo: Arc<dyn DocumentRepository>,
        llm: Arc<dyn LlmClient>,
        config: AppConfig,
    ) -> Self {
        Self { repo, llm, config }
    }

    /// Process a document in a detached background task.
    pub fn spawn(self: &Arc<Self>, document_id: Uuid) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.process(document_id).await {
                warn!(document_id = %document_id, error = %e, "Extraction task failed");
            }
        });
    }

    /// Run the full cascade for one document, leaving it `Completed` or
    /// `Failed`.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn process(&self, document_id: Uuid) -> Result<Document> {
        let document =
            self.repo
                .get(document_id)
                .await?
                .ok_or_else(|| AppError::DocumentNotFound {
                    id: document_id.to_string(),
                })?;

        self.repo
            .update_status(document_id, DocumentStatus::Processing)
            .await?;

        match self.run_cascade(document).await {
            Ok(mut document) => {
                document.status = DocumentStatus::Completed;
                self.repo.update(document.clone()).await?;
                info!(
                    citations = document.citations.len(),
                    document_type = document.document_type.as_str(),
                    "Extraction completed"
                );
                Ok(document)
            }
            Err(e) => {
                let message = e.to_string();
                self.repo
                    .update_status(document_id, DocumentStatus::Failed {
                        error: message.clone(),
                    })
                    .await?;
                Err(AppError::ExtractionFailed {
                    document_id: document_id.to_string(),
                    message,
                })
            }
        }
    }

    async fn run_cascade(&self, mut document: Document) -> Result<Document> {
        let block = document_block(&document)?;

        // Classification is best-effort; failures degrade to Other.
        let (document_type, periods) = self.classify(&block).await;
        document.document_type = document_type;
        document.periods = periods;

        // Primary extraction with structured citations.
        let completion = self.primary_extraction(&block).await?;
        let mut text = completion.text;
        let mut citations: Vec<Citation> = completion
            .raw_citations
            .iter()
            .map(normalize)
            .collect();

        if text.trim().is_empty() {
            text = self.recover_text(&document).await?;
        }

        if citations.is_empty() && !text.trim().is_empty() {
            citations = synthesize_fallback_citations(&text, &document.title);
            if !citations.is_empty() {
                info!(
                    synthesized = citations.len(),
                    "No structured citations returned, synthesized from text"
                );
            }
        }

        // Pool ids are assigned exactly once, here.
        let citations = citations
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_id(format!("citation_{}", i + 1)))
            .collect();

        if document.raw_text.as_deref().map_or(true, str::is_empty) {
            document.raw_text = Some(text);
        }
        document.citations = citations;
        Ok(document)
    }

    async fn classify(&self, block: &DocumentBlock) -> (DocumentType, Vec<String>) {
        let mut request = GenerateRequest::simple(
            CLASSIFY_PROMPT,
            "Classify the attached document.".to_string(),
        );
        request.documents = vec![DocumentBlock {
            citations_enabled: false,
            ..block.clone()
        }];
        request.max_tokens = 500;
        request.temperature = 0.0;

        match self.call_llm(request).await {
            Ok(completion) => parse_classification(&completion.text),
            Err(e) => {
                warn!(error = %e, "Classification failed, defaulting to other");
                (DocumentType::Other, Vec::new())
            }
        }
    }

    async fn primary_extraction(&self, block: &DocumentBlock) -> Result<Completion> {
        let mut request = GenerateRequest::simple(
            EXTRACT_PROMPT,
            "Extract the financial content of the attached document.".to_string(),
        );
        request.documents = vec![block.clone()];
        request.max_tokens = self.config.llm.max_tokens;
        request.temperature = self.config.llm.temperature;
        self.call_llm(request).await
    }

    /// Text recovery when the primary pass came back empty: re-extract from
    /// existing text at temperature zero, or walk the PDF locally.
    async fn recover_text(&self, document: &Document) -> Result<String> {
        if let Some(raw) = document.raw_text.as_deref().filter(|t| !t.is_empty()) {
            let input = truncate_chars(raw, self.config.extraction.structured_input_chars);
            let mut request = GenerateRequest::simple(STRUCTURED_PROMPT, input);
            request.max_tokens = self.config.llm.max_tokens;
            request.temperature = self.config.extraction.structured_temperature;
            let completion = self.call_llm(request).await?;
            return Ok(completion.text);
        }

        if let Some(bytes) = document.binary_content.as_deref() {
            if document.mime_type == "application/pdf" {
                return Ok(crate::pdf::recover_text(bytes, &document.id.to_string())?);
            }
        }

        Err(ExtractionError::EmptyDocument.into())
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

/// The typed content block for a document, preferring text over binary.
fn document_block(document: &Document) -> Result<DocumentBlock> {
    let source = if let Some(text) = document.raw_text.as_deref().filter(|t| !t.is_empty()) {
        DocumentSource::Text {
            text: text.to_string(),
        }
    } else if let Some(bytes) = document.binary_content.as_deref().filter(|b| !b.is_empty()) {
        if document.mime_type != "application/pdf" {
            return Err(ExtractionError::UnsupportedContent(document.mime_type.clone()).into());
        }
        DocumentSource::Base64 {
            media_type: document.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    } else {
        return Err(ExtractionError::EmptyDocument.into());
    };

    Ok(DocumentBlock {
        title: document.title.clone(),
        source,
        citations_enabled: true,
    })
}

/// Parse the classification reply. Anything unparseable degrades to
/// `(Other, [])`.
fn parse_classification(text: &str) -> (DocumentType, Vec<String>) {
    let Some(start) = text.find('{') else {
        return (DocumentType::Other, Vec::new());
    };
    let Some(end) = text.rfind('}') else {
        return (DocumentType::Other, Vec::new());
    };

    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) else {
        return (DocumentType::Other, Vec::new());
    };

    let document_type = value
        .get("document_type")
        .cloned()
        .and_then(|v| serde_json::from_value::<DocumentType>(v).ok())
        .unwrap_or_default();
    let periods = value
        .get("periods")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    (document_type, periods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_common::llm::MockLlmClient;
    use finsight_common::models::{CitationLocation, CitationProvenance};
    use finsight_common::store::MemoryDocumentRepository;
    use serde_json::json;

    fn pipeline(repo: &MemoryDocumentRepository, llm: &Arc<MockLlmClient>) -> ExtractionPipeline {
        ExtractionPipeline::new(
            Arc::new(repo.clone()),
            llm.clone(),
            AppConfig::default(),
        )
    }

    async fn seed_text_document(repo: &MemoryDocumentRepository) -> Uuid {
        let mut doc = Document::new("Q3 Report", "text/plain");
        doc.raw_text = Some("Net sales were $100M in the third quarter.".to_string());
        let id = doc.id;
        repo.insert(doc).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_primary_extraction_with_backend_citations() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;

        llm.push_text(r#"{"document_type": "income_statement", "periods": ["Q3 2023"]}"#);
        llm.push_completion(Completion {
            text: "Net sales were $100M, up 12% year over year.".to_string(),
            raw_citations: vec![json!({
                "type": "page_location",
                "cited_text": "Net sales were $100M",
                "start_page_number": 4,
                "end_page_number": 5
            })],
        });

        let document = pipeline(&repo, &llm).process(id).await.unwrap();

        assert_eq!(document.status, DocumentStatus::Completed);
        assert_eq!(document.document_type, DocumentType::IncomeStatement);
        assert_eq!(document.periods, vec!["Q3 2023"]);
        assert_eq!(document.citations.len(), 1);
        assert_eq!(document.citations[0].id.as_deref(), Some("citation_1"));
        assert_eq!(
            document.citations[0].provenance,
            CitationProvenance::Backend
        );
    }

    #[tokio::test]
    async fn test_zero_citations_triggers_fallback_synthesis() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;

        llm.push_text(r#"{"document_type": "financial_report", "periods": []}"#);
        llm.push_text("Net sales were $100M in the quarter [Page 4]. Margins held at 43% [Page 7].");

        let document = pipeline(&repo, &llm).process(id).await.unwrap();

        assert_eq!(document.citations.len(), 2);
        assert!(document
            .citations
            .iter()
            .all(|c| c.provenance == CitationProvenance::Synthesized));
        assert_eq!(document.citations[0].id.as_deref(), Some("citation_1"));
        assert_eq!(document.citations[1].id.as_deref(), Some("citation_2"));
        assert!(matches!(
            document.citations[0].location,
            CitationLocation::PageLocation {
                start_page_number: 4,
                end_page_number: 5,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_garbage_classification_degrades_to_other() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;

        llm.push_text("I cannot classify this");
        llm.push_text("Extraction text without references.");

        let document = pipeline(&repo, &llm).process(id).await.unwrap();
        assert_eq!(document.document_type, DocumentType::Other);
        assert!(document.periods.is_empty());
        assert!(document.citations.is_empty());
        assert_eq!(document.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_empty_primary_text_reextracts_structured() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;

        llm.push_text(r#"{"document_type": "other", "periods": []}"#);
        llm.push_text("");
        llm.push_text("net_sales: $100M (Q3 2023)");

        let document = pipeline(&repo, &llm).process(id).await.unwrap();
        assert_eq!(document.status, DocumentStatus::Completed);
        assert_eq!(llm.call_count(), 3);
        // The re-extraction ran at the structured temperature.
        let requests = llm.requests();
        assert_eq!(requests[2].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_collaborator_failure_marks_document_failed() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;

        llm.push_text(r#"{"document_type": "other", "periods": []}"#);
        llm.push_error(AppError::CollaboratorAuth {
            message: "bad key".to_string(),
        });

        let err = pipeline(&repo, &llm).process(id).await.unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed { .. }));

        let document = repo.get(id).await.unwrap().unwrap();
        assert!(matches!(document.status, DocumentStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_failed_document_can_be_reprocessed() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let id = seed_text_document(&repo).await;
        let pipeline = pipeline(&repo, &llm);

        llm.push_text(r#"{"document_type": "other", "periods": []}"#);
        llm.push_error(AppError::CollaboratorTimeout { timeout_ms: 30_000 });
        pipeline.process(id).await.unwrap_err();
        let document = repo.get(id).await.unwrap().unwrap();
        assert!(matches!(document.status, DocumentStatus::Failed { .. }));

        // A retry runs the full cascade again and reaches a terminal
        // Completed status.
        repo.update_status(id, DocumentStatus::Pending).await.unwrap();
        llm.push_text(r#"{"document_type": "income_statement", "periods": ["Q3 2023"]}"#);
        llm.push_text("Net sales were $100M [Page 4].");

        let document = pipeline.process(id).await.unwrap();
        assert_eq!(document.status, DocumentStatus::Completed);
        assert_eq!(document.document_type, DocumentType::IncomeStatement);
        assert_eq!(document.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let repo = MemoryDocumentRepository::new();
        let llm = Arc::new(MockLlmClient::new());
        let err = pipeline(&repo, &llm).process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound { .. }));
    }

    #[test]
    fn test_classification_parsing() {
        let (t, p) = parse_classification(
            r#"Sure! {"document_type": "balance_sheet", "periods": ["FY 2022"]} done"#,
        );
        assert_eq!(t, DocumentType::BalanceSheet);
        assert_eq!(p, vec!["FY 2022"]);

        let (t, p) = parse_classification("no json here");
        assert_eq!(t, DocumentType::Other);
        assert!(p.is_empty());
    }
}
