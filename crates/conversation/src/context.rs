//! Document context assembly
//!
//! Turns the conversation's active documents into the two artifacts the
//! graph nodes consume: a textual digest (titles, types, summaries, citation
//! index) and the typed document blocks sent to the collaborator.

use base64::Engine as _;
use finsight_common::config::GraphConfig;
use finsight_common::errors::Result;
use finsight_common::llm::{DocumentBlock, DocumentSource};
use finsight_common::models::{truncate_chars, ConversationState};
use finsight_common::store::DocumentRepository;

/// Placeholder body for documents whose extraction has not produced usable
/// content yet. Turns must proceed rather than block on extraction.
pub const PLACEHOLDER_TEXT: &str =
    "[Document content not yet available - extraction in progress or failed]";

/// Build the textual digest of the conversation's documents and citation
/// pool, sized by the configured preview budgets.
pub fn build_digest(state: &ConversationState, config: &GraphConfig) -> String {
    let mut digest = String::new();

    digest.push_str("Documents attached to this conversation:\n");
    if state.documents.is_empty() {
        digest.push_str("(none)\n");
    }
    for (index, doc) in state.documents.iter().enumerate() {
        digest.push_str(&format!(
            "[{}] {} (type: {})\n",
            index,
            doc.title,
            doc.document_type.as_str()
        ));
        if !doc.summary.is_empty() {
            digest.push_str(&format!(
                "    {}\n",
                truncate_chars(&doc.summary, config.summary_chars)
            ));
        }
    }

    digest.push_str("\nAvailable citations:\n");
    if state.citations.is_empty() {
        digest.push_str("(none)\n");
    }
    for citation in &state.citations {
        let Some(id) = citation.id.as_deref() else {
            continue;
        };
        let preview = truncate_chars(&citation.cited_text, config.citation_preview_chars);
        match citation.document_title() {
            Some(title) => digest.push_str(&format!(
                "[Citation: {}] \"{}\" from {}\n",
                id, preview, title
            )),
            None => digest.push_str(&format!("[Citation: {}] \"{}\"\n", id, preview)),
        }
    }

    digest
}

/// Load the active documents and convert each into a typed content block.
///
/// Documents without usable content get a placeholder text block; a missing
/// or still-extracting document must never fail the turn.
pub async fn build_document_blocks(
    state: &ConversationState,
    repo: &dyn DocumentRepository,
    config: &GraphConfig,
) -> Result<Vec<DocumentBlock>> {
    let mut blocks = Vec::new();

    for document_id in &state.active_document_ids {
        let document = repo.get(*document_id).await?;
        let Some(document) = document else {
            continue;
        };

        let source = if let Some(text) = document.raw_text.as_deref().filter(|t| !t.is_empty()) {
            DocumentSource::Text {
                text: truncate_chars(text, config.max_document_chars),
            }
        } else if document.is_usable() {
            // Usable without text means supported binary content.
            let data = document.binary_content.as_deref().unwrap_or_default();
            DocumentSource::Base64 {
                media_type: document.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            }
        } else {
            DocumentSource::Text {
                text: PLACEHOLDER_TEXT.to_string(),
            }
        };

        let citations_enabled = !matches!(source, DocumentSource::Text { ref text } if text == PLACEHOLDER_TEXT);

        blocks.push(DocumentBlock {
            title: document.title.clone(),
            source,
            citations_enabled,
        });
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_common::models::{Citation, Document, DocumentStatus};
    use finsight_common::store::MemoryDocumentRepository;
    use uuid::Uuid;

    fn state_with_doc(doc: &Document) -> ConversationState {
        let mut state = ConversationState::new(Uuid::new_v4(), None);
        state.add_documents(std::slice::from_ref(doc), 500);
        state
    }

    #[test]
    fn test_digest_lists_documents_and_citations() {
        let mut doc = Document::new("Q3 Report", "application/pdf");
        doc.raw_text = Some("Net sales were $100M in the third quarter.".to_string());
        doc.citations =
            vec![Citation::synthesized_page("Q3 Report", 4, 5, "Net sales were $100M")
                .with_id("citation_1")];
        let state = state_with_doc(&doc);

        let digest = build_digest(&state, &Default::default());
        assert!(digest.contains("[0] Q3 Report"));
        assert!(digest.contains("[Citation: citation_1]"));
        assert!(digest.contains("Net sales were $100M"));
    }

    #[test]
    fn test_digest_skips_unidentified_citations() {
        let mut doc = Document::new("Q3 Report", "application/pdf");
        doc.citations = vec![Citation::synthesized_page("Q3 Report", 1, 2, "orphan")];
        let state = state_with_doc(&doc);

        let digest = build_digest(&state, &Default::default());
        assert!(!digest.contains("orphan"));
    }

    #[tokio::test]
    async fn test_pending_document_gets_placeholder() {
        let repo = MemoryDocumentRepository::new();
        let doc = Document::new("slow.pdf", "application/pdf");
        let state = state_with_doc(&doc);
        repo.insert(doc).await.unwrap();

        let blocks = build_document_blocks(&state, &repo, &Default::default())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].citations_enabled);
        assert!(
            matches!(&blocks[0].source, DocumentSource::Text { text } if text == PLACEHOLDER_TEXT)
        );
    }

    #[tokio::test]
    async fn test_pdf_binary_becomes_base64_block() {
        let repo = MemoryDocumentRepository::new();
        let mut doc = Document::new("scan.pdf", "application/pdf");
        doc.status = DocumentStatus::Completed;
        doc.binary_content = Some(vec![0x25, 0x50, 0x44, 0x46]);
        let state = state_with_doc(&doc);
        repo.insert(doc).await.unwrap();

        let blocks = build_document_blocks(&state, &repo, &Default::default())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].citations_enabled);
        assert!(matches!(
            &blocks[0].source,
            DocumentSource::Base64 { media_type, .. } if media_type == "application/pdf"
        ));
    }

    #[tokio::test]
    async fn test_text_truncated_to_budget() {
        let repo = MemoryDocumentRepository::new();
        let mut doc = Document::new("big.txt", "text/plain");
        doc.status = DocumentStatus::Completed;
        doc.raw_text = Some("x".repeat(50_000));
        let state = state_with_doc(&doc);
        repo.insert(doc).await.unwrap();

        let config = GraphConfig::default();
        let blocks = build_document_blocks(&state, &repo, &config).await.unwrap();
        match &blocks[0].source {
            DocumentSource::Text { text } => {
                assert!(text.chars().count() <= config.max_document_chars + 3);
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }
}
