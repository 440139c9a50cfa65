//! Document records and conversation-side summaries

use super::Citation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extraction lifecycle status of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    /// Terminal failure; the error message is retained for inspection.
    Failed { error: String },
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed { .. })
    }
}

/// Classification of a financial document, assigned during extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    Notes,
    FinancialReport,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::BalanceSheet => "balance_sheet",
            DocumentType::IncomeStatement => "income_statement",
            DocumentType::CashFlow => "cash_flow",
            DocumentType::Notes => "notes",
            DocumentType::FinancialReport => "financial_report",
            DocumentType::Other => "other",
        }
    }
}

/// An uploaded document with its extracted content and citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub mime_type: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub document_type: DocumentType,
    /// Reporting periods covered (e.g. "Q1 2023", "FY 2022").
    #[serde(default)]
    pub periods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_content: Option<Vec<u8>>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(title: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            mime_type: mime_type.into(),
            status: DocumentStatus::Pending,
            document_type: DocumentType::Other,
            periods: Vec::new(),
            raw_text: None,
            binary_content: None,
            citations: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }

    /// A document is usable as citation context once it has non-empty text or
    /// binary content in a supported format.
    pub fn is_usable(&self) -> bool {
        if matches!(self.status, DocumentStatus::Failed { .. }) {
            return false;
        }
        self.raw_text.as_deref().is_some_and(|t| !t.is_empty())
            || (self
                .binary_content
                .as_deref()
                .is_some_and(|b| !b.is_empty())
                && self.mime_type == "application/pdf")
    }

    /// Build the conversation-side projection of this document.
    pub fn summarize(&self, summary_chars: usize) -> DocumentSummary {
        let summary = self
            .raw_text
            .as_deref()
            .map(|t| truncate_chars(t, summary_chars))
            .unwrap_or_default();
        DocumentSummary {
            id: self.id,
            title: self.title.clone(),
            document_type: self.document_type,
            summary,
        }
    }
}

/// Condensed view of a document kept inside conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub summary: String,
}

/// Truncate to a character budget, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
