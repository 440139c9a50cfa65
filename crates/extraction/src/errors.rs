//! Extraction pipeline error types

use finsight_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("PDF parse error for {document_id}: {message}")]
    PdfParse {
        document_id: String,
        message: String,
    },

    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    #[error("Document has no content to extract")]
    EmptyDocument,
}

impl From<ExtractionError> for AppError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedContent(_) | ExtractionError::EmptyDocument => {
                AppError::InvalidFormat {
                    message: e.to_string(),
                }
            }
            ExtractionError::PdfParse { .. } => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}
