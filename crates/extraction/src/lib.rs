//! FinSight Extraction Pipeline
//!
//! Drives uploaded documents through a cascade:
//! 1. Classification of document type and reporting periods
//! 2. Primary LLM extraction with structured citations
//! 3. Fallback citation synthesis when the backend returned none
//! 4. Structured re-extraction or local PDF text recovery when the primary
//!    pass produced no usable text
//!
//! The pipeline runs as a detached background task per document; the
//! conversation layer observes results by re-reading document state.
//!
//! Completed documents can additionally be run through named analyses
//! (ratios, trends, benchmarking, sentiment, comprehensive) via
//! [`AnalysisService`].

pub mod analysis;
pub mod errors;
pub mod pdf;
pub mod pipeline;

pub use analysis::{AnalysisKind, AnalysisResult, AnalysisService};
pub use errors::ExtractionError;
pub use pipeline::ExtractionPipeline;
