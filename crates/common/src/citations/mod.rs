//! Citation normalization and fallback synthesis
//!
//! The LLM backend returns citations in several incompatible shapes, and for
//! some passages none at all. This module provides:
//! - `normalize`: total conversion of any raw citation payload into the
//!   canonical [`Citation`](crate::models::Citation) union
//! - `synthesize_fallback_citations`: best-effort extraction of page-style
//!   references from plain answer text

mod fallback;
mod normalize;

pub use fallback::synthesize_fallback_citations;
pub use normalize::normalize;
