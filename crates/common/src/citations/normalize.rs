//! Total normalization of raw backend citation payloads

use crate::models::{Citation, CitationLocation, CitationProvenance};
use serde_json::Value;

/// Convert a raw citation payload into the canonical [`Citation`] union.
///
/// Normalization is total: unrecognized discriminants degrade to the
/// `Unknown` variant and missing fields take defaults (0 for indices, 1 for
/// page numbers). It never errors and never drops a citation.
///
/// The backend has shipped several field-name generations for the same
/// concept; each accessor prefers the newest alias and walks backwards.
pub fn normalize(raw: &Value) -> Citation {
    let discriminant = raw
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_ascii_lowercase();

    let location = match discriminant.as_str() {
        "page_location" | "page_citation" => CitationLocation::PageLocation {
            document_index: index_field(raw, &["document_index"]),
            document_title: string_field(raw, &["document_title"]),
            start_page_number: page_field(raw, &["start_page_number", "start_page"], "start"),
            end_page_number: page_field(raw, &["end_page_number", "end_page"], "end"),
        },
        "char_location" | "quote_citation" | "text_citation" => CitationLocation::CharLocation {
            document_index: index_field(raw, &["document_index"]),
            document_title: string_field(raw, &["document_title"]),
            start_char_index: index_field(raw, &["start_char_index", "start_index"]),
            end_char_index: index_field(raw, &["end_char_index", "end_index"]),
        },
        "content_block_location" => CitationLocation::ContentBlockLocation {
            document_index: index_field(raw, &["document_index"]),
            start_block_index: index_field(raw, &["start_block_index", "start_index"]),
            end_block_index: index_field(raw, &["end_block_index", "end_index"]),
        },
        _ => CitationLocation::Unknown {
            document_id: document_id(raw),
        },
    };

    let provenance = match raw.get("provenance").and_then(Value::as_str) {
        Some("synthesized") => CitationProvenance::Synthesized,
        _ => CitationProvenance::Backend,
    };

    Citation {
        id: string_field(raw, &["id"]),
        cited_text: string_field(raw, &["cited_text", "text"]).unwrap_or_default(),
        provenance,
        location,
    }
}

/// First present string field among the aliases, newest first.
fn string_field(raw: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

/// First present integer field among the aliases, defaulting to 0.
fn index_field(raw: &Value, aliases: &[&str]) -> usize {
    aliases
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_u64))
        .unwrap_or(0) as usize
}

/// Page number resolution: flat aliases first, then the legacy nested
/// `{page: {start, end}}` shape, then the default of 1.
fn page_field(raw: &Value, aliases: &[&str], nested_key: &str) -> u32 {
    aliases
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_u64))
        .or_else(|| {
            raw.get("page")
                .and_then(|page| page.get(nested_key))
                .and_then(Value::as_u64)
        })
        .unwrap_or(1) as u32
}

/// Document id: flat field first, then the legacy nested `{document: {id}}`.
fn document_id(raw: &Value) -> Option<String> {
    raw.get("document_id")
        .and_then(Value::as_str)
        .or_else(|| {
            raw.get("document")
                .and_then(|doc| doc.get("id"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}
