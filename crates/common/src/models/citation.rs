//! Canonical citation model
//!
//! All backend citation shapes are normalized into this one union type; the
//! serialized form is the persisted wire shape
//! (`{type, cited_text, document_id|document_index, <location fields>}`).
//!
//! Range convention: citations synthesized locally use end-exclusive ranges
//! (`end_page = N + 1`). Ranges returned by the backend are stored verbatim
//! in whichever convention the backend used and are never reinterpreted.

use serde::{Deserialize, Serialize};

/// Where a citation came from.
///
/// `Synthesized` marks the low-confidence regex fallback path; consumers may
/// present those citations differently from backend-verified ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationProvenance {
    #[default]
    Backend,
    Synthesized,
}

impl CitationProvenance {
    pub fn is_backend(&self) -> bool {
        matches!(self, CitationProvenance::Backend)
    }
}

/// Type-specific location fields of a citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CitationLocation {
    PageLocation {
        #[serde(default)]
        document_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_title: Option<String>,
        #[serde(default = "default_page")]
        start_page_number: u32,
        #[serde(default = "default_page")]
        end_page_number: u32,
    },
    CharLocation {
        #[serde(default)]
        document_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_title: Option<String>,
        #[serde(default)]
        start_char_index: usize,
        #[serde(default)]
        end_char_index: usize,
    },
    ContentBlockLocation {
        #[serde(default)]
        document_index: usize,
        #[serde(default)]
        start_block_index: usize,
        #[serde(default)]
        end_block_index: usize,
    },
    /// Unrecognized backend payloads, preserved without loss.
    Unknown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
    },
}

fn default_page() -> u32 {
    1
}

/// A citation into a source document.
///
/// Immutable once created: the id is assigned exactly once (by the extraction
/// pipeline or by fallback synthesis) and citations are never mutated after
/// that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Stable identifier within a citation pool; `None` until assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The quoted source text. Always present, may be empty.
    #[serde(default)]
    pub cited_text: String,

    #[serde(default, skip_serializing_if = "CitationProvenance::is_backend")]
    pub provenance: CitationProvenance,

    #[serde(flatten)]
    pub location: CitationLocation,
}

impl Citation {
    /// Page-range citation with an end-exclusive range, as produced by
    /// fallback synthesis.
    pub fn synthesized_page(
        document_title: impl Into<String>,
        start_page: u32,
        end_page: u32,
        cited_text: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            cited_text: cited_text.into(),
            provenance: CitationProvenance::Synthesized,
            location: CitationLocation::PageLocation {
                document_index: 0,
                document_title: Some(document_title.into()),
                start_page_number: start_page,
                end_page_number: end_page,
            },
        }
    }

    /// Catch-all citation preserving whatever fields were recognized.
    pub fn unknown(document_id: Option<String>, cited_text: impl Into<String>) -> Self {
        Self {
            id: None,
            cited_text: cited_text.into(),
            provenance: CitationProvenance::Backend,
            location: CitationLocation::Unknown { document_id },
        }
    }

    /// Assign the pool identifier. Intended to be called exactly once at
    /// creation time.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The document title, for location variants that carry one.
    pub fn document_title(&self) -> Option<&str> {
        match &self.location {
            CitationLocation::PageLocation { document_title, .. }
            | CitationLocation::CharLocation { document_title, .. } => document_title.as_deref(),
            _ => None,
        }
    }

    /// Identity used for deduplication: the pool id when assigned, otherwise
    /// the full value.
    pub fn same_citation(&self, other: &Citation) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_round_trip_page_location() {
        let wire = json!({
            "type": "page_location",
            "cited_text": "Net sales were $100M",
            "document_index": 0,
            "document_title": "Q3 Report",
            "start_page_number": 4,
            "end_page_number": 5
        });

        let citation: Citation = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(citation.cited_text, "Net sales were $100M");
        assert!(matches!(
            citation.location,
            CitationLocation::PageLocation {
                start_page_number: 4,
                end_page_number: 5,
                ..
            }
        ));

        let back = serde_json::to_value(&citation).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn test_unknown_preserves_document_id() {
        let wire = json!({
            "type": "unknown",
            "cited_text": "",
            "document_id": "doc-17"
        });

        let citation: Citation = serde_json::from_value(wire).unwrap();
        assert_eq!(
            citation.location,
            CitationLocation::Unknown {
                document_id: Some("doc-17".to_string())
            }
        );
        assert_eq!(citation.cited_text, "");
    }

    #[test]
    fn test_synthesized_provenance_serialized() {
        let citation = Citation::synthesized_page("T", 4, 5, "Revenue grew");
        let wire = serde_json::to_value(&citation).unwrap();
        assert_eq!(wire["provenance"], "synthesized");

        // Backend provenance is the default and stays off the wire.
        let backend = Citation::unknown(None, "x");
        let wire = serde_json::to_value(&backend).unwrap();
        assert!(wire.get("provenance").is_none());
    }

    #[test]
    fn test_identity_by_id() {
        let a = Citation::synthesized_page("T", 1, 2, "one").with_id("c1");
        let mut b = Citation::synthesized_page("T", 3, 4, "other text");
        b.id = Some("c1".to_string());
        assert!(a.same_citation(&b));

        let c = Citation::synthesized_page("T", 1, 2, "one");
        let d = Citation::synthesized_page("T", 1, 2, "one");
        assert!(c.same_citation(&d));
    }
}
