//! Local PDF text recovery
//!
//! Last-resort extraction used when the LLM passes produced no usable text:
//! walks the content streams of an in-memory PDF and pulls the text-showing
//! operators directly.

use crate::errors::ExtractionError;
use tracing::{debug, warn};

/// Recover plain text from PDF bytes.
///
/// Pages that fail to parse are skipped; the call only errors when the
/// whole document yields nothing.
pub fn recover_text(bytes: &[u8], document_id: &str) -> Result<String, ExtractionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::PdfParse {
        document_id: document_id.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Recovering text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages.iter() {
        match doc.get_page_content(*page_id) {
            Ok(content) => {
                let page_text = text_from_content_stream(&content);
                if !page_text.trim().is_empty() {
                    text.push_str(&page_text);
                    text.push('\n');
                }
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Skipping unreadable page");
            }
        }
    }

    if text.trim().is_empty() {
        return Err(ExtractionError::PdfParse {
            document_id: document_id.to_string(),
            message: "No text content recovered from PDF".to_string(),
        });
    }

    Ok(normalize_whitespace(&text))
}

/// Pull text between BT/ET operators in a content stream.
fn text_from_content_stream(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_object = false;
    let mut buffer = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_object = true;
            continue;
        }
        if trimmed == "ET" {
            in_text_object = false;
            if !buffer.is_empty() {
                text.push_str(&buffer);
                text.push(' ');
                buffer.clear();
            }
            continue;
        }
        if in_text_object {
            if let Some(shown) = text_from_operator(trimmed) {
                buffer.push_str(&shown);
            }
        }
    }

    text
}

/// Text carried by a single Tj / TJ / ' / " operator line.
fn text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if start < end {
            return Some(unescape_pdf_string(&line[start + 1..end]));
        }
        return None;
    }

    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_string = false;
        let mut current = String::new();
        for ch in line.chars() {
            match ch {
                '(' if !in_string => in_string = true,
                ')' if in_string => {
                    in_string = false;
                    result.push_str(&unescape_pdf_string(&current));
                    current.clear();
                }
                _ if in_string => current.push(ch),
                _ => {}
            }
        }
        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

fn unescape_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }
    result
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_extraction() {
        assert_eq!(
            text_from_operator("(Net sales were \\$100M) Tj"),
            Some("Net sales were $100M".to_string())
        );
        assert_eq!(
            text_from_operator("[(Net ) -250 (sales)] TJ"),
            Some("Net sales".to_string())
        );
        assert_eq!(text_from_operator("1 0 0 1 72 720 Tm"), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_pdf_string("line\\nbreak"), "line\nbreak");
        assert_eq!(unescape_pdf_string("a \\(b\\)"), "a (b)");
    }

    #[test]
    fn test_content_stream_walk() {
        let stream = b"BT\n(Total assets) Tj\nET\nBT\n(of \\$2.1B) Tj\nET\n";
        let text = text_from_content_stream(stream);
        assert_eq!(normalize_whitespace(&text), "Total assets of $2.1B");
    }

    #[test]
    fn test_invalid_bytes_error() {
        let err = recover_text(b"not a pdf", "doc-1").unwrap_err();
        assert!(matches!(err, ExtractionError::PdfParse { .. }));
    }
}
