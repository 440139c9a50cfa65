//! Regex fallback synthesis for uncited answer text
//!
//! Invoked only when the backend returned zero structured citations for a
//! nonempty passage. Everything produced here carries
//! `CitationProvenance::Synthesized` so downstream consumers can tell it
//! apart from backend-verified citations.

use crate::models::Citation;
use regex_lite::Regex;

/// Character cap for a synthesized `cited_text`.
const MAX_CITED_TEXT_CHARS: usize = 200;

/// Minimum cleaned-sentence length for sentence-level synthesis.
const MIN_SENTENCE_CHARS: usize = 10;

fn page_patterns() -> Vec<Regex> {
    // Ordered: the first pattern that matches an occurrence claims it.
    vec![
        Regex::new(r"\[Page (\d+)\]").unwrap(),
        Regex::new(r"\[page (\d+)\]").unwrap(),
        Regex::new(r"\[p\.? (\d+)\]").unwrap(),
        Regex::new(r"\[(\d+)\]").unwrap(),
    ]
}

/// Synthesize page-location citations from bracketed page references in
/// plain text.
///
/// Each reference like `[Page 4]` yields one citation whose `cited_text` is
/// the enclosing sentence with bracket notation stripped, spanning the
/// end-exclusive page range `[N, N+1)`. If no sentence-level reference is
/// usable, degrades to one citation per raw page-number match with a generic
/// `cited_text`. Returns an empty vec when the text contains no references.
pub fn synthesize_fallback_citations(text: &str, document_title: &str) -> Vec<Citation> {
    let patterns = page_patterns();
    let mut citations = Vec::new();

    for sentence in split_sentences(text) {
        for (page, _) in pattern_matches(&patterns, sentence) {
            let cleaned = strip_bracket_notation(sentence);
            if cleaned.chars().count() < MIN_SENTENCE_CHARS {
                continue;
            }
            citations.push(Citation::synthesized_page(
                document_title,
                page,
                page + 1,
                truncate(&cleaned, MAX_CITED_TEXT_CHARS),
            ));
        }
    }

    if citations.is_empty() {
        for (page, _) in pattern_matches(&patterns, text) {
            citations.push(Citation::synthesized_page(
                document_title,
                page,
                page + 1,
                format!("Financial data from page {}", page),
            ));
        }
    }

    citations
}

/// All page-number matches in order of position, first pattern wins per
/// occurrence (overlapping later-pattern matches are discarded).
fn pattern_matches(patterns: &[Regex], text: &str) -> Vec<(u32, (usize, usize))> {
    let mut matches: Vec<(u32, (usize, usize))> = Vec::new();
    for pattern in patterns {
        for captures in pattern.captures_iter(text) {
            let Some(full) = captures.get(0) else { continue };
            let span = (full.start(), full.end());
            let overlaps = matches
                .iter()
                .any(|(_, taken)| span.0 < taken.1 && taken.0 < span.1);
            if overlaps {
                continue;
            }
            if let Some(page) = captures.get(1).and_then(|m| m.as_str().parse().ok()) {
                matches.push((page, span));
            }
        }
    }
    matches.sort_by_key(|(_, span)| span.0);
    matches
}

/// Split on sentence-ending punctuation followed by whitespace, keeping the
/// punctuation with the preceding sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_start, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    sentences.push(&text[start..next_start]);
                    start = next_start;
                }
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

fn strip_bracket_notation(sentence: &str) -> String {
    let bracket = Regex::new(r"\[[^\]]*\]").unwrap();
    let cleaned = bracket.replace_all(sentence, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
