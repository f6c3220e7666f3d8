//! Turns raw provider text into validated flashcards.
//!
//! Models do not reliably emit clean JSON, so decoding is an ordered chain
//! of named fallbacks: the whole string, then the first fenced code block,
//! then the first balanced top-level JSON span. Entries that decode but fail
//! card validation are dropped individually; a chunk only fails outright
//! when nothing usable remains.

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::FlashcardData;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to parse provider response as JSON: {0}")]
    Malformed(String),

    #[error("provider response contained no valid flashcards")]
    NoValidCards,
}

#[derive(Deserialize)]
struct CardEnvelope {
    flashcards: Vec<RawCard>,
}

#[derive(Deserialize)]
struct RawCard {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    source: String,
}

/// Parses a provider response into validated cards. `display_name` is the
/// document name every card's source must reference.
pub fn parse_flashcards(
    raw: &str,
    display_name: &str,
) -> Result<Vec<FlashcardData>, ParseError> {
    let raw_cards = match decode_direct(raw) {
        Ok(cards) => cards,
        Err(direct_err) => decode_fenced(raw)
            .or_else(|| decode_span(raw))
            .ok_or_else(|| ParseError::Malformed(direct_err.to_string()))?,
    };

    let total = raw_cards.len();
    let mut cards = Vec::new();

    for (index, raw_card) in raw_cards.into_iter().enumerate() {
        match FlashcardData::new(
            raw_card.question,
            raw_card.answer,
            raw_card.source,
            display_name,
        ) {
            Ok(card) => cards.push(card),
            Err(e) => warn!(index, "dropping invalid flashcard: {}", e),
        }
    }

    if cards.is_empty() {
        return Err(ParseError::NoValidCards);
    }

    debug!(total, valid = cards.len(), "parsed flashcards");

    Ok(cards)
}

/// Accepts either `{"flashcards": [...]}` or a bare card array.
fn decode_value(text: &str) -> Result<Vec<RawCard>, serde_json::Error> {
    match serde_json::from_str::<CardEnvelope>(text) {
        Ok(envelope) => Ok(envelope.flashcards),
        Err(envelope_err) => {
            serde_json::from_str::<Vec<RawCard>>(text).map_err(|_| envelope_err)
        }
    }
}

/// Stage 1: the whole response is JSON.
fn decode_direct(raw: &str) -> Result<Vec<RawCard>, serde_json::Error> {
    decode_value(raw.trim())
}

/// Stage 2: JSON wrapped in a fenced code block.
fn decode_fenced(raw: &str) -> Option<Vec<RawCard>> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.+?)```").ok()?;
    let captures = fence.captures(raw)?;
    decode_value(captures.get(1)?.as_str().trim()).ok()
}

/// Stage 3: the first balanced top-level object or array anywhere in the
/// text, skipping whatever prose surrounds it.
fn decode_span(raw: &str) -> Option<Vec<RawCard>> {
    decode_value(balanced_span(raw)?).ok()
}

fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = text.as_bytes()[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        if byte == b'"' {
            in_string = true;
        } else if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=i]);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Biology101.pdf";

    fn card_json(question: &str, source: &str) -> String {
        format!(
            r#"{{"question": "{}", "answer": "An answer.", "source": "{}"}}"#,
            question, source
        )
    }

    #[test]
    fn test_direct_envelope() {
        let raw = format!(
            r#"{{"flashcards": [{}]}}"#,
            card_json("What is a cell?", "Biology101.pdf - Page 1")
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question(), "What is a cell?");
    }

    #[test]
    fn test_direct_bare_array() {
        let raw = format!("[{}]", card_json("Q?", "Biology101.pdf - Page 2"));

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn test_fenced_block_fallback() {
        let raw = format!(
            "Here are your flashcards:\n```json\n{{\"flashcards\": [{}]}}\n```\nEnjoy!",
            card_json("Q?", "Biology101.pdf - Page 1")
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let raw = format!(
            "```\n{{\"flashcards\": [{}]}}\n```",
            card_json("Q?", "Biology101.pdf - Page 1")
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn test_span_fallback() {
        let raw = format!(
            "Sure! The cards follow. {{\"flashcards\": [{}]}} Hope this helps.",
            card_json("Q?", "Biology101.pdf - Page 1")
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn test_span_fallback_handles_braces_in_strings() {
        let raw = format!(
            "Notes first. {{\"flashcards\": [{}]}}",
            r#"{"question": "What does { mean?", "answer": "A brace }.", "source": "Biology101.pdf - Page 3"}"#
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
        assert!(cards[0].question().contains('{'));
    }

    #[test]
    fn test_unbalanced_braces_malformed() {
        let raw = r#"{"flashcards": [{"question": "Q?", "answer":"#;

        let err = parse_flashcards(raw, DOC).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_prose_only_malformed() {
        let err = parse_flashcards("I could not generate any flashcards.", DOC).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_invalid_entries_dropped_valid_kept() {
        let raw = format!(
            r#"{{"flashcards": [{}, {}]}}"#,
            card_json("Good question?", "Biology101.pdf - Page 1"),
            // Source omits the document name entirely.
            card_json("Bad question?", "Some random reference")
        );

        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question(), "Good question?");
    }

    #[test]
    fn test_missing_fields_dropped() {
        let raw = r#"{"flashcards": [
            {"question": "Only a question"},
            {"question": "Complete", "answer": "A.", "source": "Biology101.pdf - Page 4"}
        ]}"#;

        let cards = parse_flashcards(raw, DOC).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question(), "Complete");
    }

    #[test]
    fn test_all_invalid_yields_no_valid_cards() {
        let raw = r#"{"flashcards": [{"question": "Q?", "answer": "A.", "source": "elsewhere"}]}"#;

        let err = parse_flashcards(raw, DOC).unwrap_err();
        assert!(matches!(err, ParseError::NoValidCards));
    }

    #[test]
    fn test_empty_array_yields_no_valid_cards() {
        let err = parse_flashcards(r#"{"flashcards": []}"#, DOC).unwrap_err();
        assert!(matches!(err, ParseError::NoValidCards));
    }

    #[test]
    fn test_parser_does_not_cap_card_count() {
        let entries: Vec<String> = (0..30)
            .map(|i| card_json(&format!("Q{}?", i), "Biology101.pdf - Page 1"))
            .collect();
        let raw = format!(r#"{{"flashcards": [{}]}}"#, entries.join(","));

        // Capping at the requested bound is the caller's job; the parser
        // returns everything valid in response order.
        let cards = parse_flashcards(&raw, DOC).unwrap();
        assert_eq!(cards.len(), 30);
        assert_eq!(cards[0].question(), "Q0?");
    }

    #[test]
    fn test_balanced_span_finds_array() {
        let text = "prefix [1, 2, [3]] suffix";
        assert_eq!(balanced_span(text), Some("[1, 2, [3]]"));
    }

    #[test]
    fn test_balanced_span_none_when_unclosed() {
        assert_eq!(balanced_span("{\"a\": [1, 2"), None);
    }
}
