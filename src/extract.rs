//! Extraction of structured segments from noisy LLM output.
//!
//! Models are instructed to enclose JSON in ```json fences, and reasoning
//! models emit a `<think>…</think>` preamble before the user-visible answer.
//! Everything downstream of the raw completion text goes through here.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*(\{[\s\S]*?\})\s*```").expect("static regex"));

static FENCED_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*(\[[\s\S]*?\])\s*```").expect("static regex"));

/// First fenced ```json { … } ``` block, exactly the enclosed JSON text.
pub fn fenced_json_object(raw: &str) -> Option<&str> {
    FENCED_OBJECT
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// First fenced ```json [ … ] ``` block, exactly the enclosed JSON text.
pub fn fenced_json_array(raw: &str) -> Option<&str> {
    FENCED_ARRAY
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// The answer segment after the first literal `</think>` marker, trimmed.
///
/// Returns `None` when the marker is absent (the model produced no
/// user-visible answer segment).
pub fn after_think(raw: &str) -> Option<&str> {
    const MARKER: &str = "</think>";
    raw.find(MARKER).map(|pos| raw[pos + MARKER.len()..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_recovered_regardless_of_prose() {
        let raw = "Sure, here you go:\n```json\n{\"prompt_1\": \"EMS data\"}\n```\nHope it helps.";
        assert_eq!(fenced_json_object(raw), Some("{\"prompt_1\": \"EMS data\"}"));
    }

    #[test]
    fn first_of_multiple_fences_wins() {
        let raw = "```json\n{\"a\": 1}\n```\ntext\n```json\n{\"b\": 2}\n```";
        assert_eq!(fenced_json_object(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn array_fence_is_distinct_from_object_fence() {
        let raw = "```json\n[{\"topic\": \"EMS\", \"prompt\": \"EMS data\"}]\n```";
        assert!(fenced_json_object(raw).is_none());
        assert_eq!(
            fenced_json_array(raw),
            Some("[{\"topic\": \"EMS\", \"prompt\": \"EMS data\"}]")
        );
    }

    #[test]
    fn no_fence_yields_none() {
        assert!(fenced_json_object("plain prose, no json here").is_none());
        assert!(fenced_json_array("{\"bare\": true}").is_none());
    }

    #[test]
    fn multiline_object_spans_fence() {
        let raw = "```json\n{\n  \"prompt_1\": \"a\",\n  \"prompt_2\": \"b\"\n}\n```";
        let inner = fenced_json_object(raw).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(inner).unwrap();
        assert_eq!(parsed["prompt_2"], "b");
    }

    #[test]
    fn after_think_returns_trimmed_tail() {
        let raw = "<think>internal reasoning</think>\n\nThe measure you want is X.\n";
        assert_eq!(after_think(raw), Some("The measure you want is X."));
    }

    #[test]
    fn after_think_none_without_marker() {
        assert!(after_think("no marker at all").is_none());
    }

    #[test]
    fn after_think_empty_tail_is_empty_str() {
        assert_eq!(after_think("<think>x</think>"), Some(""));
    }
}
