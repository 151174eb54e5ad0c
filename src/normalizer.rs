//! Turns a raw model completion into a [`ClassificationResult`].
//!
//! Models are asked for a bare JSON object but often wrap it in Markdown
//! fences or prose. [`normalize`] strips those artifacts, extracts the
//! object and fills every missing or unusable field with a default. It
//! never fails: text that cannot be parsed at all becomes an `uncertain`
//! result whose explanation quotes the raw completion.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::types::{ClassificationResult, Label};

pub const INVALID_JSON_PREFIX: &str = "Model did not return valid JSON. Raw output was: ";
pub const MISSING_EXPLANATION: &str = "No explanation provided by the model.";

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json").expect("valid regex"));

pub fn normalize(raw: &str) -> ClassificationResult {
    match parse_completion(raw) {
        Some(fields) => from_fields(&fields),
        None => fallback(raw),
    }
}

/// The JSON object embedded in `raw`, if there is one.
fn parse_completion(raw: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_fences(raw.trim());
    match serde_json::from_str::<Value>(outer_braces(&cleaned)) {
        Ok(Value::Object(fields)) => Some(fields),
        _ => None,
    }
}

fn strip_fences(text: &str) -> String {
    JSON_FENCE
        .replace_all(text, "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// First `{` through last `}`; the whole input when there is no such span.
fn outer_braces(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn from_fields(fields: &Map<String, Value>) -> ClassificationResult {
    let label = fields
        .get("label")
        .and_then(Value::as_str)
        .and_then(Label::from_model)
        .unwrap_or(Label::Uncertain);

    let confidence = fields
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let explanation = match fields.get("explanation") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(value) if is_truthy(value) => value.to_string(),
        _ => MISSING_EXPLANATION.to_string(),
    };

    ClassificationResult {
        label,
        confidence,
        explanation,
    }
}

fn fallback(raw: &str) -> ClassificationResult {
    ClassificationResult {
        label: Label::Uncertain,
        confidence: 0.0,
        explanation: format!("{INVALID_JSON_PREFIX}{raw}"),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: Label, confidence: f64, explanation: &str) -> ClassificationResult {
        ClassificationResult {
            label,
            confidence,
            explanation: explanation.to_string(),
        }
    }

    #[test]
    fn plain_json() {
        assert_eq!(
            normalize(r#"{"label":"real","confidence":0.42,"explanation":"credible source"}"#),
            result(Label::Real, 0.42, "credible source")
        );
    }

    #[test]
    fn json_fence_is_stripped() {
        let raw = "```json\n{\"label\":\"fake\",\"confidence\":0.9,\"explanation\":\"x\"}\n```";
        assert_eq!(normalize(raw), result(Label::Fake, 0.9, "x"));
    }

    #[test]
    fn fence_tag_is_case_insensitive() {
        let raw = "```JSON\n{\"label\":\"real\",\"confidence\":1,\"explanation\":\"y\"}\n```";
        assert_eq!(normalize(raw), result(Label::Real, 1.0, "y"));
    }

    #[test]
    fn bare_fence_is_stripped() {
        let raw = "```\n{\"label\":\"uncertain\",\"confidence\":0.5,\"explanation\":\"z\"}\n```";
        assert_eq!(normalize(raw), result(Label::Uncertain, 0.5, "z"));
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = r#"Sure! Here is the result: {"label":"real","confidence":0.7,"explanation":"ok"} Thanks."#;
        assert_eq!(normalize(raw), result(Label::Real, 0.7, "ok"));
    }

    #[test]
    fn non_json_falls_back_with_raw_text() {
        assert_eq!(
            normalize("not json at all"),
            result(
                Label::Uncertain,
                0.0,
                "Model did not return valid JSON. Raw output was: not json at all"
            )
        );
    }

    #[test]
    fn fallback_quotes_untrimmed_input() {
        let raw = "  ```json\nnope\n```  ";
        assert_eq!(
            normalize(raw).explanation,
            format!("{INVALID_JSON_PREFIX}{raw}")
        );
    }

    #[test]
    fn missing_fields_get_defaults() {
        assert_eq!(
            normalize(r#"{"label":"fake"}"#),
            result(Label::Fake, 0.0, MISSING_EXPLANATION)
        );
    }

    #[test]
    fn empty_input_falls_back() {
        assert_eq!(
            normalize(""),
            result(Label::Uncertain, 0.0, INVALID_JSON_PREFIX)
        );
    }

    #[test]
    fn json_that_is_not_an_object_falls_back() {
        assert_eq!(normalize("[1, 2, 3]").label, Label::Uncertain);
        assert!(normalize("42").explanation.starts_with(INVALID_JSON_PREFIX));
    }

    #[test]
    fn falsy_fields_are_replaced() {
        let raw = r#"{"label":"","confidence":"0.8","explanation":null}"#;
        assert_eq!(
            normalize(raw),
            result(Label::Uncertain, 0.0, MISSING_EXPLANATION)
        );
    }

    #[test]
    fn unknown_label_becomes_uncertain() {
        let raw = r#"{"label":"satire","confidence":0.6,"explanation":"parody site"}"#;
        assert_eq!(normalize(raw), result(Label::Uncertain, 0.6, "parody site"));
    }

    #[test]
    fn label_case_is_ignored() {
        let raw = r#"{"label":"FAKE","confidence":0.8,"explanation":"e"}"#;
        assert_eq!(normalize(raw).label, Label::Fake);
    }

    #[test]
    fn out_of_range_confidence_passes_through() {
        let raw = r#"{"label":"real","confidence":1.5,"explanation":"very sure"}"#;
        assert_eq!(normalize(raw).confidence, 1.5);
        let raw = r#"{"label":"real","confidence":-2,"explanation":"odd"}"#;
        assert_eq!(normalize(raw).confidence, -2.0);
    }

    #[test]
    fn non_string_explanation_is_rendered() {
        let raw = r#"{"label":"fake","confidence":0.3,"explanation":["a","b"]}"#;
        assert_eq!(normalize(raw).explanation, r#"["a","b"]"#);
        let raw = r#"{"label":"fake","confidence":0.3,"explanation":0}"#;
        assert_eq!(normalize(raw).explanation, MISSING_EXPLANATION);
    }

    #[test]
    fn overflowing_confidence_rejects_the_whole_document() {
        let raw = r#"{"label":"fake","confidence":1e400,"explanation":"kept?"}"#;
        assert_eq!(
            normalize(raw),
            result(Label::Uncertain, 0.0, &format!("{INVALID_JSON_PREFIX}{raw}"))
        );
    }

    #[test]
    fn greedy_span_breaks_on_two_objects() {
        let raw = r#"{"label":"fake"} and also {"label":"real"}"#;
        assert!(normalize(raw).explanation.starts_with(INVALID_JSON_PREFIX));
    }

    #[test]
    fn braces_inside_explanation_are_kept() {
        let raw = r#"Result: {"label":"fake","confidence":0.8,"explanation":"uses {curly} quotes"}"#;
        assert_eq!(normalize(raw).explanation, "uses {curly} quotes");
    }

    #[test]
    fn closing_brace_before_opening_is_not_a_span() {
        assert_eq!(outer_braces("} text {"), "} text {");
        assert!(normalize("} text {").explanation.starts_with(INVALID_JSON_PREFIX));
    }

    #[test]
    fn every_result_is_complete() {
        let inputs = [
            "",
            "   ",
            "{",
            "}",
            "{}",
            "null",
            "```",
            "```json```",
            r#"{"label":null,"confidence":null,"explanation":""}"#,
            r#"{"label":{"nested":true},"confidence":[0.5],"explanation":false}"#,
            "Here you go:\n```json\n{\"label\": \"real\", \"confidence\": 0.95}\n```",
        ];

        for raw in inputs {
            let normalized = normalize(raw);
            assert!(!normalized.explanation.is_empty(), "input {raw:?}");
            assert!(normalized.confidence.is_finite(), "input {raw:?}");
        }
    }

    #[test]
    fn renormalizing_a_result_is_stable() {
        let inputs = [
            "```json\n{\"label\":\"fake\",\"confidence\":0.9,\"explanation\":\"x\"}\n```",
            r#"{"label":"real"}"#,
            "not json at all",
            "",
            r#"{"label":"fake","confidence":1.5,"explanation":"uses {curly} quotes"}"#,
        ];

        for raw in inputs {
            let first = normalize(raw);
            let second = normalize(&serde_json::to_string(&first).unwrap());
            assert_eq!(first, second, "input {raw:?}");
        }
    }
}
