//! Tolerant structured-output parsing.
//!
//! LLMs asked for JSON routinely wrap it in fenced code blocks or surround it
//! with prose. This module extracts and types those payloads, and nothing
//! more: the leniency is limited to the shapes pinned down in the tests.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Structured reply of the query-generation stage.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchQueryList {
    pub query: Vec<String>,
    pub rationale: String,
}

/// Structured verdict of the reflection stage.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Reflection {
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    pub follow_up_queries: Vec<String>,
}

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

fn bare_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap())
}

/// Extract the JSON payload from a model reply: a ```json fence first, then a
/// bare fence, then the outermost brace pair, else the trimmed text as-is.
pub fn extract_json_payload(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.contains("```json") {
        if let Some(caps) = json_fence_re().captures(trimmed) {
            return caps[1].to_string();
        }
    } else if trimmed.contains("```") {
        if let Some(caps) = bare_fence_re().captures(trimmed) {
            return caps[1].to_string();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }
    trimmed.to_string()
}

/// Extract and deserialize in one step.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(&extract_json_payload(text)).ok()
}

pub fn parse_search_query_list(text: &str) -> Option<SearchQueryList> {
    parse_json_reply(text)
}

pub fn parse_reflection(text: &str) -> Option<Reflection> {
    parse_json_reply(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let parsed: SearchQueryList =
            parse_json_reply(r#"{"query": ["a", "b"], "rationale": "why"}"#).unwrap();
        assert_eq!(parsed.query, vec!["a", "b"]);
        assert_eq!(parsed.rationale, "why");
    }

    #[test]
    fn test_json_fence() {
        let text = "```json\n{\"query\": [\"a\"], \"rationale\": \"r\"}\n```";
        let parsed = parse_search_query_list(text).unwrap();
        assert_eq!(parsed.query, vec!["a"]);
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"is_sufficient\": true, \"knowledge_gap\": \"\", \"follow_up_queries\": []}\n```";
        let parsed = parse_reflection(text).unwrap();
        assert!(parsed.is_sufficient);
    }

    #[test]
    fn test_leading_prose() {
        let text = "Sure! Here is the verdict you asked for:\n{\"is_sufficient\": false, \"knowledge_gap\": \"dates\", \"follow_up_queries\": [\"q\"]}";
        let parsed = parse_reflection(text).unwrap();
        assert!(!parsed.is_sufficient);
        assert_eq!(parsed.follow_up_queries, vec!["q"]);
    }

    #[test]
    fn test_trailing_prose() {
        let text = "{\"query\": [\"x\"], \"rationale\": \"r\"}\nLet me know if you need more queries.";
        // rfind('}') stops at the object's closing brace
        let parsed = parse_search_query_list(text).unwrap();
        assert_eq!(parsed.query, vec!["x"]);
    }

    #[test]
    fn test_fence_inside_prose() {
        let text = "Here you go:\n```json\n{\"query\": [\"q1\", \"q2\"], \"rationale\": \"two angles\"}\n```\nHappy searching!";
        let parsed = parse_search_query_list(text).unwrap();
        assert_eq!(parsed.query.len(), 2);
    }

    #[test]
    fn test_malformed_returns_none() {
        assert!(parse_reflection("I could not produce JSON this time.").is_none());
        assert!(parse_search_query_list("```json\nnot json\n```").is_none());
    }
}
