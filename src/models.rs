use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article of the rulebook, as stored in the rules index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub article: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Legacy documents indexed before timestamps existed have none.
    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
}

/// A glossary entry. Only counted, never retrieved by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDocument {
    pub title: String,
    pub word: String,
    pub definition: String,
}

/// A rule matched by a retrieval query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: RuleDocument,
    pub relevance_score: f32,
    pub highlight_snippet: Option<String>,
}

/// Citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub article: String,
    pub title: String,
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerMode {
    Generated,
    Fallback,
    NoRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question: String,
    pub answer: String,
    pub references: Vec<Reference>,
    pub mode: AnswerMode,
}

/// Corpus counters exposed by `/api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub rules: u64,
    pub definitions: u64,
}

/// Ask request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    pub max_context: Option<usize>,
}

/// Keyword search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    pub max_results: Option<usize>,
}

/// A single keyword search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub article: String,
    pub title: String,
    pub content: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

impl From<SearchHit> for SearchResultItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            article: hit.document.article,
            title: hit.document.title,
            content: hit.document.content,
            score: hit.relevance_score,
            highlight: hit.highlight_snippet,
        }
    }
}

/// Keyword search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_mode_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(AnswerMode::NoRules).unwrap(), "no-rules");
        assert_eq!(serde_json::to_value(AnswerMode::Generated).unwrap(), "generated");
        assert_eq!(serde_json::to_value(AnswerMode::Fallback).unwrap(), "fallback");
    }

    #[test]
    fn test_rule_document_tolerates_legacy_source() {
        // Older indexing runs stored only article, title and content
        let json = r#"{"article": "20.1", "title": "FAUTES", "content": "Texte"}"#;
        let doc: RuleDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.article, "20.1");
        assert!(doc.keywords.is_empty());
        assert!(doc.category.is_empty());
        assert!(doc.indexed_at.is_none());
    }

    #[test]
    fn test_ask_request_camel_case_fields() {
        let req: AskRequest =
            serde_json::from_str(r#"{"question": "Qui?", "maxContext": 3}"#).unwrap();
        assert_eq!(req.question.as_deref(), Some("Qui?"));
        assert_eq!(req.max_context, Some(3));
    }

    #[test]
    fn test_search_result_item_omits_missing_highlight() {
        let item = SearchResultItem {
            article: "1".into(),
            title: "t".into(),
            content: "c".into(),
            score: 1.0,
            highlight: None,
        };
        let json = serde_json::to_value(item).unwrap();
        assert!(json.get("highlight").is_none());
    }
}
