//! Search backend seam.
//!
//! The agent describes what it wants with a [`QuerySpec`] and lets a
//! [`SearchBackend`] translate it into its own query language: an
//! Elasticsearch `bool` query ([`elastic`]) or a tantivy query tree
//! ([`local`]).

pub mod elastic;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SearchHit;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure or timeout talking to the backend.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a non-success status.
    #[error("search backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("index {0} does not exist")]
    MissingIndex(String),

    #[error("malformed search response: {0}")]
    Malformed(String),

    /// Failure inside the embedded index.
    #[error("index error: {0}")]
    Index(String),

    /// The worker running the query died before answering.
    #[error("search task failed: {0}")]
    Task(String),
}

/// Searchable fields of the rules index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Article,
    Title,
    Content,
    Keywords,
    Category,
}

impl RuleField {
    pub fn name(self) -> &'static str {
        match self {
            RuleField::Article => "article",
            RuleField::Title => "title",
            RuleField::Content => "content",
            RuleField::Keywords => "keywords",
            RuleField::Category => "category",
        }
    }
}

/// A field together with its relevance weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBoost {
    pub field: RuleField,
    pub boost: f32,
}

impl FieldBoost {
    pub fn new(field: RuleField, boost: f32) -> Self {
        Self { field, boost }
    }
}

/// Typo tolerance of a match clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    /// Edit distance scaled to term length: 0 up to 2 chars, 1 up to 5, else 2.
    Auto,
    Fixed(u8),
}

impl Fuzziness {
    pub fn distance_for(self, term: &str) -> u8 {
        match self {
            Fuzziness::Fixed(d) => d,
            Fuzziness::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

/// One `should` clause of a relevance query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Unordered term overlap over several fields, scored by the best field.
    MultiMatch {
        query: String,
        fields: Vec<FieldBoost>,
        fuzziness: Option<Fuzziness>,
    },
    /// Contiguous phrase over several fields, scored by the best field and
    /// multiplied by `boost`.
    Phrase {
        query: String,
        fields: Vec<FieldBoost>,
        boost: f32,
    },
    /// Analyzed match against a single field.
    Match {
        field: RuleField,
        query: String,
        boost: f32,
    },
    /// Exact, unanalyzed value.
    Term { field: RuleField, value: String },
}

/// Highlighting of the first matching fragment of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub field: RuleField,
    pub pre_tag: String,
    pub post_tag: String,
}

/// Disjunctive relevance query: a document matches when at least one
/// clause matches; its score combines the matching clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub should: Vec<Clause>,
    pub size: usize,
    pub highlight: Option<Highlight>,
}

/// Ranked hits plus the total number of matching documents.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` against `index`. Hits are ordered by descending score.
    async fn search(&self, index: &str, query: &QuerySpec) -> Result<SearchResults, BackendError>;

    /// Number of documents in `index`.
    async fn count(&self, index: &str) -> Result<u64, BackendError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_fuzziness_scales_with_length() {
        assert_eq!(Fuzziness::Auto.distance_for("la"), 0);
        assert_eq!(Fuzziness::Auto.distance_for("but"), 1);
        assert_eq!(Fuzziness::Auto.distance_for("faute"), 1);
        assert_eq!(Fuzziness::Auto.distance_for("gardien"), 2);
    }

    #[test]
    fn test_auto_fuzziness_counts_chars_not_bytes() {
        // "durée" is 5 chars but 6 bytes
        assert_eq!(Fuzziness::Auto.distance_for("durée"), 1);
    }

    #[test]
    fn test_fixed_fuzziness() {
        assert_eq!(Fuzziness::Fixed(0).distance_for("exclusion"), 0);
    }
}
