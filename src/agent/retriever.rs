//! Weighted multi-clause retrieval against the rules index.

use std::sync::Arc;

use crate::models::SearchHit;
use crate::search::{
    BackendError, Clause, FieldBoost, Fuzziness, Highlight, QuerySpec, RuleField, SearchBackend,
    SearchResults,
};

/// Multiplier on the exact-phrase clause of question retrieval.
pub const PHRASE_BOOST: f32 = 3.0;
/// Multiplier on the exact-phrase clause of keyword search.
pub const KEYWORD_PHRASE_BOOST: f32 = 2.0;
/// Weight of the analyzed keywords clause.
pub const KEYWORDS_BOOST: f32 = 2.0;

#[derive(Clone)]
pub struct HybridRetriever {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl HybridRetriever {
    pub fn new(backend: Arc<dyn SearchBackend>, index: &str) -> Self {
        Self {
            backend,
            index: index.to_string(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Hits for a question, best first. A `limit` of 0 retrieves nothing
    /// and skips the backend.
    pub async fn retrieve(
        &self,
        expanded_query: &str,
        original_query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, BackendError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let spec = question_query(expanded_query, original_query, limit);
        let results = self.backend.search(&self.index, &spec).await?;
        Ok(rank(results.hits, limit))
    }

    /// Plain keyword search with a highlighted snippet per hit.
    pub async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        pre_tag: &str,
        post_tag: &str,
    ) -> Result<SearchResults, BackendError> {
        if limit == 0 {
            return Ok(SearchResults::default());
        }
        let spec = keyword_query(query, limit, pre_tag, post_tag);
        let results = self.backend.search(&self.index, &spec).await?;
        Ok(SearchResults {
            hits: rank(results.hits, limit),
            total: results.total,
        })
    }

    /// Exact lookup by article number.
    pub async fn article(&self, article: &str) -> Result<Option<SearchHit>, BackendError> {
        let spec = QuerySpec {
            should: vec![Clause::Term {
                field: RuleField::Article,
                value: article.to_string(),
            }],
            size: 1,
            highlight: None,
        };
        let results = self.backend.search(&self.index, &spec).await?;
        Ok(results.hits.into_iter().next())
    }
}

/// Question retrieval: fuzzy best-field match of the expanded query, exact
/// phrase of the original wording, and a keywords match, any of which suffices.
pub fn question_query(expanded_query: &str, original_query: &str, limit: usize) -> QuerySpec {
    QuerySpec {
        should: vec![
            Clause::MultiMatch {
                query: expanded_query.to_string(),
                fields: vec![
                    FieldBoost::new(RuleField::Content, 4.0),
                    FieldBoost::new(RuleField::Title, 3.0),
                    FieldBoost::new(RuleField::Keywords, 2.0),
                ],
                fuzziness: Some(Fuzziness::Auto),
            },
            Clause::Phrase {
                query: original_query.to_string(),
                fields: vec![
                    FieldBoost::new(RuleField::Content, 2.0),
                    FieldBoost::new(RuleField::Title, 1.0),
                ],
                boost: PHRASE_BOOST,
            },
            Clause::Match {
                field: RuleField::Keywords,
                query: expanded_query.to_string(),
                boost: KEYWORDS_BOOST,
            },
        ],
        size: limit,
        highlight: None,
    }
}

/// Keyword search over content and title only, highlighting `content`.
pub fn keyword_query(query: &str, limit: usize, pre_tag: &str, post_tag: &str) -> QuerySpec {
    QuerySpec {
        should: vec![
            Clause::MultiMatch {
                query: query.to_string(),
                fields: vec![
                    FieldBoost::new(RuleField::Content, 3.0),
                    FieldBoost::new(RuleField::Title, 2.0),
                ],
                fuzziness: Some(Fuzziness::Auto),
            },
            Clause::Phrase {
                query: query.to_string(),
                fields: vec![
                    FieldBoost::new(RuleField::Content, 1.0),
                    FieldBoost::new(RuleField::Title, 1.0),
                ],
                boost: KEYWORD_PHRASE_BOOST,
            },
        ],
        size: limit,
        highlight: Some(Highlight {
            field: RuleField::Content,
            pre_tag: pre_tag.to_string(),
            post_tag: post_tag.to_string(),
        }),
    }
}

/// Descending score, capped at `limit`. The sort is stable so ties keep
/// the backend's order.
fn rank(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleDocument;

    fn hit(article: &str, score: f32) -> SearchHit {
        SearchHit {
            document: RuleDocument {
                article: article.into(),
                title: String::new(),
                content: String::new(),
                category: String::new(),
                keywords: Vec::new(),
                indexed_at: None,
            },
            relevance_score: score,
            highlight_snippet: None,
        }
    }

    #[test]
    fn test_question_query_clauses() {
        let original = "Quelle est la durée d'une exclusion ?";
        let expanded = format!("{original} exclusion secondes temps");
        let spec = question_query(&expanded, original, 10);

        assert_eq!(spec.size, 10);
        assert_eq!(spec.should.len(), 3);

        match &spec.should[0] {
            Clause::MultiMatch {
                query,
                fields,
                fuzziness,
            } => {
                assert_eq!(query, &expanded);
                assert_eq!(
                    fields,
                    &vec![
                        FieldBoost::new(RuleField::Content, 4.0),
                        FieldBoost::new(RuleField::Title, 3.0),
                        FieldBoost::new(RuleField::Keywords, 2.0),
                    ]
                );
                assert_eq!(*fuzziness, Some(Fuzziness::Auto));
            }
            other => panic!("expected fuzzy multi-match, got {other:?}"),
        }

        match &spec.should[1] {
            Clause::Phrase {
                query,
                fields,
                boost,
            } => {
                // The phrase clause sees the unexpanded question
                assert_eq!(query, original);
                assert_eq!(
                    fields,
                    &vec![
                        FieldBoost::new(RuleField::Content, 2.0),
                        FieldBoost::new(RuleField::Title, 1.0),
                    ]
                );
                assert_eq!(*boost, 3.0);
            }
            other => panic!("expected phrase clause, got {other:?}"),
        }

        assert_eq!(
            spec.should[2],
            Clause::Match {
                field: RuleField::Keywords,
                query: expanded.clone(),
                boost: 2.0,
            }
        );
    }

    #[test]
    fn test_keyword_query_searches_content_and_title_only() {
        let spec = keyword_query("exclusion", 5, "<mark>", "</mark>");
        for clause in &spec.should {
            let fields = match clause {
                Clause::MultiMatch { fields, .. } | Clause::Phrase { fields, .. } => fields,
                other => panic!("unexpected clause {other:?}"),
            };
            assert!(fields
                .iter()
                .all(|f| matches!(f.field, RuleField::Content | RuleField::Title)));
        }
        let highlight = spec.highlight.unwrap();
        assert_eq!(highlight.field, RuleField::Content);
        assert_eq!(highlight.pre_tag, "<mark>");
    }

    #[test]
    fn test_rank_orders_and_caps() {
        let ranked = rank(vec![hit("a", 1.0), hit("b", 3.0), hit("c", 2.0)], 2);
        let articles: Vec<&str> = ranked.iter().map(|h| h.document.article.as_str()).collect();
        assert_eq!(articles, vec!["b", "c"]);
    }

    #[test]
    fn test_rank_keeps_tie_order() {
        let ranked = rank(vec![hit("x", 1.0), hit("y", 1.0), hit("z", 1.0)], 10);
        let articles: Vec<&str> = ranked.iter().map(|h| h.document.article.as_str()).collect();
        assert_eq!(articles, vec!["x", "y", "z"]);
    }
}
