//! Question-answering pipeline over the rules corpus.
//!
//! `ask` runs expand → retrieve → assemble → synthesize; the remaining
//! operations are thin lookups against the same backend.

pub mod context;
pub mod expand;
pub mod references;
pub mod retriever;
pub mod synthesize;

use std::sync::Arc;

use crate::config::{AgentConfig, Config};
use crate::error::AgentError;
use crate::llm::GenerationBackend;
use crate::models::{AnswerMode, AnswerResult, RuleDocument, SearchResponse, Stats};
use crate::search::SearchBackend;

use context::ContextAssembler;
use expand::QueryExpander;
use retriever::HybridRetriever;
use synthesize::AnswerSynthesizer;

const HIGHLIGHT_PRE: &str = "<mark>";
const HIGHLIGHT_POST: &str = "</mark>";
/// Upper bound on hits per request, matching Elasticsearch's default
/// `index.max_result_window`.
pub const MAX_HITS: usize = 10_000;

/// Stateless between requests; safe to share behind an `Arc`.
pub struct RulesAgent {
    backend: Arc<dyn SearchBackend>,
    generator: Arc<dyn GenerationBackend>,
    expander: Arc<QueryExpander>,
    retriever: HybridRetriever,
    assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    definitions_index: String,
    settings: AgentConfig,
}

impl RulesAgent {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        generator: Arc<dyn GenerationBackend>,
        expander: QueryExpander,
        config: &Config,
    ) -> Self {
        Self {
            retriever: HybridRetriever::new(backend.clone(), &config.search.rules_index),
            backend,
            generator,
            expander: Arc::new(expander),
            assembler: ContextAssembler::new(config.agent.context_char_budget),
            synthesizer: AnswerSynthesizer::new(
                config.llm.params(),
                config.agent.fallback_articles,
            ),
            definitions_index: config.search.definitions_index.clone(),
            settings: config.agent.clone(),
        }
    }

    pub fn expander(&self) -> &QueryExpander {
        &self.expander
    }

    /// Answer a question from the rules. `max_context` bounds the hits
    /// retrieved (default from config); generation failures degrade to an
    /// extractive answer, retrieval failures are returned.
    pub async fn ask(
        &self,
        question: &str,
        max_context: Option<usize>,
    ) -> Result<AnswerResult, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::Validation("Question required".to_string()));
        }
        let limit = max_context
            .unwrap_or(self.settings.default_max_context)
            .min(MAX_HITS);

        let expanded = self.expander.expand(question);
        tracing::debug!("Expanded question: {expanded}");

        let hits = self
            .retriever
            .retrieve(&expanded, question, limit)
            .await
            .map_err(|e| {
                tracing::error!("Agent retrieval failed: {e}");
                AgentError::from(e)
            })?;

        if hits.is_empty() {
            tracing::info!("Agent no rules found for: {question}");
            return Ok(AnswerResult {
                question: question.to_string(),
                answer: references::NO_RULES_MESSAGE.to_string(),
                references: Vec::new(),
                mode: AnswerMode::NoRules,
            });
        }

        let context = self.assembler.assemble(&hits);
        let result = self
            .synthesizer
            .synthesize(question, &context, &hits, self.generator.as_ref())
            .await;
        Ok(result)
    }

    /// Keyword search with `<mark>` highlighting on content.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Result<SearchResponse, AgentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::Validation("Query required".to_string()));
        }
        let limit = max_results
            .unwrap_or(self.settings.default_max_results)
            .min(MAX_HITS);

        let results = self
            .retriever
            .keyword_search(query, limit, HIGHLIGHT_PRE, HIGHLIGHT_POST)
            .await
            .map_err(|e| {
                tracing::error!("Search failed: {e}");
                AgentError::from(e)
            })?;

        tracing::info!(
            "Search results: query={query} limit={limit} total={}",
            results.total
        );

        Ok(SearchResponse {
            query: query.to_string(),
            total: results.total,
            results: results.hits.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn get_article(&self, article: &str) -> Result<RuleDocument, AgentError> {
        let article = article.trim();
        if article.is_empty() {
            return Err(AgentError::Validation("Article number required".to_string()));
        }

        match self.retriever.article(article).await {
            Ok(Some(hit)) => {
                tracing::info!("Article fetched: {article}");
                Ok(hit.document)
            }
            Ok(None) => {
                tracing::info!("Article not found: {article}");
                Err(AgentError::NotFound(article.to_string()))
            }
            Err(e) => {
                tracing::error!("Article lookup failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Document counts. A missing or failing definitions index counts as 0.
    pub async fn get_stats(&self) -> Result<Stats, AgentError> {
        let rules = self
            .backend
            .count(self.retriever.index())
            .await
            .map_err(|e| {
                tracing::error!("Rules count failed: {e}");
                AgentError::from(e)
            })?;

        let definitions = match self.backend.count(&self.definitions_index).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Definitions count unavailable: {e}");
                0
            }
        };

        tracing::info!("Stats fetched: rules={rules} definitions={definitions}");
        Ok(Stats { rules, definitions })
    }

    pub async fn health(&self) -> bool {
        let up = self.backend.ping().await;
        if !up {
            tracing::warn!("Health check failed: search backend unreachable");
        }
        up
    }
}
