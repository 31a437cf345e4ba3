//! # rules-agent
//!
//! Question answering over the FINA water-polo rulebook. A question is
//! expanded with domain synonyms, matched against an indexed copy of the
//! rules, and answered by a text-generation model that must cite the
//! articles it was given. When generation is unavailable the top rules are
//! returned verbatim instead.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!                    │   Question   │
//!                    └──────┬───────┘
//!                           │
//!                           ▼
//!                ┌─────────────────────┐
//!                │   Query Expansion   │
//!                │ regex → synonyms    │
//!                └──────────┬──────────┘
//!                           │ expanded + original
//!                           ▼
//!                ┌─────────────────────┐
//!                │  Hybrid Retrieval   │
//!                │ fuzzy content^4     │
//!                │   title^3 kw^2      │
//!                │ OR phrase (×3)      │
//!                │ OR keywords (×2)    │
//!                └──────────┬──────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              │ no hits                 │ hits
//!              ▼                         ▼
//!     ┌─────────────────┐     ┌─────────────────────┐
//!     │ "Aucune règle   │     │  Context Assembly   │
//!     │   trouvée"      │     │ [n] Article X: ...  │
//!     └─────────────────┘     └──────────┬──────────┘
//!                                        │
//!                                        ▼
//!                             ┌─────────────────────┐
//!                             │     Generation      │
//!                             └──────────┬──────────┘
//!                              ok        │       error
//!                         ┌──────────────┴──────────────┐
//!                         ▼                             ▼
//!               ┌──────────────────┐         ┌──────────────────┐
//!               │ generated answer │         │ top 3 verbatim   │
//!               └────────┬─────────┘         └────────┬─────────┘
//!                        └──────────────┬─────────────┘
//!                                       ▼
//!                            ┌─────────────────────┐
//!                            │ References (all     │
//!                            │ retrieved articles) │
//!                            └─────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, search backend and LLM settings
//! - [`models`] - Shared data types: `RuleDocument`, `SearchHit`, `AnswerResult`, request/response types
//! - [`error`] - Error taxonomy for the agent boundary and startup configuration
//! - [`search::elastic`] - Elasticsearch backend over its REST API
//! - [`search::local`] - Embedded tantivy index with the same query model
//! - [`llm::client`] - Text generation via Gemini, Vertex AI, OpenAI-compatible or Ollama APIs
//! - [`agent`] - The question-answering pipeline and its stages
//! - [`corpus`] - Rule/definition JSON loading with category and keyword enrichment
//! - [`api`] - Axum HTTP handlers for ask, search, article, stats and health
//! - [`state`] - Shared application state wiring backends into the agent

pub mod agent;
pub mod api;
pub mod config;
pub mod corpus;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
