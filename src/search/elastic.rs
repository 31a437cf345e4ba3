//! Elasticsearch backend over its REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{RuleDocument, SearchHit};
use crate::search::{
    BackendError, Clause, FieldBoost, Fuzziness, QuerySpec, SearchBackend, SearchResults,
};

pub struct ElasticBackend {
    client: reqwest::Client,
    host: String,
    api_key: Option<String>,
}

impl ElasticBackend {
    /// `client` should carry the per-call timeout; a timeout surfaces as
    /// [`BackendError::Unavailable`].
    pub fn new(client: reqwest::Client, host: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, format!("{}{path}", self.host));
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("ApiKey {key}")),
            None => req,
        }
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn search(&self, index: &str, query: &QuerySpec) -> Result<SearchResults, BackendError> {
        let body = build_search_body(query);

        let resp = self
            .request(reqwest::Method::POST, &format!("/{index}/_search"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::MissingIndex(index.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let highlight_field = query.highlight.as_ref().map(|h| h.field.name());
        parse_search_response(body, highlight_field)
    }

    async fn count(&self, index: &str) -> Result<u64, BackendError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/{index}/_count"))
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::MissingIndex(index.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CountResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(body.count)
    }

    async fn ping(&self) -> bool {
        match self.request(reqwest::Method::HEAD, "/").send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Elasticsearch ping failed: {e}");
                false
            }
        }
    }
}

// ─── Query translation ───────────────────────────────────

/// Translate a [`QuerySpec`] into an Elasticsearch `_search` body.
pub fn build_search_body(query: &QuerySpec) -> Value {
    let should: Vec<Value> = query.should.iter().map(clause_to_json).collect();

    let mut body = json!({
        "size": query.size,
        "query": {
            "bool": {
                "should": should,
                "minimum_should_match": 1
            }
        }
    });

    if let Some(highlight) = &query.highlight {
        let mut fields = serde_json::Map::new();
        fields.insert(
            highlight.field.name().to_string(),
            json!({
                "pre_tags": [highlight.pre_tag],
                "post_tags": [highlight.post_tag]
            }),
        );
        body["highlight"] = json!({ "fields": fields });
    }

    body
}

fn clause_to_json(clause: &Clause) -> Value {
    match clause {
        Clause::MultiMatch {
            query,
            fields,
            fuzziness,
        } => {
            let mut multi_match = json!({
                "query": query,
                "fields": weighted_fields(fields),
                "type": "best_fields"
            });
            if let Some(fuzziness) = fuzziness {
                multi_match["fuzziness"] = match fuzziness {
                    Fuzziness::Auto => json!("AUTO"),
                    Fuzziness::Fixed(d) => json!(d),
                };
            }
            json!({ "multi_match": multi_match })
        }
        Clause::Phrase {
            query,
            fields,
            boost,
        } => json!({
            "multi_match": {
                "query": query,
                "fields": weighted_fields(fields),
                "type": "phrase",
                "boost": boost
            }
        }),
        Clause::Match {
            field,
            query,
            boost,
        } => {
            let mut inner = serde_json::Map::new();
            inner.insert(
                field.name().to_string(),
                json!({ "query": query, "boost": boost }),
            );
            json!({ "match": inner })
        }
        Clause::Term { field, value } => {
            let mut inner = serde_json::Map::new();
            inner.insert(field.name().to_string(), json!(value));
            json!({ "term": inner })
        }
    }
}

/// `content^4`-style field list; unit weights are left bare.
fn weighted_fields(fields: &[FieldBoost]) -> Vec<String> {
    fields
        .iter()
        .map(|f| {
            if (f.boost - 1.0).abs() < f32::EPSILON {
                f.field.name().to_string()
            } else {
                format!("{}^{}", f.field.name(), f.boost)
            }
        })
        .collect()
}

// ─── Response parsing ────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: HitsBody,
}

#[derive(Deserialize)]
struct HitsBody {
    #[serde(default)]
    total: Option<TotalBody>,
    #[serde(default)]
    hits: Vec<HitBody>,
}

/// `total` is an object since ES 7, a bare number before.
#[derive(Deserialize)]
#[serde(untagged)]
enum TotalBody {
    Object { value: u64 },
    Count(u64),
}

#[derive(Deserialize)]
struct HitBody {
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source")]
    source: RuleDocument,
    #[serde(default)]
    highlight: HashMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

fn parse_search_response(
    body: Value,
    highlight_field: Option<&str>,
) -> Result<SearchResults, BackendError> {
    let parsed: SearchResponseBody =
        serde_json::from_value(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    let hits: Vec<SearchHit> = parsed
        .hits
        .hits
        .into_iter()
        .map(|mut hit| {
            let highlight_snippet = highlight_field
                .and_then(|field| hit.highlight.remove(field))
                .and_then(|fragments| fragments.into_iter().next());
            SearchHit {
                document: hit.source,
                relevance_score: hit.score.unwrap_or(0.0),
                highlight_snippet,
            }
        })
        .collect();

    let total = match parsed.hits.total {
        Some(TotalBody::Object { value }) | Some(TotalBody::Count(value)) => value,
        None => hits.len() as u64,
    };

    Ok(SearchResults { hits, total })
}
