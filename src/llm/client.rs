//! HTTP generation client for Gemini (AI Studio or Vertex AI), OpenAI-compatible
//! servers and Ollama.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::llm::{GenerationBackend, GenerationError, GenerationParams};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const RETRY_BASE_DELAY_MS: u64 = 250;

pub struct HttpGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpGenerator {
    /// `client` carries the per-call timeout; hitting it yields
    /// [`GenerationError::Timeout`].
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    async fn call_once(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let text = match self.config.provider.as_str() {
            "gemini" | "vertex" => self.call_gemini(prompt, params).await?,
            "openai" => self.call_openai(prompt, params).await?,
            "ollama" => self.call_ollama(prompt, params).await?,
            other => {
                return Err(GenerationError::Unconfigured(format!(
                    "unknown LLM provider: {other}"
                )))
            }
        };
        non_blank(text)
    }

    // ─── Gemini / Vertex AI ──────────────────────────────

    fn gemini_endpoint(&self) -> Result<String, GenerationError> {
        let model = &self.config.model;
        if self.config.provider == "vertex" {
            let project = self.config.project_id.as_deref().ok_or_else(|| {
                GenerationError::Unconfigured("GOOGLE_CLOUD_PROJECT_ID is not set".to_string())
            })?;
            let location = &self.config.location;
            let base = self
                .config
                .base_url
                .clone()
                .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com"));
            Ok(format!(
                "{}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent",
                base.trim_end_matches('/')
            ))
        } else {
            let base = self.config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
            Ok(format!(
                "{}/v1beta/models/{model}:generateContent",
                base.trim_end_matches('/')
            ))
        }
    }

    async fn call_gemini(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let req = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        };

        let mut builder = self.client.post(self.gemini_endpoint()?).json(&req);
        if let Some(key) = &self.config.api_key {
            builder = if self.config.provider == "vertex" {
                builder.header("Authorization", format!("Bearer {key}"))
            } else {
                builder.header("x-goog-api-key", key)
            };
        }

        let resp = send(builder).await?;
        let body: GeminiResponse = read_json(resp).await?;
        gemini_text(body)
    }

    // ─── OpenAI-compatible ───────────────────────────────

    async fn call_openai(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let base = self.config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));

        let req = OpenAiChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: params.temperature,
            max_tokens: params.max_output_tokens,
        };

        let mut builder = self.client.post(&url).json(&req);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let resp = send(builder).await?;
        let body: OpenAiChatResponse = read_json(resp).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))
    }

    // ─── Ollama ──────────────────────────────────────────

    async fn call_ollama(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let base = self.config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        let url = format!("{}/api/chat", base.trim_end_matches('/'));

        let req = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_output_tokens,
            },
        };

        let resp = send(self.client.post(&url).json(&req)).await?;
        let body: OllamaChatResponse = read_json(resp).await?;
        Ok(body.message.content)
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerator {
    async fn generate_content(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let mut attempt = 0u32;
        loop {
            match self.call_once(prompt, params).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.min(6));
                    tracing::warn!(
                        "Generation attempt {} failed: {e}; retrying in {delay:?}",
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ─── Shared HTTP handling ────────────────────────────────

async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, GenerationError> {
    let resp = builder.send().await.map_err(transport_error)?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(GenerationError::Throttled {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GenerationError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
) -> Result<T, GenerationError> {
    resp.json().await.map_err(|e| {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Malformed(e.to_string())
        }
    })
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(e.to_string())
    }
}

fn non_blank(text: String) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        Err(GenerationError::Empty)
    } else {
        Ok(text)
    }
}

/// Text of the first part of the first candidate.
fn gemini_text(body: GeminiResponse) -> Result<String, GenerationError> {
    body.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| GenerationError::Malformed("no candidate text in response".to_string()))
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(provider: &str) -> HttpGenerator {
        let config = LlmConfig {
            provider: provider.to_string(),
            project_id: Some("demo-project".to_string()),
            ..LlmConfig::default()
        };
        HttpGenerator::new(reqwest::Client::new(), config)
    }

    #[test]
    fn test_gemini_endpoint() {
        let url = generator("gemini").gemini_endpoint().unwrap();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_vertex_endpoint_uses_project_and_location() {
        let url = generator("vertex").gemini_endpoint().unwrap();
        assert_eq!(
            url,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo-project/locations/us-central1/publishers/google/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_vertex_without_project_is_unconfigured() {
        let mut gen = generator("vertex");
        gen.config.project_id = None;
        assert!(matches!(
            gen.gemini_endpoint(),
            Err(GenerationError::Unconfigured(_))
        ));
    }

    #[test]
    fn test_gemini_request_shape() {
        let req = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".into()),
                parts: vec![GeminiPart {
                    text: Some("Bonjour".into()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Bonjour");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_gemini_text_extracts_first_part() {
        let body: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Selon l'Article 21.1"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(gemini_text(body).unwrap(), "Selon l'Article 21.1");
    }

    #[test]
    fn test_gemini_text_without_candidates_is_malformed() {
        // Safety-blocked prompts come back with no candidates at all
        let body: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(gemini_text(body), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_non_blank_rejects_whitespace() {
        assert!(matches!(non_blank("  \n".into()), Err(GenerationError::Empty)));
        assert_eq!(non_blank("ok".into()).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_unconfigured() {
        let gen = generator("carrier-pigeon");
        let err = gen
            .generate_content("q", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unconfigured(_)));
    }
}
