// src/provider/openai_compat.rs — Generic OpenAI-compatible provider
//
// Used for xAI, DeepSeek and OpenAI itself: `/chat/completions` for generation,
// `/embeddings` for the intent gate.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{ChatRequest, ChatResponse, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::TripwiseError;

/// Embedding model used when the provider is asked to embed.
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Provider for any OpenAI-compatible API endpoint.
pub struct OpenAICompatProvider {
    id_str: String,
    name_str: String,
    api_key: String,
    base_url: String,
    embed_model: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_key: String,
        base_url: String,
    ) -> Self {
        Self {
            id_str: id.into(),
            name_str: name.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model: DEFAULT_EMBED_MODEL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    fn transport_error(&self, e: reqwest::Error) -> TripwiseError {
        TripwiseError::Provider {
            provider: self.id_str.clone(),
            message: e.to_string(),
            retriable: e.is_timeout() || e.is_connect(),
        }
    }

    /// Turn a non-success HTTP status into the matching error.
    async fn status_error(&self, response: reqwest::Response) -> TripwiseError {
        let status = response.status();
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(0);
        let body = response.text().await.unwrap_or_default();
        classify_status(&self.id_str, status, retry_after_ms, body)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, TripwiseError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(
                "User-Agent",
                format!("tripwise/{}", env!("CARGO_PKG_VERSION")),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        response.json().await.map_err(|e| TripwiseError::Provider {
            provider: self.id_str.clone(),
            message: format!("Failed to parse response: {e}"),
            retriable: false,
        })
    }
}

fn classify_status(
    provider: &str,
    status: StatusCode,
    retry_after_ms: u64,
    body: String,
) -> TripwiseError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return TripwiseError::RateLimited {
            provider: provider.to_string(),
            retry_after_ms,
        };
    }
    TripwiseError::Provider {
        provider: provider.to_string(),
        message: format!("HTTP {status}: {body}"),
        retriable: status.is_server_error(),
    }
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn build_chat_body(request: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({"role": "system", "content": system}));
    }
    for m in &request.messages {
        messages.push(serde_json::json!({
            "role": role_str(&m.role),
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if let Some(top_p) = request.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    body
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    fn name(&self) -> &str {
        &self.name_str
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, TripwiseError> {
        let resp = self
            .post_json("/chat/completions", &build_chat_body(&request))
            .await?;

        let Some(content) = resp["choices"][0]["message"]["content"].as_str() else {
            return Err(TripwiseError::Provider {
                provider: self.id_str.clone(),
                message: "Response carried no choices".into(),
                retriable: false,
            });
        };

        let usage = TokenUsage {
            input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(ChatResponse {
            content: content.to_string(),
            usage,
            stop_reason: StopReason::from_finish_reason(
                resp["choices"][0]["finish_reason"].as_str(),
            ),
        })
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, TripwiseError> {
        let body = serde_json::json!({
            "model": self.embed_model,
            "input": texts,
        });
        let resp = self.post_json("/embeddings", &body).await?;

        let data = resp["data"].as_array().ok_or_else(|| TripwiseError::Provider {
            provider: self.id_str.clone(),
            message: "Embedding response carried no data".into(),
            retriable: false,
        })?;

        let vectors: Vec<Vec<f32>> = data
            .iter()
            .map(|item| {
                item["embedding"]
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        if vectors.len() != texts.len() {
            return Err(TripwiseError::Provider {
                provider: self.id_str.clone(),
                message: format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    vectors.len()
                ),
                retriable: false,
            });
        }

        Ok(vectors)
    }
}
