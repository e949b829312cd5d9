// src/provider/resolver.rs — Build providers from "provider/model" references and env keys

use std::sync::Arc;

use super::openai_compat::OpenAICompatProvider;
use super::retry::RetryProvider;
use super::{ModelProvider, ModelRef};
use crate::infra::config::ModelsConfig;
use crate::infra::errors::TripwiseError;

/// An OpenAI-compatible endpoint the resolver knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownProvider {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub env_key: &'static str,
}

pub const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        id: "xai",
        name: "xAI",
        base_url: "https://api.x.ai/v1",
        env_key: "XAI_API_KEY",
    },
    KnownProvider {
        id: "deepseek",
        name: "DeepSeek",
        base_url: "https://api.deepseek.com/v1",
        env_key: "DEEPSEEK_API_KEY",
    },
    KnownProvider {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        env_key: "OPENAI_API_KEY",
    },
];

pub fn find_known(id: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.id == id)
}

/// Resolve `model_ref` to a retrying provider, reading its API key from the environment.
pub fn resolve(
    model_ref: &ModelRef,
    models: &ModelsConfig,
) -> Result<Arc<dyn ModelProvider>, TripwiseError> {
    resolve_with(model_ref, models, |var| std::env::var(var).ok())
}

/// Like [`resolve`], with an injectable environment lookup.
pub fn resolve_with(
    model_ref: &ModelRef,
    models: &ModelsConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn ModelProvider>, TripwiseError> {
    let known = find_known(&model_ref.provider).ok_or_else(|| {
        TripwiseError::Config(format!(
            "Unknown provider '{}'. Expected one of: {}",
            model_ref.provider,
            KNOWN_PROVIDERS
                .iter()
                .map(|p| p.id)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let api_key = env(known.env_key)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            TripwiseError::Config(format!(
                "{} is not set; required for model '{model_ref}'",
                known.env_key
            ))
        })?;

    let base_url = models
        .base_urls
        .get(known.id)
        .cloned()
        .unwrap_or_else(|| known.base_url.to_string());

    tracing::info!(provider = known.id, base_url = %base_url, "Resolved provider");

    let provider = OpenAICompatProvider::new(known.id, known.name, api_key, base_url)
        .with_embed_model(model_ref.model.clone());
    Ok(Arc::new(RetryProvider::new(Arc::new(provider))))
}

/// Resolve the embedding provider, falling back to the chat provider when the
/// embedder cannot be built. Returns the provider and the model that will
/// actually produce embeddings.
pub fn resolve_embedder(
    embed_ref: &ModelRef,
    models: &ModelsConfig,
    chat_ref: &ModelRef,
    chat_provider: Arc<dyn ModelProvider>,
) -> (Arc<dyn ModelProvider>, ModelRef) {
    resolve_embedder_with(embed_ref, models, chat_ref, chat_provider, |var| {
        std::env::var(var).ok()
    })
}

/// Like [`resolve_embedder`], with an injectable environment lookup.
pub fn resolve_embedder_with(
    embed_ref: &ModelRef,
    models: &ModelsConfig,
    chat_ref: &ModelRef,
    chat_provider: Arc<dyn ModelProvider>,
    env: impl Fn(&str) -> Option<String>,
) -> (Arc<dyn ModelProvider>, ModelRef) {
    match resolve_with(embed_ref, models, env) {
        Ok(provider) => (provider, embed_ref.clone()),
        Err(e) => {
            tracing::warn!(
                embedder = %embed_ref,
                fallback = %chat_ref,
                "Embedding provider unavailable ({e}); using the chat provider"
            );
            (chat_provider, chat_ref.clone())
        }
    }
}

/// Parse a "provider/model" string from config.
pub fn parse_model(s: &str) -> Result<ModelRef, TripwiseError> {
    ModelRef::parse(s)
        .ok_or_else(|| TripwiseError::Config(format!("Expected 'provider/model', got '{s}'")))
}
