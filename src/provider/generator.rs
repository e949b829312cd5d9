// src/provider/generator.rs — Single-turn text generation over a ModelProvider

use std::sync::Arc;
use std::time::Duration;

use super::{ChatRequest, Message, ModelProvider};
use crate::infra::config::{ModelsConfig, TimeoutConfig};
use crate::infra::errors::{with_timeout, TripwiseError};

const TRAVEL_SYSTEM: &str = "You are a helpful travel assistant.";

/// `generate(prompt) -> text` with a fixed persona, sampling settings and a deadline.
///
/// Cheap to clone; the judge uses a clone with its own deadline.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn ModelProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    timeout: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.9,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        models: &ModelsConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self::new(provider, model)
            .with_max_tokens(models.max_tokens)
            .with_temperature(models.temperature)
            .with_timeout(timeouts.generation())
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate a completion for `prompt`. An empty completion is `Ok("")`,
    /// never an error; transport and provider failures are errors.
    pub async fn generate(&self, prompt: &str) -> Result<String, TripwiseError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
            system: Some(TRAVEL_SYSTEM.into()),
        };

        let response = with_timeout("generation", self.timeout, self.provider.chat(request)).await?;

        tracing::debug!(
            provider = self.provider.id(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Generation complete",
        );

        Ok(response.content.trim().to_string())
    }
}
