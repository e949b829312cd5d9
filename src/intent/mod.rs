// src/intent/mod.rs — Embedding-based intent classification

pub mod centroids;
pub mod examples;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::infra::config::{IntentConfig, TimeoutConfig};
use crate::infra::errors::{with_timeout, TripwiseError};
use crate::provider::ModelProvider;

pub use centroids::Centroids;

/// Task category of an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    TripPlanning,
    PackingSuggestions,
    Attractions,
    Other,
}

impl Intent {
    /// Every intent, in tie-break order.
    pub const ALL: [Intent; 4] = [
        Intent::TripPlanning,
        Intent::PackingSuggestions,
        Intent::Attractions,
        Intent::Other,
    ];

    /// Intents with a centroid. `Other` is the below-threshold fallback.
    pub const CLASSIFIABLE: [Intent; 3] = [
        Intent::TripPlanning,
        Intent::PackingSuggestions,
        Intent::Attractions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TripPlanning => "tripPlanning",
            Intent::PackingSuggestions => "packingSuggestions",
            Intent::Attractions => "attractions",
            Intent::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = TripwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| TripwiseError::Config(format!("unknown intent '{s}'")))
    }
}

/// Classifies messages against lazily computed intent centroids.
///
/// Centroids are loaded from the cache file or computed from
/// [`examples`] on first use. Only one initialisation attempt runs at a time;
/// callers that queued behind it share its outcome. After a failure, requests
/// report `CapabilityUnavailable` without touching the embedder until the
/// cooldown has passed. Retries with backoff belong to [`IntentGate::warm_up`].
pub struct IntentGate {
    embedder: Arc<dyn ModelProvider>,
    model: String,
    threshold: f32,
    init_retries: u32,
    init_backoff: Duration,
    retry_cooldown: Duration,
    embed_timeout: Duration,
    cache_file: Option<PathBuf>,
    centroids: OnceCell<Centroids>,
    attempts: AtomicU64,
    last_failure: Mutex<Option<InitFailure>>,
}

struct InitFailure {
    at: Instant,
    message: String,
}

impl IntentGate {
    pub fn new(
        embedder: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        config: &IntentConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            embedder,
            model: model.into(),
            threshold: config.threshold,
            init_retries: config.init_retries,
            init_backoff: Duration::from_millis(config.init_backoff_ms),
            retry_cooldown: Duration::from_millis(config.retry_cooldown_ms),
            embed_timeout: timeouts.embedding(),
            cache_file: Some(config.cache_file()),
            centroids: OnceCell::new(),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// A gate with centroids already in place (tests, precomputed sets).
    pub fn with_centroids(
        embedder: Arc<dyn ModelProvider>,
        centroids: Centroids,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            model: String::new(),
            threshold,
            init_retries: 0,
            init_backoff: Duration::ZERO,
            retry_cooldown: Duration::ZERO,
            embed_timeout: TimeoutConfig::default().embedding(),
            cache_file: None,
            centroids: OnceCell::new_with(Some(centroids)),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    pub fn with_cache_file(mut self, path: Option<PathBuf>) -> Self {
        self.cache_file = path;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.centroids.initialized()
    }

    /// Centroids for the request path: at most one initialisation attempt,
    /// shared with every caller waiting on it, and none during the cooldown.
    pub async fn ensure_ready(&self) -> Result<&Centroids, TripwiseError> {
        if let Some(centroids) = self.centroids.get() {
            return Ok(centroids);
        }
        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.last_failure.lock().await;
        if let Some(centroids) = self.centroids.get() {
            return Ok(centroids);
        }
        if let Some(failure) = last_failure.as_ref() {
            let shared = self.attempts.load(Ordering::Acquire) != seen;
            if shared || failure.at.elapsed() < self.retry_cooldown {
                return Err(TripwiseError::unavailable(
                    "intent",
                    format!("initialisation failed: {}", failure.message),
                ));
            }
        }
        self.attempt(&mut last_failure).await
    }

    /// Initialise in the background, retrying with exponential backoff.
    /// The lock is released while sleeping so requests fail fast meanwhile.
    pub async fn warm_up(&self) -> Result<(), TripwiseError> {
        let mut retry = 0;
        loop {
            let outcome = {
                let mut last_failure = self.last_failure.lock().await;
                if self.is_ready() {
                    return Ok(());
                }
                self.attempt(&mut last_failure).await.map(|_| ())
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if retry >= self.init_retries => {
                    tracing::error!(attempts = retry + 1, "Intent gate initialisation failed: {e}");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.init_backoff * 2u32.saturating_pow(retry);
                    tracing::warn!(
                        attempt = retry + 1,
                        max_retries = self.init_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Intent gate initialisation failed, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }

    /// Classify `text`. Below-threshold input is [`Intent::Other`]; an
    /// embedding failure surfaces as `CapabilityUnavailable` or `Timeout`.
    pub async fn classify(&self, text: &str) -> Result<Intent, TripwiseError> {
        let centroids = self.ensure_ready().await?;
        let embedding = self.embed_one(text).await?;
        Ok(centroids.classify(&embedding, self.threshold))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, TripwiseError> {
        let vectors = self.embed_batch(&[text]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| TripwiseError::unavailable("embedding", "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, TripwiseError> {
        with_timeout("embedding", self.embed_timeout, self.embedder.embed(texts))
            .await
            .map_err(|e| match e {
                TripwiseError::CapabilityUnavailable { .. } | TripwiseError::Timeout { .. } => e,
                other => TripwiseError::unavailable("embedding", other.to_string()),
            })
    }

    /// One initialisation attempt. Caller holds the `last_failure` lock.
    async fn attempt(
        &self,
        last_failure: &mut Option<InitFailure>,
    ) -> Result<&Centroids, TripwiseError> {
        let result = self.load_or_compute().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        match result {
            Ok(computed) => {
                *last_failure = None;
                Ok(self.centroids.get_or_init(|| async move { computed }).await)
            }
            Err(e) => {
                *last_failure = Some(InitFailure {
                    at: Instant::now(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn load_or_compute(&self) -> Result<Centroids, TripwiseError> {
        if let Some(path) = &self.cache_file {
            if let Some(cached) = centroids::load_cache(path, &self.model) {
                tracing::info!(path = %path.display(), "Loaded intent centroids from cache");
                return Ok(cached);
            }
        }

        let computed = self.compute().await?;
        if let Some(path) = &self.cache_file {
            if let Err(e) = centroids::save_cache(path, &self.model, &computed) {
                tracing::warn!(path = %path.display(), "Could not write intent cache: {e}");
            }
        }
        tracing::info!(dimension = computed.dimension(), "Intent detection initialized");
        Ok(computed)
    }

    async fn compute(&self) -> Result<Centroids, TripwiseError> {
        let mut by_intent = BTreeMap::new();
        for intent in Intent::CLASSIFIABLE {
            let vectors = self.embed_batch(examples::for_intent(intent)).await?;
            let centroid = centroids::mean_vector(&vectors).ok_or_else(|| {
                TripwiseError::unavailable("embedding", format!("no usable vectors for {intent}"))
            })?;
            by_intent.insert(intent, centroid);
        }
        Centroids::new(by_intent)
            .ok_or_else(|| TripwiseError::unavailable("embedding", "inconsistent centroid dimensions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Embeds example sentences onto their intent's axis and free text by
    /// keyword; anything else lands on an unrelated fourth axis.
    struct KeywordEmbedder {
        fail_first: u32,
        batches: AtomicU32,
    }

    impl KeywordEmbedder {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                batches: AtomicU32::new(0),
            }
        }
    }

    fn axis(text: &str) -> Vec<f32> {
        let t = text.to_lowercase();
        if examples::TRIP_PLANNING.contains(&text) || t.contains("plan") {
            vec![1.0, 0.0, 0.0, 0.0]
        } else if examples::PACKING_SUGGESTIONS.contains(&text) || t.contains("pack") {
            vec![0.0, 1.0, 0.0, 0.0]
        } else if examples::ATTRACTIONS.contains(&text) || t.contains("visit") {
            vec![0.0, 0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 0.0, 1.0]
        }
    }

    #[async_trait]
    impl ModelProvider for KeywordEmbedder {
        fn id(&self) -> &str {
            "keywords"
        }
        fn name(&self) -> &str {
            "Keywords"
        }
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, TripwiseError> {
            Err(TripwiseError::unavailable("chat", "embedder only"))
        }
        async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, TripwiseError> {
            let n = self.batches.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(TripwiseError::Provider {
                    provider: "keywords".into(),
                    message: "HTTP 503".into(),
                    retriable: true,
                });
            }
            Ok(texts.iter().map(|t| axis(t)).collect())
        }
    }

    fn config(retries: u32, cooldown_ms: u64) -> IntentConfig {
        IntentConfig {
            threshold: 0.6,
            init_retries: retries,
            init_backoff_ms: 1,
            retry_cooldown_ms: cooldown_ms,
            cache_file: None,
        }
    }

    fn gate(embedder: Arc<KeywordEmbedder>, retries: u32) -> IntentGate {
        gate_with_cooldown(embedder, retries, 0)
    }

    fn gate_with_cooldown(embedder: Arc<KeywordEmbedder>, retries: u32, cooldown_ms: u64) -> IntentGate {
        IntentGate::new(
            embedder,
            "test/keywords",
            &config(retries, cooldown_ms),
            &TimeoutConfig::default(),
        )
        .with_cache_file(None)
    }

    #[test]
    fn test_intent_wire_names() {
        assert_eq!(
            serde_json::to_string(&Intent::PackingSuggestions).unwrap(),
            "\"packingSuggestions\""
        );
        assert_eq!("tripPlanning".parse::<Intent>().unwrap(), Intent::TripPlanning);
        assert!("sightseeing".parse::<Intent>().is_err());
    }

    #[tokio::test]
    async fn test_classify_after_lazy_init() {
        let g = gate(Arc::new(KeywordEmbedder::new(0)), 0);
        assert!(!g.is_ready());
        assert_eq!(
            g.classify("What should I pack for Berlin?").await.unwrap(),
            Intent::PackingSuggestions
        );
        assert!(g.is_ready());
        assert_eq!(g.classify("hello there").await.unwrap(), Intent::Other);
    }

    #[tokio::test]
    async fn test_warm_up_retries_then_succeeds() {
        let embedder = Arc::new(KeywordEmbedder::new(2));
        let g = gate(embedder.clone(), 3);
        g.warm_up().await.unwrap();
        assert!(g.is_ready());
        // Two failed batches, then one batch per classifiable intent.
        assert_eq!(
            embedder.batches.load(Ordering::SeqCst),
            2 + Intent::CLASSIFIABLE.len() as u32
        );
    }

    #[tokio::test]
    async fn test_warm_up_gives_up_after_retries() {
        let embedder = Arc::new(KeywordEmbedder::new(u32::MAX));
        let g = gate(embedder.clone(), 2);
        let err = g.warm_up().await.unwrap_err();
        assert!(matches!(err, TripwiseError::CapabilityUnavailable { .. }));
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 3);
        assert!(!g.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_classify_during_outage_shares_one_attempt() {
        let embedder = Arc::new(KeywordEmbedder::new(u32::MAX));
        let g = Arc::new(gate_with_cooldown(embedder.clone(), 3, 60_000));

        let started = Instant::now();
        let mut tasks = Vec::new();
        for _ in 0..5 {
            let g = g.clone();
            tasks.push(tokio::spawn(async move { g.classify("plan a trip").await }));
        }
        for t in tasks {
            let err = t.await.unwrap().unwrap_err();
            assert!(matches!(err, TripwiseError::CapabilityUnavailable { .. }));
        }

        // No retries or backoff on the request path.
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cooldown_skips_embedder_then_allows_a_new_attempt() {
        let embedder = Arc::new(KeywordEmbedder::new(1));
        let g = gate_with_cooldown(embedder.clone(), 0, 50);

        assert!(g.classify("plan a trip").await.is_err());
        assert!(g.classify("plan a trip").await.is_err());
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(g.classify("plan a trip").await.unwrap(), Intent::TripPlanning);
    }

    #[tokio::test]
    async fn test_init_failure_is_unavailable_and_not_poisoned() {
        let embedder = Arc::new(KeywordEmbedder::new(2));
        let g = gate(embedder.clone(), 0);

        let err = g.classify("plan a trip").await.unwrap_err();
        assert!(matches!(err, TripwiseError::CapabilityUnavailable { .. }));
        assert!(!g.is_ready());

        let err = g.classify("plan a trip").await.unwrap_err();
        assert!(matches!(err, TripwiseError::CapabilityUnavailable { .. }));

        // Third batch onwards succeeds.
        assert_eq!(g.classify("plan a trip").await.unwrap(), Intent::TripPlanning);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_initialise_once() {
        let embedder = Arc::new(KeywordEmbedder::new(0));
        let g = Arc::new(gate(embedder.clone(), 0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let g = g.clone();
            tasks.push(tokio::spawn(async move { g.ensure_ready().await.map(|_| ()) }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        // One batch per classifiable intent, no matter how many callers.
        assert_eq!(
            embedder.batches.load(Ordering::SeqCst),
            Intent::CLASSIFIABLE.len() as u32
        );
    }

    #[tokio::test]
    async fn test_cache_is_written_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intent_embeddings.json");

        let first = Arc::new(KeywordEmbedder::new(0));
        gate(first.clone(), 0)
            .with_cache_file(Some(path.clone()))
            .ensure_ready()
            .await
            .unwrap();
        assert!(path.exists());

        let second = Arc::new(KeywordEmbedder::new(0));
        gate(second.clone(), 0)
            .with_cache_file(Some(path))
            .ensure_ready()
            .await
            .unwrap();
        assert_eq!(second.batches.load(Ordering::SeqCst), 0);
    }
}
