// tests/common/mod.rs — Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tripwise::context::attractions::{Attraction, AttractionLookup};
use tripwise::context::countries::CountryLookup;
use tripwise::context::location::ChainLocationExtractor;
use tripwise::context::weather::{WeatherLookup, WeatherReport};
use tripwise::context::ContextAggregator;
use tripwise::core::{ControllerSettings, CorrectionController};
use tripwise::infra::errors::TripwiseError;
use tripwise::intent::{Centroids, Intent, IntentGate};
use tripwise::judge::ResponseJudge;
use tripwise::provider::{ChatRequest, ChatResponse, Generator, ModelProvider, StopReason, TokenUsage};
use tripwise::session::{
    spawn_store_server, SessionKey, SessionStore, StoreHandle, TtlPolicy, Turn, TurnMatcher,
    TurnRole, TurnStore, TurnTtl,
};

// ---------- Models ----------

/// Replies from a queue, `None` meaning a provider failure. Records every prompt.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.map(String::from)).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, TripwiseError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        match self.replies.lock().unwrap().pop_front().flatten() {
            Some(content) => Ok(ChatResponse {
                content,
                usage: TokenUsage::default(),
                stop_reason: StopReason::EndTurn,
            }),
            None => Err(TripwiseError::Provider {
                provider: "scripted".into(),
                message: "HTTP 500".into(),
                retriable: false,
            }),
        }
    }

    async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, TripwiseError> {
        Err(TripwiseError::unavailable("embedding", "scripted model cannot embed"))
    }
}

/// One axis per intent, chosen by keyword; anything else lands on a fourth axis.
pub struct KeywordEmbedder {
    pub fail: bool,
}

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        if lower.contains("attraction") {
            vec![0.0, 0.0, 1.0, 0.0]
        } else if lower.contains("pack") {
            vec![0.0, 1.0, 0.0, 0.0]
        } else if lower.contains("plan") || lower.contains("trip") {
            vec![1.0, 0.0, 0.0, 0.0]
        } else {
            vec![0.0, 0.0, 0.0, 1.0]
        }
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

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, TripwiseError> {
        Err(TripwiseError::unavailable("chat", "embedder only"))
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, TripwiseError> {
        if self.fail {
            return Err(TripwiseError::unavailable("embedding", "model not loaded"));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

pub fn keyword_centroids() -> Centroids {
    let mut by_intent = BTreeMap::new();
    by_intent.insert(Intent::TripPlanning, vec![1.0, 0.0, 0.0, 0.0]);
    by_intent.insert(Intent::PackingSuggestions, vec![0.0, 1.0, 0.0, 0.0]);
    by_intent.insert(Intent::Attractions, vec![0.0, 0.0, 1.0, 0.0]);
    Centroids::new(by_intent).unwrap()
}

// ---------- Lookups ----------

/// Canned weather, country and attraction data.
pub struct Lookups {
    pub weather: Option<WeatherReport>,
    pub country: Option<String>,
    pub places: Option<Vec<Attraction>>,
    pub calls: AtomicUsize,
}

impl Default for Lookups {
    fn default() -> Self {
        Self {
            weather: Some(WeatherReport {
                description: "light snow".into(),
                temperature: -1.0,
                country: Some("DE".into()),
            }),
            country: Some(
                "Country: Germany, Capital: Berlin, Currency: Euro, Languages: German, Population: 83,240,525"
                    .into(),
            ),
            places: Some(vec![
                Attraction {
                    name: "Marienplatz".into(),
                    category: "tourism".into(),
                },
                Attraction {
                    name: "Nymphenburg Palace".into(),
                    category: "leisure".into(),
                },
            ]),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WeatherLookup for Lookups {
    async fn current(&self, _location: &str) -> Result<WeatherReport, TripwiseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.weather
            .clone()
            .ok_or_else(|| TripwiseError::unavailable("weather", "down"))
    }
}

#[async_trait]
impl CountryLookup for Lookups {
    async fn summary(&self, _country: &str) -> Result<String, TripwiseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.country
            .clone()
            .ok_or_else(|| TripwiseError::unavailable("country", "down"))
    }
}

#[async_trait]
impl AttractionLookup for Lookups {
    async fn near(&self, _location: &str, limit: u32) -> Result<Vec<Attraction>, TripwiseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.places
            .clone()
            .map(|p| p.into_iter().take(limit as usize).collect())
            .ok_or_else(|| TripwiseError::unavailable("attractions", "down"))
    }
}

// ---------- Store ----------

/// Delegates to a real in-memory store and records what was written.
pub struct RecordingStore {
    inner: StoreHandle,
    appends: Mutex<Vec<(TurnRole, String, TurnTtl)>>,
    purges: AtomicUsize,
    pub failing: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        let store = TurnStore::in_memory(TtlPolicy::default()).unwrap();
        let (inner, _task) = spawn_store_server(store);
        Arc::new(Self {
            inner,
            appends: Mutex::new(Vec::new()),
            purges: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn appends(&self) -> Vec<(TurnRole, String, TurnTtl)> {
        self.appends.lock().unwrap().clone()
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub async fn history(&self, user: &str, session: Option<&str>) -> Vec<Turn> {
        let key = SessionKey::new(user, session).unwrap();
        self.inner.read_all(&key).await.unwrap()
    }

    fn check(&self) -> Result<(), TripwiseError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TripwiseError::Store("connection lost".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn append(&self, key: &SessionKey, turn: Turn, ttl: TurnTtl) -> Result<(), TripwiseError> {
        self.check()?;
        self.appends
            .lock()
            .unwrap()
            .push((turn.role, turn.content.clone(), ttl));
        self.inner.append(key, turn, ttl).await
    }

    async fn read_all(&self, key: &SessionKey) -> Result<Vec<Turn>, TripwiseError> {
        self.check()?;
        self.inner.read_all(key).await
    }

    async fn purge(&self, key: &SessionKey, matcher: TurnMatcher) -> Result<usize, TripwiseError> {
        self.check()?;
        self.purges.fetch_add(1, Ordering::SeqCst);
        self.inner.purge(key, matcher).await
    }
}

// ---------- Harness ----------

pub struct Harness {
    pub controller: Arc<CorrectionController>,
    pub store: Arc<RecordingStore>,
    pub chat: Arc<ScriptedModel>,
    pub judge: Arc<ScriptedModel>,
    pub lookups: Arc<Lookups>,
}

pub struct HarnessBuilder {
    chat: Vec<Option<&'static str>>,
    judge: Vec<Option<&'static str>>,
    lookups: Lookups,
    settings: ControllerSettings,
    embedder_fails: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            chat: Vec::new(),
            judge: Vec::new(),
            lookups: Lookups::default(),
            settings: ControllerSettings::default(),
            embedder_fails: false,
        }
    }

    pub fn chat(mut self, replies: &[Option<&'static str>]) -> Self {
        self.chat = replies.to_vec();
        self
    }

    pub fn judge(mut self, replies: &[Option<&'static str>]) -> Self {
        self.judge = replies.to_vec();
        self
    }

    pub fn lookups(mut self, lookups: Lookups) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn embedder_fails(mut self) -> Self {
        self.embedder_fails = true;
        self
    }

    /// Must run inside a tokio runtime (the store server is spawned).
    pub fn build(self) -> Harness {
        let store = RecordingStore::new();
        let chat = ScriptedModel::new(&self.chat);
        let judge = ScriptedModel::new(&self.judge);
        let lookups = Arc::new(self.lookups);

        let intents = IntentGate::with_centroids(
            Arc::new(KeywordEmbedder {
                fail: self.embedder_fails,
            }),
            keyword_centroids(),
            0.6,
        );
        let aggregator = ContextAggregator::new(
            Arc::new(ChainLocationExtractor::standard(None)),
            lookups.clone(),
            lookups.clone(),
            lookups.clone(),
        );
        let controller = CorrectionController::new(
            store.clone(),
            Arc::new(intents),
            Arc::new(aggregator),
            ResponseJudge::new(Generator::new(judge.clone(), "judge-model")),
            Generator::new(chat.clone(), "chat-model"),
        )
        .with_settings(self.settings);

        Harness {
            controller: Arc::new(controller),
            store,
            chat,
            judge,
            lookups,
        }
    }
}
