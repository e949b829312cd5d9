// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub intent: IntentConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            log_level: "info".into(),
            cors_origins: vec![
                "http://localhost:3000".into(),
                "http://localhost:5173".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Generation model, "provider/model".
    pub chat: String,
    /// Embedding model used by the intent gate, "provider/model".
    pub embedder: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-provider base URL overrides (e.g. a local proxy).
    pub base_urls: HashMap<String, String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: "xai/grok-3".into(),
            embedder: "openai/text-embedding-3-small".into(),
            max_tokens: 500,
            temperature: 0.7,
            base_urls: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub ephemeral_ttl_secs: u64,
    pub default_session: String,
    pub db_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 7 * 24 * 60 * 60,
            ephemeral_ttl_secs: 60 * 60,
            default_session: "default".into(),
            db_path: None,
        }
    }
}

impl SessionConfig {
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(paths::db_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub threshold: f32,
    pub init_retries: u32,
    pub init_backoff_ms: u64,
    /// After a failed initialisation, requests skip classification this long.
    pub retry_cooldown_ms: u64,
    pub cache_file: Option<PathBuf>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            init_retries: 3,
            init_backoff_ms: 1000,
            retry_cooldown_ms: 30_000,
            cache_file: None,
        }
    }
}

impl IntentConfig {
    pub fn cache_file(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(paths::intent_cache_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Intents that receive external enrichment (by their wire names).
    pub enrich_intents: Vec<String>,
    pub attraction_limit: u32,
    pub llm_location_fallback: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enrich_intents: vec![
                "tripPlanning".into(),
                "packingSuggestions".into(),
                "attractions".into(),
                "other".into(),
            ],
            attraction_limit: 3,
            llm_location_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub generation_secs: u64,
    pub judge_secs: u64,
    pub lookup_secs: u64,
    pub embedding_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: 30,
            judge_secs: 20,
            lookup_secs: 10,
            embedding_secs: 15,
        }
    }
}

impl TimeoutConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn judge(&self) -> Duration {
        Duration::from_secs(self.judge_secs)
    }

    pub fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_secs)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub max_retries: u8,
    pub min_reply_chars: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            min_reply_chars: 10,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
