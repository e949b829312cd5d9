// src/session/mod.rs — Session-scoped conversation state
//
// A TurnLog is the ordered, TTL-bounded list of turns for one (user, session)
// key. Reads always come back oldest-first, whatever the backend stores.

pub mod schema;
pub mod sqlite;
pub mod store_server;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infra::config::SessionConfig;
use crate::infra::errors::TripwiseError;

pub use sqlite::TurnStore;
pub use store_server::{spawn_store_server, StoreHandle};

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = TripwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => Err(TripwiseError::Store(format!("unknown turn role '{other}'"))),
        }
    }
}

/// One message in a conversation. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Assigned at creation; the purge path targets turns by this id.
    pub id: String,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}

/// `(user_id, session_id)`, both non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    user_id: String,
    session_id: String,
}

impl SessionKey {
    /// Validate and normalise a caller-supplied identifier pair.
    pub fn new(user_id: &str, session_id: Option<&str>) -> Result<Self, TripwiseError> {
        Self::with_default(user_id, session_id, DEFAULT_SESSION)
    }

    pub fn with_default(
        user_id: &str,
        session_id: Option<&str>,
        default_session: &str,
    ) -> Result<Self, TripwiseError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(TripwiseError::InvalidInput("user id is empty".into()));
        }
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_session);
        Ok(Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conversation:{}:{}", self.user_id, self.session_id)
    }
}

/// Which expiry an append refreshes the log to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTtl {
    /// Regular conversation turns (7 days by default).
    Standard,
    /// Validation-only exchanges (1 hour by default).
    Ephemeral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub standard: Duration,
    pub ephemeral: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            standard: Duration::from_secs(7 * 24 * 60 * 60),
            ephemeral: Duration::from_secs(60 * 60),
        }
    }
}

impl TtlPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            standard: Duration::from_secs(config.ttl_secs),
            ephemeral: Duration::from_secs(config.ephemeral_ttl_secs),
        }
    }

    pub fn duration(&self, ttl: TurnTtl) -> Duration {
        match ttl {
            TurnTtl::Standard => self.standard,
            TurnTtl::Ephemeral => self.ephemeral,
        }
    }
}

/// Selects turns for [`SessionStore::purge`].
#[derive(Clone)]
pub enum TurnMatcher {
    /// The turn with this id.
    Id(String),
    /// Every turn with exactly this role and content.
    Exact { role: TurnRole, content: String },
    /// Arbitrary predicate.
    Custom(Arc<dyn Fn(&Turn) -> bool + Send + Sync>),
}

impl TurnMatcher {
    pub fn exact(role: TurnRole, content: impl Into<String>) -> Self {
        TurnMatcher::Exact {
            role,
            content: content.into(),
        }
    }

    pub fn matches(&self, turn: &Turn) -> bool {
        match self {
            TurnMatcher::Id(id) => turn.id == *id,
            TurnMatcher::Exact { role, content } => turn.role == *role && turn.content == *content,
            TurnMatcher::Custom(f) => f(turn),
        }
    }
}

impl fmt::Debug for TurnMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnMatcher::Id(id) => f.debug_tuple("Id").field(id).finish(),
            TurnMatcher::Exact { role, content } => f
                .debug_struct("Exact")
                .field("role", role)
                .field("content", content)
                .finish(),
            TurnMatcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Ordered, TTL-bounded turn logs addressed by [`SessionKey`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append to the tail of the key's log and refresh the whole log's TTL.
    async fn append(&self, key: &SessionKey, turn: Turn, ttl: TurnTtl) -> Result<(), TripwiseError>;

    /// The full log, oldest first. Empty when never written or expired.
    async fn read_all(&self, key: &SessionKey) -> Result<Vec<Turn>, TripwiseError>;

    /// Remove every matching turn atomically; returns how many were removed.
    /// Survivors keep their order and get the standard TTL; an emptied log
    /// is removed entirely.
    async fn purge(&self, key: &SessionKey, matcher: TurnMatcher) -> Result<usize, TripwiseError>;
}

/// Render turns as `role: content` lines for prompts.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n")
}
