// src/core/types.rs — Controller state, outcomes and settings

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::infra::config::Config;
use crate::infra::errors::TripwiseError;
use crate::intent::Intent;
use crate::judge::Verdict;

/// Returned when a draft fails the minimum-quality gates.
pub const CLARIFY_REPLY: &str =
    "Sorry, I couldn’t process that. Please clarify your destination or query.";

/// Returned when generation fails.
pub const FAILURE_REPLY: &str = "Sorry, something went wrong. Try rephrasing or another question.";

/// Marker that disqualifies a draft.
pub const NOT_APPLICABLE_MARKER: &str = "N/A";

/// Controller lifecycle, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    HistoryLoaded,
    IntentClassified,
    ContextGathered,
    Responded,
    Accepted,
    JudgedInvalid,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::HistoryLoaded => "history_loaded",
            Phase::IntentClassified => "intent_classified",
            Phase::ContextGathered => "context_gathered",
            Phase::Responded => "responded",
            Phase::Accepted => "accepted",
            Phase::JudgedInvalid => "judged_invalid",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-correction budget for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub retries_used: u8,
    pub max_retries: u8,
}

impl Attempt {
    pub fn new(max_retries: u8) -> Self {
        Self {
            retries_used: 0,
            max_retries,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retries_used < self.max_retries
    }

    /// The attempt after spending one retry.
    pub fn next(self) -> Self {
        Self {
            retries_used: self.retries_used.saturating_add(1),
            ..self
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.retries_used, self.max_retries)
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The first draft was stored and returned.
    Accepted { reply: String, verdict: Verdict },
    /// A rejected draft was purged and replaced by a retry.
    Corrected { reply: String, rejected: String },
    /// The draft failed the quality gates; nothing was stored for it.
    Clarified { reply: String },
    /// A bare "Valid"/"Invalid" answer, stored with the short TTL.
    Validation { reply: String },
    /// Generation failed; no assistant turn was stored.
    Failed { reply: String },
}

impl Outcome {
    pub fn reply(&self) -> &str {
        match self {
            Outcome::Accepted { reply, .. }
            | Outcome::Corrected { reply, .. }
            | Outcome::Clarified { reply }
            | Outcome::Validation { reply }
            | Outcome::Failed { reply } => reply,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::Corrected { .. } => "corrected",
            Outcome::Clarified { .. } => "clarified",
            Outcome::Validation { .. } => "validation",
            Outcome::Failed { .. } => "failed",
        }
    }

    pub(crate) fn clarified() -> Self {
        Outcome::Clarified {
            reply: CLARIFY_REPLY.into(),
        }
    }

    pub(crate) fn failed() -> Self {
        Outcome::Failed {
            reply: FAILURE_REPLY.into(),
        }
    }
}

/// Result of one controller run.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub outcome: Outcome,
    pub intent: Intent,
    pub location: Option<String>,
    pub attempt: Attempt,
}

impl Exchange {
    pub fn reply(&self) -> &str {
        self.outcome.reply()
    }

    pub fn into_reply(self) -> String {
        match self.outcome {
            Outcome::Accepted { reply, .. }
            | Outcome::Corrected { reply, .. }
            | Outcome::Clarified { reply }
            | Outcome::Validation { reply }
            | Outcome::Failed { reply } => reply,
        }
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    /// The caller sent something unusable; nothing was written.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The session store failed part-way through the request.
    #[error("session store failure: {0}")]
    Store(#[source] TripwiseError),
}

impl From<TripwiseError> for ControllerError {
    fn from(e: TripwiseError) -> Self {
        match e {
            TripwiseError::InvalidInput(msg) => ControllerError::InvalidInput(msg),
            other => ControllerError::Store(other),
        }
    }
}

/// Controller knobs.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub max_retries: u8,
    pub min_reply_chars: usize,
    pub default_session: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            min_reply_chars: 10,
            default_session: crate::session::DEFAULT_SESSION.into(),
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.correction.max_retries,
            min_reply_chars: cfg.correction.min_reply_chars,
            default_session: cfg.session.default_session.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget() {
        let a = Attempt::new(1);
        assert!(a.can_retry());
        assert_eq!(a.to_string(), "0/1");
        let b = a.next();
        assert!(!b.can_retry());
        assert_eq!(b.to_string(), "1/1");
        assert!(!Attempt::new(0).can_retry());
    }

    #[test]
    fn test_outcome_reply() {
        assert_eq!(Outcome::clarified().reply(), CLARIFY_REPLY);
        assert_eq!(Outcome::failed().kind(), "failed");
        let o = Outcome::Corrected {
            reply: "new".into(),
            rejected: "old".into(),
        };
        assert_eq!(o.reply(), "new");
    }

    #[test]
    fn test_error_mapping() {
        let e: ControllerError = TripwiseError::InvalidInput("user id is empty".into()).into();
        assert!(matches!(e, ControllerError::InvalidInput(_)));
        let e: ControllerError = TripwiseError::Store("closed".into()).into();
        assert!(matches!(e, ControllerError::Store(_)));
    }

    #[test]
    fn test_settings_from_config() {
        let s = ControllerSettings::from(&Config::default());
        assert_eq!(s.max_retries, 1);
        assert_eq!(s.min_reply_chars, 10);
        assert_eq!(s.default_session, "default");
    }
}
