// src/context/location.rs — Location extraction strategies
//
// Strategies are tried in order by `ChainLocationExtractor`; the first one that
// names a place wins. Extracted locations are lower-cased.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::provider::Generator;
use crate::session::{Turn, TurnRole};

#[async_trait]
pub trait LocationExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// The place `message` is about, if this strategy can tell.
    async fn extract(&self, message: &str, history: &[Turn]) -> Option<String>;
}

// A preposition followed by one or more capitalised words, with an optional
// ", Region" tail that is matched but not kept.
const PLACE_PATTERN: &str = r"(?:^|[^\p{L}])(?i:in|to|for|at|from|visit|visiting|around|near|about)\s+(\p{Lu}[\p{L}'’.-]*(?:\s+\p{Lu}[\p{L}'’.-]*)*)(?:,\s*\p{Lu}\p{L}*(?:\s+\p{Lu}\p{L}*)*)?";

static PLACE_AFTER_PREPOSITION: OnceLock<Option<Regex>> = OnceLock::new();

fn place_pattern() -> Option<&'static Regex> {
    PLACE_AFTER_PREPOSITION
        .get_or_init(|| Regex::new(PLACE_PATTERN).ok())
        .as_ref()
}

/// Capitalised words that are not places.
const NOT_PLACES: &[&str] = &[
    "i", "i'm", "i’m", "me", "my", "the", "a", "an",
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december",
    "spring", "summer", "autumn", "fall", "winter", "christmas", "easter",
];

/// Regex over the message text: "in Paris", "to New York", "visit Munich".
#[derive(Debug, Default)]
pub struct HeuristicLocationExtractor;

impl HeuristicLocationExtractor {
    pub fn find(message: &str) -> Option<String> {
        place_pattern()?
            .captures_iter(message)
            .filter_map(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .trim_end_matches(['.', '\'', '’'])
                    .trim_end_matches("'s")
                    .trim_end_matches("’s")
                    .to_string()
            })
            .find(|candidate| {
                let first = candidate
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();
                !candidate.is_empty() && !NOT_PLACES.contains(&first.as_str())
            })
            .map(|place| place.to_lowercase())
    }
}

#[async_trait]
impl LocationExtractor for HeuristicLocationExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract(&self, message: &str, _history: &[Turn]) -> Option<String> {
        Self::find(message)
    }
}

/// Most recent earlier user turn that names a place, for follow-ups such as
/// "and what should I pack?".
#[derive(Debug, Default)]
pub struct HistoryLocationExtractor;

#[async_trait]
impl LocationExtractor for HistoryLocationExtractor {
    fn name(&self) -> &str {
        "history"
    }

    async fn extract(&self, _message: &str, history: &[Turn]) -> Option<String> {
        history
            .iter()
            .rev()
            .filter(|t| t.role == TurnRole::User)
            .find_map(|t| HeuristicLocationExtractor::find(&t.content))
    }
}

const LLM_PROMPT: &str =
    "Identify the city the user is asking about in this prompt. Return only the city name, nothing else: ";

/// Answers that mean "no city".
const NON_ANSWERS: &[&str] = &[
    "sorry", "couldn't", "couldn’t", "please", "invalid", "no", "none", "unknown", "n/a",
    "unclear", "null",
];

const MAX_ANSWER_CHARS: usize = 60;

/// Clean a model's answer to the city question, or reject it.
pub fn accept_llm_answer(answer: &str) -> Option<String> {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim_end_matches('.')
        .trim()
        .to_lowercase();
    if cleaned.is_empty() || cleaned.contains('\n') || cleaned.chars().count() > MAX_ANSWER_CHARS {
        return None;
    }
    let first_word = cleaned
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .next()
        .unwrap_or_default();
    if NON_ANSWERS.contains(&cleaned.as_str()) || NON_ANSWERS.contains(&first_word) {
        return None;
    }
    Some(cleaned)
}

/// Single-shot question to the generation model. The exchange is not stored.
pub struct LlmLocationExtractor {
    generator: Generator,
}

impl LlmLocationExtractor {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl LocationExtractor for LlmLocationExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(&self, message: &str, _history: &[Turn]) -> Option<String> {
        let prompt = format!("{LLM_PROMPT}{message}");
        match self.generator.generate(&prompt).await {
            Ok(answer) => {
                let accepted = accept_llm_answer(&answer);
                if accepted.is_none() {
                    tracing::debug!(answer = %answer, "Model did not name a city");
                }
                accepted
            }
            Err(e) => {
                tracing::warn!("Location fallback query failed: {e}");
                None
            }
        }
    }
}

/// Tries each strategy in order.
pub struct ChainLocationExtractor {
    strategies: Vec<Arc<dyn LocationExtractor>>,
}

impl ChainLocationExtractor {
    pub fn new(strategies: Vec<Arc<dyn LocationExtractor>>) -> Self {
        Self { strategies }
    }

    /// Heuristic, then the model (when given), then conversation history.
    pub fn standard(generator: Option<Generator>) -> Self {
        let mut strategies: Vec<Arc<dyn LocationExtractor>> =
            vec![Arc::new(HeuristicLocationExtractor)];
        if let Some(generator) = generator {
            strategies.push(Arc::new(LlmLocationExtractor::new(generator)));
        }
        strategies.push(Arc::new(HistoryLocationExtractor));
        Self::new(strategies)
    }
}

#[async_trait]
impl LocationExtractor for ChainLocationExtractor {
    fn name(&self) -> &str {
        "chain"
    }

    async fn extract(&self, message: &str, history: &[Turn]) -> Option<String> {
        for strategy in &self.strategies {
            if let Some(place) = strategy.extract(message, history).await {
                tracing::debug!(strategy = strategy.name(), location = %place, "Extracted location");
                return Some(place);
            }
        }
        None
    }
}
