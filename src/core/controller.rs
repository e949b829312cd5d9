// src/core/controller.rs — Respond, judge and self-correct one chat message

use std::sync::Arc;

use super::prompt::{self, build_prompt};
use super::types::*;
use crate::context::{ContextAggregator, ExternalContext};
use crate::intent::{Intent, IntentGate};
use crate::judge::{ResponseJudge, Verdict};
use crate::provider::Generator;
use crate::session::{SessionKey, SessionStore, Turn, TurnMatcher, TurnTtl};

/// Drives a message through history, intent, context, generation and
/// judgement, with at most `max_retries` self-corrections.
///
/// Requests for the same session are not serialised: two concurrent runs may
/// interleave their appends, and a purge-then-append retry is not atomic with
/// respect to another request on the same key.
pub struct CorrectionController {
    store: Arc<dyn SessionStore>,
    intents: Arc<IntentGate>,
    context: Arc<ContextAggregator>,
    judge: ResponseJudge,
    generator: Generator,
    settings: ControllerSettings,
}

/// What one request knows once context has been gathered.
struct Prepared {
    key: SessionKey,
    history: Vec<Turn>,
    intent: Intent,
    location: Option<String>,
    context: ExternalContext,
}

impl CorrectionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        intents: Arc<IntentGate>,
        context: Arc<ContextAggregator>,
        judge: ResponseJudge,
        generator: Generator,
    ) -> Self {
        Self {
            store,
            intents,
            context,
            judge,
            generator,
            settings: ControllerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Handle one chat message for `user` in `session`.
    ///
    /// Only invalid identifiers and store failures are errors. Classification,
    /// lookup, judge and generation failures all end in an [`Exchange`].
    pub async fn handle(
        &self,
        user: &str,
        session: Option<&str>,
        message: &str,
    ) -> Result<Exchange, ControllerError> {
        let key = SessionKey::with_default(user, session, &self.settings.default_session)?;
        let mut attempt = Attempt::new(self.settings.max_retries);
        trace_phase(&key, Phase::Start, attempt);

        let prep = self.prepare(key, message).await?;

        // --- Draft ---
        let draft_prompt = build_prompt(&prep.history, &prep.context, message, None);
        let draft = match self.generator.generate(&draft_prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(key = %prep.key, "Generation failed: {e}");
                return Ok(self.finish(&prep, Outcome::failed(), attempt));
            }
        };
        trace_phase(&prep.key, Phase::Responded, attempt);

        if prompt::is_validation_query(message) && prompt::is_validation_answer(&draft) {
            self.store
                .append(&prep.key, Turn::assistant(draft.clone()), TurnTtl::Ephemeral)
                .await?;
            return Ok(self.finish(&prep, Outcome::Validation { reply: draft }, attempt));
        }

        if !self.passes_gates(&draft) {
            tracing::warn!(key = %prep.key, chars = draft.chars().count(), "Draft failed quality gates");
            return Ok(self.finish(&prep, Outcome::clarified(), attempt));
        }

        let mut committed = Turn::assistant(draft);
        self.store
            .append(&prep.key, committed.clone(), TurnTtl::Standard)
            .await?;

        // --- Judge and correct ---
        let mut verdict = self.judge_turn(&prep, &committed).await;
        let mut rejected: Option<String> = None;

        while !verdict.is_acceptable() && attempt.can_retry() {
            trace_phase(&prep.key, Phase::JudgedInvalid, attempt);
            attempt = attempt.next();
            tracing::warn!(
                key = %prep.key,
                location = prep.location.as_deref().unwrap_or(""),
                attempt = %attempt,
                "Regenerating rejected reply",
            );

            // History was read before the draft was stored, so the rejected
            // reply never reaches the retry prompt.
            let correction = prompt::correction_for(prep.location.as_deref());
            let retry_prompt = build_prompt(&prep.history, &prep.context, message, Some(&correction));
            let retry = self.generator.generate(&retry_prompt).await;

            self.store
                .purge(&prep.key, TurnMatcher::Id(committed.id.clone()))
                .await?;
            rejected = Some(committed.content);

            let retry = match retry {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(key = %prep.key, attempt = %attempt, "Retry generation failed: {e}");
                    return Ok(self.finish(&prep, Outcome::failed(), attempt));
                }
            };
            if !self.passes_gates(&retry) {
                tracing::warn!(key = %prep.key, attempt = %attempt, "Retry failed quality gates");
                return Ok(self.finish(&prep, Outcome::clarified(), attempt));
            }

            committed = Turn::assistant(retry);
            self.store
                .append(&prep.key, committed.clone(), TurnTtl::Standard)
                .await?;

            // The last permitted retry is final and is not judged again.
            verdict = if attempt.can_retry() {
                self.judge_turn(&prep, &committed).await
            } else {
                Verdict::NotJudged
            };
        }

        trace_phase(&prep.key, Phase::Accepted, attempt);
        let outcome = match rejected {
            Some(rejected) => Outcome::Corrected {
                reply: committed.content,
                rejected,
            },
            None => Outcome::Accepted {
                reply: committed.content,
                verdict,
            },
        };
        Ok(self.finish(&prep, outcome, attempt))
    }

    /// Store the user turn, then load history, classify and gather context.
    async fn prepare(&self, key: SessionKey, message: &str) -> Result<Prepared, ControllerError> {
        self.store
            .append(&key, Turn::user(message), TurnTtl::Standard)
            .await?;
        let history = self.store.read_all(&key).await?;
        trace_phase(&key, Phase::HistoryLoaded, Attempt::new(self.settings.max_retries));

        let intent = match self.intents.classify(message).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(key = %key, "Intent classification unavailable, using other: {e}");
                Intent::Other
            }
        };
        tracing::debug!(key = %key, phase = %Phase::IntentClassified, intent = %intent, "Controller transition");

        let location = self.context.locate(message, &history).await;
        let context = self.context.gather(intent, location.as_deref()).await;
        tracing::debug!(
            key = %key,
            phase = %Phase::ContextGathered,
            location = location.as_deref().unwrap_or(""),
            has_attractions = context.attractions_list.is_some(),
            "Controller transition",
        );

        Ok(Prepared {
            key,
            history,
            intent,
            location,
            context,
        })
    }

    async fn judge_turn(&self, prep: &Prepared, turn: &Turn) -> Verdict {
        self.judge
            .evaluate(prep.intent, &turn.content, &prep.context, prep.location.as_deref())
            .await
    }

    fn passes_gates(&self, reply: &str) -> bool {
        reply.chars().count() >= self.settings.min_reply_chars
            && !reply.contains(NOT_APPLICABLE_MARKER)
    }

    fn finish(&self, prep: &Prepared, outcome: Outcome, attempt: Attempt) -> Exchange {
        tracing::info!(
            key = %prep.key,
            intent = %prep.intent,
            outcome = outcome.kind(),
            attempt = %attempt,
            "Chat request complete",
        );
        trace_phase(&prep.key, Phase::Done, attempt);
        Exchange {
            outcome,
            intent: prep.intent,
            location: prep.location.clone(),
            attempt,
        }
    }
}

fn trace_phase(key: &SessionKey, phase: Phase, attempt: Attempt) {
    tracing::debug!(key = %key, phase = %phase, attempt = %attempt, "Controller transition");
}
