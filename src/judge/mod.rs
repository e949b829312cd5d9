// src/judge/mod.rs — Factuality judge for attraction replies
//
// Textual grounding checks run first. Only when they do not pass is the
// generation model asked for a "Valid"/"Invalid" verdict; nothing short of an
// explicit "invalid" rejects the reply.

pub mod grounding;

use crate::context::ExternalContext;
use crate::intent::Intent;
use crate::provider::Generator;

pub use grounding::GroundingReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No judgement applies (intent, missing location or missing list).
    NotJudged,
    /// Textual checks passed.
    Grounded,
    /// The judge model did not say "invalid".
    Approved { reply: String },
    /// The judge model could not be reached; the reply stands.
    JudgeUnavailable,
    /// The judge model said "invalid".
    Rejected { reply: String },
}

impl Verdict {
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Verdict::Rejected { .. })
    }
}

/// Builds the question put to the judge model.
pub fn judge_prompt(location: &str, candidate: &str, attractions_list: &str) -> String {
    format!(
        "I’m planning a trip to {location} and received this list of attractions:\n\
         {candidate}\n\
         A places database suggests: {attractions_list}\n\
         Are these attractions valid and well-known for {location}, or do any seem \
         fictional or unrelated (e.g., \"Great Wall\" in Munich)? \
         Answer only \"Valid\" or \"Invalid\"."
    )
}

/// Any answer mentioning "invalid" rejects; everything else accepts.
pub fn is_rejection(answer: &str) -> bool {
    answer.to_lowercase().contains("invalid")
}

pub struct ResponseJudge {
    generator: Generator,
}

impl ResponseJudge {
    /// `generator` should carry the judge deadline.
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    /// Judge `candidate`. The exchange with the judge model is never stored.
    pub async fn evaluate(
        &self,
        intent: Intent,
        candidate: &str,
        context: &ExternalContext,
        location: Option<&str>,
    ) -> Verdict {
        if intent != Intent::Attractions {
            return Verdict::NotJudged;
        }
        let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
            return Verdict::NotJudged;
        };
        let Some(list) = context
            .attractions_list
            .as_deref()
            .filter(|l| grounding::is_checkable(l))
        else {
            return Verdict::NotJudged;
        };

        let report = grounding::check(candidate, location, list);
        tracing::debug!(
            location,
            mentions_location = report.mentions_location,
            uses_listed_place = report.uses_listed_place,
            vacuous = report.vacuous,
            "Grounding check"
        );
        if report.passes() {
            return Verdict::Grounded;
        }

        let prompt = judge_prompt(location, candidate, list);
        match self.generator.generate(&prompt).await {
            Ok(reply) if is_rejection(&reply) => {
                tracing::warn!(location, "Judge rejected reply as ungrounded");
                Verdict::Rejected { reply }
            }
            Ok(reply) => Verdict::Approved { reply },
            Err(e) => {
                tracing::warn!(location, "Judge unavailable, keeping reply: {e}");
                Verdict::JudgeUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::attractions::NO_ATTRACTIONS;
    use crate::infra::errors::TripwiseError;
    use crate::provider::{ChatRequest, ChatResponse, ModelProvider, TokenUsage, StopReason};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Scripted {
        answer: Option<&'static str>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelProvider for Scripted {
        fn id(&self) -> &str {
            "scripted"
        }
        fn name(&self) -> &str {
            "Scripted"
        }
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, TripwiseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(a) => Ok(ChatResponse {
                    content: a.into(),
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
            Err(TripwiseError::unavailable("embed", "n/a"))
        }
    }

    fn judge(answer: Option<&'static str>) -> (ResponseJudge, Arc<Scripted>) {
        let provider = Arc::new(Scripted {
            answer,
            calls: AtomicU32::new(0),
        });
        (
            ResponseJudge::new(Generator::new(provider.clone(), "test")),
            provider,
        )
    }

    fn munich_context() -> ExternalContext {
        ExternalContext {
            country_info: None,
            weather_summary: Some("Current weather: clear sky with a temperature of 20°C".into()),
            attractions_list: Some(
                "Attractions: Marienplatz (tourism.sights), Nymphenburg Palace (tourism.attraction)"
                    .into(),
            ),
        }
    }

    #[tokio::test]
    async fn test_other_intents_are_not_judged() {
        let (j, provider) = judge(Some("Invalid"));
        for intent in [Intent::TripPlanning, Intent::PackingSuggestions, Intent::Other] {
            let v = j
                .evaluate(intent, "Anything", &munich_context(), Some("munich"))
                .await;
            assert_eq!(v, Verdict::NotJudged);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_grounded_reply_skips_model() {
        let (j, provider) = judge(Some("Invalid"));
        let v = j
            .evaluate(
                Intent::Attractions,
                "In Munich: Marienplatz (city square), Nymphenburg Palace (historic estate).",
                &munich_context(),
                Some("munich"),
            )
            .await;
        assert_eq!(v, Verdict::Grounded);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ungrounded_reply_rejected_by_model() {
        let (j, provider) = judge(Some("Invalid"));
        let v = j
            .evaluate(
                Intent::Attractions,
                "**Munich** attractions: 1. **Munich Great Wall** (historic site).",
                &munich_context(),
                Some("munich"),
            )
            .await;
        assert!(matches!(v, Verdict::Rejected { .. }));
        assert!(!v.is_acceptable());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_answer_accepts() {
        let (j, _) = judge(Some("Hmm, mostly fine I think."));
        let v = j
            .evaluate(
                Intent::Attractions,
                "Munich has the Hofbräuhaus.",
                &munich_context(),
                Some("munich"),
            )
            .await;
        assert!(matches!(v, Verdict::Approved { .. }));
    }

    #[tokio::test]
    async fn test_judge_failure_keeps_reply() {
        let (j, _) = judge(None);
        let v = j
            .evaluate(
                Intent::Attractions,
                "Munich has the Hofbräuhaus.",
                &munich_context(),
                Some("munich"),
            )
            .await;
        assert_eq!(v, Verdict::JudgeUnavailable);
        assert!(v.is_acceptable());
    }

    #[tokio::test]
    async fn test_empty_list_still_asks_model() {
        let (j, provider) = judge(Some("Valid"));
        let ctx = ExternalContext {
            attractions_list: Some(NO_ATTRACTIONS.into()),
            ..Default::default()
        };
        let v = j
            .evaluate(Intent::Attractions, "Atlantis has a palace.", &ctx, Some("atlantis"))
            .await;
        assert!(matches!(v, Verdict::Approved { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_location_or_list_not_judged() {
        let (j, _) = judge(Some("Invalid"));
        let v = j
            .evaluate(Intent::Attractions, "x", &munich_context(), None)
            .await;
        assert_eq!(v, Verdict::NotJudged);

        let unavailable = ExternalContext {
            attractions_list: Some("Attractions unavailable.".into()),
            ..Default::default()
        };
        let v = j
            .evaluate(Intent::Attractions, "x", &unavailable, Some("munich"))
            .await;
        assert_eq!(v, Verdict::NotJudged);
    }

    #[test]
    fn test_is_rejection() {
        assert!(is_rejection("Invalid"));
        assert!(is_rejection("INVALID."));
        assert!(is_rejection("This list is invalid because..."));
        assert!(!is_rejection("Valid"));
        assert!(!is_rejection(""));
    }

    #[test]
    fn test_judge_prompt_mentions_everything() {
        let p = judge_prompt("munich", "Great Wall", "Attractions: Marienplatz (tourism)");
        assert!(p.contains("trip to munich"));
        assert!(p.contains("Great Wall"));
        assert!(p.contains("Marienplatz"));
        assert!(p.ends_with("Answer only \"Valid\" or \"Invalid\"."));
    }
}
