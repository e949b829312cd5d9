// src/judge/grounding.rs — Cheap textual checks against gathered context

use regex::Regex;

use crate::context::attractions::{self, NO_ATTRACTIONS};

/// Outcome of the textual checks for one candidate reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundingReport {
    /// The reply names the target location.
    pub mentions_location: bool,
    /// The reply names at least one listed place, or there was nothing to match.
    pub uses_listed_place: bool,
    /// The list was empty, so `uses_listed_place` holds trivially.
    pub vacuous: bool,
}

impl GroundingReport {
    pub fn passes(&self) -> bool {
        self.mentions_location && self.uses_listed_place && !self.vacuous
    }
}

/// True when `text` names `location` as a whole word, optionally possessive.
pub fn mentions_location(text: &str, location: &str) -> bool {
    let location = location.trim();
    if location.is_empty() {
        return false;
    }
    let pattern = format!(r"(?i)\b{}(?:['’]s)?\b", regex::escape(location));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            tracing::warn!(location, "Could not build location pattern: {e}");
            text.to_lowercase().contains(&location.to_lowercase())
        }
    }
}

/// Check `candidate` against an attractions list string.
pub fn check(candidate: &str, location: &str, attractions_list: &str) -> GroundingReport {
    let mentions = mentions_location(candidate, location);
    if attractions_list.trim() == NO_ATTRACTIONS {
        return GroundingReport {
            mentions_location: mentions,
            uses_listed_place: true,
            vacuous: true,
        };
    }

    let lower = candidate.to_lowercase();
    let uses_listed_place = attractions::parse_names(attractions_list)
        .iter()
        .any(|name| lower.contains(&name.to_lowercase()));
    GroundingReport {
        mentions_location: mentions,
        uses_listed_place,
        vacuous: false,
    }
}

/// Whether an attractions field carries something the checks can use.
pub fn is_checkable(attractions_list: &str) -> bool {
    let trimmed = attractions_list.trim();
    trimmed == NO_ATTRACTIONS || !attractions::parse_names(trimmed).is_empty()
}
