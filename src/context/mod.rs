// src/context/mod.rs — External enrichment for a single request
//
// Every lookup degrades on its own: a failing source turns into its
// placeholder string and never fails the request.

pub mod attractions;
pub mod countries;
pub mod location;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::infra::config::{ContextConfig, TimeoutConfig};
use crate::infra::errors::{with_timeout, TripwiseError};
use crate::intent::Intent;
use crate::session::Turn;

use attractions::AttractionLookup;
use countries::CountryLookup;
use location::LocationExtractor;
use weather::WeatherLookup;

pub const COUNTRY_UNAVAILABLE: &str = "Country info unavailable.";
pub const WEATHER_UNAVAILABLE: &str = "Weather data unavailable.";
pub const ATTRACTIONS_UNAVAILABLE: &str = "Attractions unavailable.";
pub const NO_LOCATION: &str = "No location specified.";

/// Per-request enrichment. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExternalContext {
    pub country_info: Option<String>,
    pub weather_summary: Option<String>,
    pub attractions_list: Option<String>,
}

impl ExternalContext {
    /// Every field says that no location was given.
    pub fn no_location() -> Self {
        Self {
            country_info: Some(NO_LOCATION.into()),
            weather_summary: Some(NO_LOCATION.into()),
            attractions_list: Some(NO_LOCATION.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.country_info.is_none() && self.weather_summary.is_none() && self.attractions_list.is_none()
    }
}

pub(crate) fn http_error(capability: &str, e: reqwest::Error) -> TripwiseError {
    TripwiseError::unavailable(capability, e.to_string())
}

/// Which intents receive external enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentPolicy {
    intents: Vec<Intent>,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            intents: Intent::ALL.to_vec(),
        }
    }
}

impl EnrichmentPolicy {
    pub fn new(intents: impl IntoIterator<Item = Intent>) -> Self {
        Self {
            intents: intents.into_iter().collect(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Result<Self, TripwiseError> {
        let intents = config
            .enrich_intents
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<Intent>, _>>()?;
        Ok(Self::new(intents))
    }

    pub fn allows(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }
}

/// Extracts the location of a message and gathers [`ExternalContext`] for it.
pub struct ContextAggregator {
    locator: Arc<dyn LocationExtractor>,
    weather: Arc<dyn WeatherLookup>,
    countries: Arc<dyn CountryLookup>,
    attractions: Arc<dyn AttractionLookup>,
    policy: EnrichmentPolicy,
    attraction_limit: u32,
    lookup_timeout: Duration,
}

impl ContextAggregator {
    pub fn new(
        locator: Arc<dyn LocationExtractor>,
        weather: Arc<dyn WeatherLookup>,
        countries: Arc<dyn CountryLookup>,
        attractions: Arc<dyn AttractionLookup>,
    ) -> Self {
        Self {
            locator,
            weather,
            countries,
            attractions,
            policy: EnrichmentPolicy::default(),
            attraction_limit: 3,
            lookup_timeout: TimeoutConfig::default().lookup(),
        }
    }

    pub fn with_policy(mut self, policy: EnrichmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attraction_limit(mut self, limit: u32) -> Self {
        self.attraction_limit = limit;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Location `message` is about, falling back to earlier turns.
    pub async fn locate(&self, message: &str, history: &[Turn]) -> Option<String> {
        self.locator.extract(message, history).await
    }

    /// Gather enrichment for `intent` at `location`.
    ///
    /// Intents outside the policy get an empty context. With no location,
    /// every field says so instead of performing lookups.
    pub async fn gather(&self, intent: Intent, location: Option<&str>) -> ExternalContext {
        if !self.policy.allows(intent) {
            return ExternalContext::default();
        }
        let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
            return ExternalContext::no_location();
        };

        match intent {
            Intent::Attractions => {
                let weather = self.weather_summary(location).await;
                let attractions = self.attraction_list(location).await;
                ExternalContext {
                    country_info: None,
                    weather_summary: Some(weather),
                    attractions_list: Some(attractions),
                }
            }
            Intent::TripPlanning | Intent::PackingSuggestions | Intent::Other => {
                let report = self.lookup_weather(location).await;
                // The weather service knows which country a city is in; without
                // it, try the location itself as a country name.
                let country_ref = report
                    .as_ref()
                    .and_then(|r| r.country.clone())
                    .unwrap_or_else(|| location.to_string());
                let country = self.country_info(&country_ref).await;
                ExternalContext {
                    country_info: Some(country),
                    weather_summary: Some(
                        report
                            .map(|r| r.summary())
                            .unwrap_or_else(|| WEATHER_UNAVAILABLE.into()),
                    ),
                    attractions_list: None,
                }
            }
        }
    }

    async fn lookup_weather(&self, location: &str) -> Option<weather::WeatherReport> {
        match with_timeout("weather lookup", self.lookup_timeout, self.weather.current(location))
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(location, "Weather unavailable: {e}");
                None
            }
        }
    }

    async fn weather_summary(&self, location: &str) -> String {
        self.lookup_weather(location)
            .await
            .map(|r| r.summary())
            .unwrap_or_else(|| WEATHER_UNAVAILABLE.into())
    }

    async fn country_info(&self, country: &str) -> String {
        match with_timeout("country lookup", self.lookup_timeout, self.countries.summary(country))
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(country, "Country info unavailable: {e}");
                COUNTRY_UNAVAILABLE.into()
            }
        }
    }

    async fn attraction_list(&self, location: &str) -> String {
        let lookup = self.attractions.near(location, self.attraction_limit);
        match with_timeout("attractions lookup", self.lookup_timeout, lookup).await {
            Ok(found) => attractions::format_list(&found),
            Err(e) => {
                tracing::warn!(location, "Attractions unavailable: {e}");
                ATTRACTIONS_UNAVAILABLE.into()
            }
        }
    }
}
