// src/context/weather.rs — Current weather lookup (OpenWeatherMap)

use async_trait::async_trait;
use serde::Deserialize;

use super::http_error;
use crate::infra::errors::TripwiseError;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5";
pub const API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Names the weather service resolves to the wrong place without a country hint.
const QUERY_OVERRIDES: &[(&str, &str)] = &[("mexico", "mexico, MX")];

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub description: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// ISO 3166 alpha-2 code of the matched place, when reported.
    pub country: Option<String>,
}

impl WeatherReport {
    pub fn summary(&self) -> String {
        format!(
            "Current weather: {} with a temperature of {}°C",
            self.description, self.temperature
        )
    }
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current(&self, location: &str) -> Result<WeatherReport, TripwiseError>;
}

/// Rewrite a location into the query string sent to the service.
pub fn query_for(location: &str) -> String {
    let lower = location.trim().to_lowercase();
    QUERY_OVERRIDES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, q)| q.to_string())
        .unwrap_or(lower)
}

#[derive(Deserialize)]
struct WeatherResponse {
    weather: Vec<Condition>,
    main: Readings,
    #[serde(default)]
    sys: Option<Sys>,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct Readings {
    temp: f64,
}

#[derive(Deserialize)]
struct Sys {
    #[serde(default)]
    country: Option<String>,
}

fn parse_report(body: &str) -> Result<WeatherReport, TripwiseError> {
    let parsed: WeatherResponse = serde_json::from_str(body)
        .map_err(|e| TripwiseError::unavailable("weather", format!("unexpected response: {e}")))?;
    let description = parsed
        .weather
        .into_iter()
        .next()
        .map(|c| c.description)
        .ok_or_else(|| TripwiseError::unavailable("weather", "no conditions reported"))?;
    Ok(WeatherReport {
        description,
        temperature: parsed.main.temp,
        country: parsed.sys.and_then(|s| s.country).filter(|c| !c.is_empty()),
    })
}

pub struct OpenWeatherClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_ENV).ok())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn current(&self, location: &str) -> Result<WeatherReport, TripwiseError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TripwiseError::unavailable("weather", format!("{API_KEY_ENV} is not set")))?;

        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", query_for(location).as_str()),
                ("appid", api_key),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| http_error("weather", e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| http_error("weather", e))?;
        if !status.is_success() {
            return Err(TripwiseError::unavailable(
                "weather",
                format!("HTTP {status} for '{location}'"),
            ));
        }
        parse_report(&body)
    }
}
