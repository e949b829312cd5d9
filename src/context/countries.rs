// src/context/countries.rs — Country facts lookup (REST Countries v3.1)

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::http_error;
use crate::infra::errors::TripwiseError;

pub const DEFAULT_BASE_URL: &str = "https://restcountries.com/v3.1";
const FIELDS: &str = "name,capital,currencies,languages,population";

#[async_trait]
pub trait CountryLookup: Send + Sync {
    /// One-line fact summary for a country name or alpha-2 code.
    async fn summary(&self, country: &str) -> Result<String, TripwiseError>;
}

/// How a caller-supplied country reference is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryQuery {
    /// Two-letter ISO code, upper-cased.
    Alpha(String),
    /// Normalised lower-case name.
    Name(String),
}

impl CountryQuery {
    pub fn parse(input: &str) -> Result<Self, TripwiseError> {
        let trimmed = input.trim();
        if trimmed.chars().count() < 2 {
            return Err(TripwiseError::InvalidInput(format!(
                "country reference too short: '{trimmed}'"
            )));
        }
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Ok(CountryQuery::Alpha(trimmed.to_ascii_uppercase()));
        }
        let normalised: String = trimmed
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphabetic() || c.is_whitespace())
            .collect();
        let normalised = normalised.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalised.is_empty() {
            return Err(TripwiseError::InvalidInput(format!(
                "no letters in country reference '{trimmed}'"
            )));
        }
        Ok(CountryQuery::Name(normalised))
    }
}

/// "united states" -> "United States"
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 83240525 -> "83,240,525"
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    name: CountryName,
    #[serde(default)]
    capital: Vec<String>,
    #[serde(default)]
    currencies: BTreeMap<String, Currency>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
    #[serde(default)]
    population: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CountryName {
    common: String,
}

#[derive(Debug, Deserialize)]
struct Currency {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<CountryRecord>),
    One(Box<CountryRecord>),
}

impl CountryRecord {
    fn summary(&self) -> String {
        let capital = self.capital.first().map(String::as_str).unwrap_or("N/A");
        let currency = self
            .currencies
            .values()
            .next()
            .and_then(|c| c.name.as_deref())
            .unwrap_or("N/A");
        let languages = if self.languages.is_empty() {
            "N/A".to_string()
        } else {
            self.languages.values().cloned().collect::<Vec<_>>().join(", ")
        };
        let population = self
            .population
            .map(group_thousands)
            .unwrap_or_else(|| "N/A".into());
        format!(
            "Country: {}, Capital: {capital}, Currency: {currency}, Languages: {languages}, Population: {population}",
            self.name.common
        )
    }
}

fn parse_summary(body: &str) -> Result<String, TripwiseError> {
    let parsed: OneOrMany = serde_json::from_str(body)
        .map_err(|e| TripwiseError::unavailable("country", format!("unexpected response: {e}")))?;
    let record = match parsed {
        OneOrMany::Many(records) => records.into_iter().next(),
        OneOrMany::One(record) => Some(*record),
    };
    record
        .map(|r| r.summary())
        .ok_or_else(|| TripwiseError::unavailable("country", "no country data returned"))
}

pub struct RestCountriesClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for RestCountriesClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RestCountriesClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(
        &self,
        path: &str,
        partial: bool,
    ) -> Result<(StatusCode, String), TripwiseError> {
        let mut request = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(&[("fields", FIELDS)]);
        if partial {
            request = request.query(&[("partial", "true")]);
        }
        let response = request.send().await.map_err(|e| http_error("country", e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| http_error("country", e))?;
        Ok((status, body))
    }
}

#[async_trait]
impl CountryLookup for RestCountriesClient {
    async fn summary(&self, country: &str) -> Result<String, TripwiseError> {
        let query = CountryQuery::parse(country)?;
        let path = match &query {
            CountryQuery::Alpha(code) => format!("alpha/{code}"),
            CountryQuery::Name(name) => format!("name/{}", title_case(name)),
        };

        let (status, body) = self.fetch(&path, false).await?;
        if status.is_success() {
            return parse_summary(&body);
        }

        if let (StatusCode::NOT_FOUND, CountryQuery::Name(name)) = (status, &query) {
            tracing::debug!(country = %name, "Exact country name not found, trying partial match");
            let (status, body) = self.fetch(&format!("name/{name}"), true).await?;
            if status.is_success() {
                return parse_summary(&body);
            }
        }

        Err(TripwiseError::unavailable(
            "country",
            format!("Country info unavailable for \"{}\" (HTTP {status})", country.trim()),
        ))
    }
}
