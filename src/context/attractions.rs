// src/context/attractions.rs — Points of interest lookup (Geoapify)

use async_trait::async_trait;
use serde::Deserialize;

use super::http_error;
use crate::infra::errors::TripwiseError;

pub const DEFAULT_BASE_URL: &str = "https://api.geoapify.com";
pub const API_KEY_ENV: &str = "GEOAPIFY_API_KEY";
const CATEGORIES: &str = "tourism,entertainment.culture,leisure";

pub const NO_ATTRACTIONS: &str = "No attractions found.";
const LIST_PREFIX: &str = "Attractions: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attraction {
    pub name: String,
    pub category: String,
}

#[async_trait]
pub trait AttractionLookup: Send + Sync {
    /// Up to `limit` notable places in `location`. Empty when none are known.
    async fn near(&self, location: &str, limit: u32) -> Result<Vec<Attraction>, TripwiseError>;
}

/// `Attractions: Name (category), ...`, or [`NO_ATTRACTIONS`] for an empty list.
pub fn format_list(attractions: &[Attraction]) -> String {
    if attractions.is_empty() {
        return NO_ATTRACTIONS.to_string();
    }
    let items: Vec<String> = attractions
        .iter()
        .map(|a| format!("{} ({})", a.name, a.category))
        .collect();
    format!("{LIST_PREFIX}{}", items.join(", "))
}

/// Place names from a [`format_list`] string, category annotations stripped.
/// Returns an empty list for anything that is not an attractions list.
pub fn parse_names(list: &str) -> Vec<String> {
    let Some(body) = list.trim().strip_prefix(LIST_PREFIX) else {
        return Vec::new();
    };
    body.split(", ")
        .map(|item| match item.rfind(" (") {
            Some(idx) => &item[..idx],
            None => item,
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
}

#[derive(Default, Deserialize)]
struct Properties {
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

fn parse_place_id(body: &str) -> Result<Option<String>, TripwiseError> {
    let parsed: FeatureCollection = serde_json::from_str(body)
        .map_err(|e| TripwiseError::unavailable("attractions", format!("bad geocode response: {e}")))?;
    Ok(parsed
        .features
        .into_iter()
        .next()
        .and_then(|f| f.properties.place_id))
}

fn parse_places(body: &str) -> Result<Vec<Attraction>, TripwiseError> {
    let parsed: FeatureCollection = serde_json::from_str(body)
        .map_err(|e| TripwiseError::unavailable("attractions", format!("bad places response: {e}")))?;
    Ok(parsed
        .features
        .into_iter()
        .map(|f| Attraction {
            name: f
                .properties
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unnamed attraction".into()),
            category: f
                .properties
                .categories
                .into_iter()
                .next()
                .unwrap_or_else(|| "place".into()),
        })
        .collect())
}

pub struct GeoapifyClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GeoapifyClient {
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

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String, TripwiseError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(|e| http_error("attractions", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| http_error("attractions", e))?;
        if !status.is_success() {
            return Err(TripwiseError::unavailable(
                "attractions",
                format!("HTTP {status} from {path}"),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl AttractionLookup for GeoapifyClient {
    async fn near(&self, location: &str, limit: u32) -> Result<Vec<Attraction>, TripwiseError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            TripwiseError::unavailable("attractions", format!("{API_KEY_ENV} is not set"))
        })?;

        let geocode = self
            .get(
                "/v1/geocode/search",
                &[("text", location), ("apiKey", api_key)],
            )
            .await?;
        let Some(place_id) = parse_place_id(&geocode)? else {
            tracing::debug!(location, "Geocoder returned no place");
            return Ok(Vec::new());
        };

        let filter = format!("place:{place_id}");
        let limit = limit.to_string();
        let places = self
            .get(
                "/v2/places",
                &[
                    ("categories", CATEGORIES),
                    ("filter", filter.as_str()),
                    ("limit", limit.as_str()),
                    ("apiKey", api_key),
                ],
            )
            .await?;
        parse_places(&places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(name: &str, category: &str) -> Attraction {
        Attraction {
            name: name.into(),
            category: category.into(),
        }
    }

    #[test]
    fn test_format_list() {
        let list = format_list(&[
            a("Marienplatz", "tourism.sights"),
            a("Englischer Garten", "leisure.park"),
        ]);
        assert_eq!(
            list,
            "Attractions: Marienplatz (tourism.sights), Englischer Garten (leisure.park)"
        );
        assert_eq!(format_list(&[]), NO_ATTRACTIONS);
    }

    #[test]
    fn test_parse_names() {
        let names = parse_names(
            "Attractions: Marienplatz (tourism.sights), Museum (Old) Wing (entertainment.culture)",
        );
        assert_eq!(names, vec!["Marienplatz", "Museum (Old) Wing"]);
        assert!(parse_names(NO_ATTRACTIONS).is_empty());
        assert!(parse_names("Attractions unavailable.").is_empty());
    }

    #[test]
    fn test_parse_place_id() {
        let body = r#"{"type": "FeatureCollection", "features": [
            {"properties": {"place_id": "51abc", "city": "Munich"}}
        ]}"#;
        assert_eq!(parse_place_id(body).unwrap().as_deref(), Some("51abc"));
        assert_eq!(parse_place_id(r#"{"features": []}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_places_fills_gaps() {
        let body = r#"{"features": [
            {"properties": {"name": "Marienplatz", "categories": ["tourism.sights", "tourism"]}},
            {"properties": {"categories": []}},
            {"properties": {"name": "Olympiapark"}}
        ]}"#;
        assert_eq!(
            parse_places(body).unwrap(),
            vec![
                a("Marienplatz", "tourism.sights"),
                a("Unnamed attraction", "place"),
                a("Olympiapark", "place"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let client = GeoapifyClient::new(Some("  ".into())).with_base_url("http://127.0.0.1:9");
        assert!(matches!(
            client.near("munich", 3).await,
            Err(TripwiseError::CapabilityUnavailable { .. })
        ));
    }
}
