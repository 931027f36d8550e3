//! Data sources — one upstream API each.
//!
//! Every source implements [`Source`]: it takes a parsed [`Request`], makes a
//! single HTTP read and renders the result into an [`OutboundMessage`].
//!
//! # Sources
//!
//! - **APOD** — NASA Astronomy Picture of the Day
//! - **ISS** — current position of the International Space Station
//! - **Mars Weather** — latest REMS report from Curiosity
//!
//! The set is closed: [`SourceRegistry::new_with_defaults`] registers all of
//! them in the order they appear in the help text.

pub mod apod;
pub mod iss;
pub mod mars_weather;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::http::HttpClient;
use crate::message::OutboundMessage;
use crate::Result;

pub use apod::ApodSource;
pub use iss::IssSource;
pub use mars_weather::MarsWeatherSource;

/// Identifier of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Apod,
    Iss,
    MarsWeather,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceId::Apod => "apod",
            SourceId::Iss => "iss",
            SourceId::MarsWeather => "mars-weather",
        };
        f.write_str(name)
    }
}

/// A parsed request for one source invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// APOD for the given date, today when `None`
    Apod { date: Option<NaiveDate> },
    /// ISS position rendered on a map at the given zoom
    Iss { zoom: u8 },
    /// Whether the ISS footprint covers an observer
    IssOverhead { lat: f64, lon: f64 },
    MarsWeather,
}

impl Request {
    pub fn source_id(&self) -> SourceId {
        match self {
            Request::Apod { .. } => SourceId::Apod,
            Request::Iss { .. } | Request::IssOverhead { .. } => SourceId::Iss,
            Request::MarsWeather => SourceId::MarsWeather,
        }
    }
}

/// Source trait — shared capability of every data source.
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> SourceId;

    /// One help line; `{name}` is replaced with the bot name.
    fn help(&self) -> &str;

    /// Fetch and render. Must produce exactly one message or fail.
    async fn fetch(&self, request: &Request) -> Result<OutboundMessage>;
}

/// Validate a `YYYY-MM-DD` date string.
///
/// Exactly four year digits, two month digits and two day digits; chrono
/// alone would also take signs and padding.
pub fn validate_date(value: &str) -> Result<NaiveDate> {
    let invalid = || Error::InvalidDate(value.to_string());
    let well_formed = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

/// Ordered, closed list of data sources
pub struct SourceRegistry {
    sources: Vec<Box<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Create a registry with every built-in source
    pub fn new_with_defaults(config: &Config, http: Arc<dyn HttpClient>) -> Self {
        let mut registry = Self::new();
        registry.register(ApodSource::new(http.clone(), &config.nasa_api_key));
        registry.register(IssSource::new(http.clone()));
        registry.register(MarsWeatherSource::new(http));
        registry
    }

    /// Register a source; a later source with the same id replaces the earlier one.
    pub fn register<S: Source + 'static>(&mut self, source: S) {
        self.sources.retain(|s| s.id() != source.id());
        self.sources.push(Box::new(source));
    }

    pub fn get(&self, id: SourceId) -> Option<&dyn Source> {
        self.sources.iter().find(|s| s.id() == id).map(|s| s.as_ref())
    }

    /// Run `request` against the source that owns it.
    pub async fn fetch(&self, request: &Request) -> Result<OutboundMessage> {
        let id = request.source_id();
        let source = self
            .get(id)
            .ok_or_else(|| Error::Other(format!("No source registered for {}", id)))?;
        source.fetch(request).await
    }

    /// Help lines in registration order.
    pub fn help_lines(&self, bot_name: &str) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| s.help().replace("{name}", bot_name))
            .collect()
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id()).collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull a required value out of an upstream JSON object.
pub(crate) fn require<'a>(data: &'a serde_json::Value, key: &str) -> Result<&'a serde_json::Value> {
    match data.get(key) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(Error::MalformedPayload(format!("missing field '{}'", key))),
    }
}

/// Render a JSON scalar without quotes.
pub(crate) fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "--".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FakeHttpClient;

    #[test]
    fn test_validate_date_accepts_valid() {
        for date in ["2020-01-01", "1995-06-16", "2024-02-29", "1999-12-31"] {
            assert!(validate_date(date).is_ok(), "{} should be valid", date);
        }
    }

    #[test]
    fn test_validate_date_rejects_invalid() {
        for date in [
            "2020-13-40",
            "not-a-date",
            "",
            "2023-02-29",
            "2020/01/01",
            "+2020-01-01",
            "-0001-01-01",
            " 2020-01-01",
            "2020-01-01 ",
            "2020-1-1",
            "12020-01-01",
        ] {
            assert!(
                matches!(validate_date(date), Err(Error::InvalidDate(_))),
                "{} should be rejected",
                date
            );
        }
    }

    #[test]
    fn test_request_source_ids() {
        assert_eq!(Request::Apod { date: None }.source_id(), SourceId::Apod);
        assert_eq!(Request::IssOverhead { lat: 0.0, lon: 0.0 }.source_id(), SourceId::Iss);
        assert_eq!(Request::MarsWeather.source_id(), SourceId::MarsWeather);
    }

    #[test]
    fn test_registry_defaults_in_order() {
        let http: Arc<dyn HttpClient> = Arc::new(FakeHttpClient::default());
        let registry = SourceRegistry::new_with_defaults(&Config::default(), http);
        assert_eq!(
            registry.ids(),
            vec![SourceId::Apod, SourceId::Iss, SourceId::MarsWeather]
        );

        let help = registry.help_lines("spacebot");
        assert!(help[0].starts_with("*spacebot APOD"));
    }

    #[tokio::test]
    async fn test_registry_missing_source() {
        let registry = SourceRegistry::new();
        let result = registry.fetch(&Request::MarsWeather).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(display(&serde_json::json!("Sunny")), "Sunny");
        assert_eq!(display(&serde_json::json!(12.5)), "12.5");
        assert_eq!(display(&serde_json::Value::Null), "--");
    }
}
