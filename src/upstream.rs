//! Third-party data providers: OpenWeatherMap for weather, NewsAPI for news.
//!
//! Handlers depend on the [`WeatherProvider`] and [`NewsProvider`] traits;
//! payloads are passed through as JSON apart from the few fields the
//! dashboard reshapes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

pub mod news;
pub mod weather;

pub use self::news::NewsApiClient;
pub use self::weather::OpenWeatherClient;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream request failed: {0}")]
    Request(reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Request(err)
        }
    }
}

/// Where to look up weather: a city name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl WeatherQuery {
    pub fn coords(&self) -> Option<(f64, f64)> {
        match self {
            WeatherQuery::Coords { lat, lon } => Some((*lat, *lon)),
            WeatherQuery::City(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            WeatherQuery::City(city) => city.clone(),
            WeatherQuery::Coords { lat, lon } => format!("{},{}", lat, lon),
        }
    }
}

pub const DEFAULT_NEWS_QUERY: &str = "latest news";

pub const NEWS_CATEGORIES: [&str; 7] = [
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

pub const NEWS_LANGUAGES: [&str; 8] = ["en", "es", "fr", "de", "it", "pt", "ru", "zh"];

#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub query: String,
    pub limit: u32,
    pub page: u32,
    pub category: String,
    pub language: String,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            query: DEFAULT_NEWS_QUERY.to_string(),
            limit: 20,
            page: 1,
            category: "general".to_string(),
            language: "en".to_string(),
        }
    }
}

impl NewsQuery {
    /// Free-text searches go to `/everything`; the default query lists top headlines.
    pub fn is_search(&self) -> bool {
        let query = self.query.trim();
        !query.is_empty() && query != DEFAULT_NEWS_QUERY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcesQuery {
    pub category: Option<String>,
    pub language: String,
    pub country: Option<String>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions merged with geocoding and air quality.
    async fn current(&self, query: &WeatherQuery) -> Result<Value, UpstreamError>;

    /// Eight 3-hour slots plus one entry per upcoming day.
    async fn forecast(&self, query: &WeatherQuery) -> Result<Value, UpstreamError>;
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn articles(&self, query: &NewsQuery) -> Result<Value, UpstreamError>;
    async fn sources(&self, query: &SourcesQuery) -> Result<Value, UpstreamError>;
}

pub(crate) const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client() -> Result<Client, UpstreamError> {
    Ok(Client::builder()
        .timeout(DEFAULT_CLIENT_TIMEOUT)
        .user_agent(concat!("climecast/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET `url` and decode a JSON body, turning non-2xx replies into
/// [`UpstreamError::Status`] carrying the provider's message when it sent one.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    timeout: Option<Duration>,
) -> Result<Value, UpstreamError> {
    let mut request = client.get(url).query(params);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Upstream responded with status {}", status.as_u16()));
        tracing::warn!(url, status = status.as_u16(), %message, "upstream request failed");
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
