use std::fmt;

use crate::upstream::{NewsQuery, SourcesQuery, WeatherQuery};

/// Deterministic cache key derived from a logical query.
///
/// City names and free-text queries are trimmed and lower-cased so that
/// `Delhi`, `DELHI` and ` delhi ` share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn current_weather(query: &WeatherQuery) -> Self {
        Self::for_location("weather", query)
    }

    pub fn forecast(query: &WeatherQuery) -> Self {
        Self::for_location("forecast", query)
    }

    pub fn news(query: &NewsQuery) -> Self {
        Self(format!(
            "news:{}:{}:{}:{}:{}",
            normalize(&query.query),
            query.category,
            query.language,
            query.page,
            query.limit
        ))
    }

    pub fn news_sources(query: &SourcesQuery) -> Self {
        Self(format!(
            "sources:{}:{}:{}",
            query.category.as_deref().unwrap_or("all"),
            query.language,
            query
                .country
                .as_deref()
                .map(normalize)
                .unwrap_or_else(|| "all".to_string())
        ))
    }

    fn for_location(kind: &str, query: &WeatherQuery) -> Self {
        match query {
            WeatherQuery::City(city) => Self(format!("{}:city:{}", kind, normalize(city))),
            WeatherQuery::Coords { lat, lon } => Self(format!("{}:coords:{},{}", kind, lat, lon)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
