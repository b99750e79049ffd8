use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::upstream::{
    build_client, get_json, join_url, NewsProvider, NewsQuery, SourcesQuery, UpstreamError,
};

const ARTICLES_TIMEOUT: Duration = Duration::from_secs(10);
const SOURCES_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PAGE_SIZE: u32 = 100;
/// NewsAPI never pages past this many results on the free tier.
const MAX_TOTAL_RESULTS: u64 = 1000;
const REMOVED_TITLE: &str = "[Removed]";

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    articles_timeout: Duration,
    sources_timeout: Duration,
}

impl NewsApiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: base_url.into(),
            articles_timeout: ARTICLES_TIMEOUT,
            sources_timeout: SOURCES_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.articles_timeout = timeout;
        self.sources_timeout = timeout;
        self
    }
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    async fn articles(&self, query: &NewsQuery) -> Result<Value, UpstreamError> {
        let mut params = vec![
            ("apiKey", self.api_key.clone()),
            ("language", query.language.clone()),
            ("pageSize", query.limit.min(MAX_PAGE_SIZE).to_string()),
            ("page", query.page.to_string()),
        ];

        let endpoint = if query.is_search() {
            params.push(("q", query.query.trim().to_string()));
            params.push(("sortBy", "publishedAt".to_string()));
            "everything"
        } else {
            params.push(("category", query.category.clone()));
            let country = if query.language == "en" { "us" } else { "gb" };
            params.push(("country", country.to_string()));
            "top-headlines"
        };

        let raw = get_json(
            &self.client,
            &join_url(&self.base_url, endpoint),
            &params,
            Some(self.articles_timeout),
        )
        .await?;

        let processed = process_articles(raw, query)?;
        info!(query = %query.query, category = %query.category, "news data fetched");
        Ok(processed)
    }

    async fn sources(&self, query: &SourcesQuery) -> Result<Value, UpstreamError> {
        let mut params = vec![
            ("apiKey", self.api_key.clone()),
            ("language", query.language.clone()),
        ];
        if let Some(category) = &query.category {
            params.push(("category", category.clone()));
        }
        if let Some(country) = &query.country {
            params.push(("country", country.clone()));
        }

        let sources = get_json(
            &self.client,
            &join_url(&self.base_url, "sources"),
            &params,
            Some(self.sources_timeout),
        )
        .await?;

        info!(
            category = query.category.as_deref().unwrap_or("all"),
            "news sources fetched"
        );
        Ok(sources)
    }
}

fn has_text(article: &Value, field: &str) -> bool {
    article
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

fn is_displayable(article: &Value) -> bool {
    has_text(article, "title")
        && article.get("title").and_then(Value::as_str) != Some(REMOVED_TITLE)
        && has_text(article, "description")
        && has_text(article, "url")
}

/// Drops articles the dashboard cannot render and annotates the payload
/// with the query that produced it.
pub fn process_articles(raw: Value, query: &NewsQuery) -> Result<Value, UpstreamError> {
    let Value::Object(mut data) = raw else {
        return Err(UpstreamError::Malformed(
            "news response is not an object".to_string(),
        ));
    };

    let articles: Vec<Value> = match data.remove("articles") {
        Some(Value::Array(articles)) => articles.into_iter().filter(is_displayable).collect(),
        Some(_) => {
            return Err(UpstreamError::Malformed(
                "articles is not an array".to_string(),
            ))
        }
        None => Vec::new(),
    };
    let total = data
        .get("totalResults")
        .and_then(Value::as_u64)
        .unwrap_or(0)
        .min(MAX_TOTAL_RESULTS);

    data.insert("articles".into(), Value::Array(articles));
    data.insert("totalResults".into(), json!(total));
    data.insert("query".into(), json!(query.query));
    data.insert("category".into(), json!(query.category));
    data.insert("language".into(), json!(query.language));
    data.insert("page".into(), json!(query.page));
    data.insert("pageSize".into(), json!(query.limit));

    Ok(Value::Object(data))
}
