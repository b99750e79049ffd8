use crate::axum_api::{ApiResponse, AppState};
use crate::cache::CacheKey;
use crate::errors::AppError;
use crate::upstream::{NewsQuery, SourcesQuery, NEWS_CATEGORIES, NEWS_LANGUAGES};
use crate::validation::{char_len_between, FieldErrors};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub query: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
}

impl NewsParams {
    pub fn into_query(self) -> Result<NewsQuery, AppError> {
        let limit = self.limit.as_deref().map(|v| v.trim().parse::<u32>().ok());
        let page = self.page.as_deref().map(|v| v.trim().parse::<u32>().ok());

        let mut errors = FieldErrors::new();
        if let Some(query) = &self.query {
            errors.check(
                "query",
                char_len_between(query.trim(), 1, 100),
                "Query must be between 1 and 100 characters",
            );
        }
        if let Some(limit) = limit {
            errors.check(
                "limit",
                limit.is_some_and(|l| (1..=100).contains(&l)),
                "Limit must be between 1 and 100",
            );
        }
        if let Some(page) = page {
            errors.check(
                "page",
                page.is_some_and(|p| p >= 1),
                "Page must be a positive integer",
            );
        }
        if let Some(category) = &self.category {
            errors.check(
                "category",
                NEWS_CATEGORIES.contains(&category.as_str()),
                "Invalid category",
            );
        }
        if let Some(language) = &self.language {
            errors.check(
                "language",
                NEWS_LANGUAGES.contains(&language.as_str()),
                "Invalid language code",
            );
        }
        errors.finish()?;

        // The cache key ignores case, so the payload it stores must too.
        let defaults = NewsQuery::default();
        Ok(NewsQuery {
            query: self.query.map(|q| q.trim().to_lowercase()).unwrap_or(defaults.query),
            limit: limit.flatten().unwrap_or(defaults.limit),
            page: page.flatten().unwrap_or(defaults.page),
            category: self.category.unwrap_or(defaults.category),
            language: self.language.unwrap_or(defaults.language),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SourcesParams {
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl From<SourcesParams> for SourcesQuery {
    fn from(params: SourcesParams) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        SourcesQuery {
            category: non_empty(params.category),
            language: non_empty(params.language).unwrap_or_else(|| "en".to_string()),
            country: non_empty(params.country).map(|c| c.trim().to_lowercase()),
        }
    }
}

pub async fn articles(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let query = params.into_query()?;
    let key = CacheKey::news(&query);

    let resolved = state
        .cache
        .resolve(key.as_str(), state.config.cache_default_ttl_seconds, || async {
            state.news.articles(&query).await.map_err(AppError::from)
        })
        .await?;

    Ok(ApiResponse::ok(resolved.value).cached(resolved.from_cache))
}

pub async fn sources(
    State(state): State<AppState>,
    Query(params): Query<SourcesParams>,
) -> Result<ApiResponse<Value>, AppError> {
    let query = SourcesQuery::from(params);
    let key = CacheKey::news_sources(&query);

    let resolved = state
        .cache
        .resolve(key.as_str(), state.config.cache_default_ttl_seconds, || async {
            state.news.sources(&query).await.map_err(AppError::from)
        })
        .await?;

    Ok(ApiResponse::ok(resolved.value).cached(resolved.from_cache))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(articles))
        .route("/sources", get(sources))
}
