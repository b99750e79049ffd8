//! HTTP surface: the `/api` routes, the bearer-token middleware and the
//! JSON envelopes every handler answers with.

use crate::cache::CacheAside;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::service::AuthService;
use crate::upstream::{NewsProvider, UpstreamError, WeatherProvider};
use crate::users::UserStore;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

pub mod auth;
pub mod bearer;
pub mod locations;
pub mod news;
pub mod users;
pub mod weather;

pub use self::bearer::{verify_jwt, CurrentUser};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_service: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub cache: CacheAside,
    pub weather: Arc<dyn WeatherProvider>,
    pub news: Arc<dyn NewsProvider>,
}

/// Success envelope: `{"status":"success", "message"?, "data"?, "cached"?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached: Option<bool>,
    #[serde(skip)]
    code: StatusCode,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data: Some(data),
            cached: None,
            code: StatusCode::OK,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = Some(cached);
        self
    }

    pub fn created(mut self) -> Self {
        self.code = StatusCode::CREATED;
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: &'static str) -> Self {
        Self {
            status: "success",
            message: Some(message),
            data: None,
            cached: None,
            code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

fn error_parts(err: &AppError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        AppError::RedisError(_)
        | AppError::SerializationError(_)
        | AppError::ConfigError(_)
        | AppError::StorageError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error".to_string(),
        ),
        AppError::EmailError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "EMAIL_ERROR",
            "Failed to send email".to_string(),
        ),
        AppError::TokenError(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => (
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Access token expired".to_string(),
        ),
        AppError::TokenError(_) | AppError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Invalid access token".to_string(),
        ),
        AppError::MissingToken => (StatusCode::UNAUTHORIZED, "NO_TOKEN", message),
        AppError::UserNotFound => (StatusCode::UNAUTHORIZED, "USER_NOT_FOUND", message),
        AppError::MissingRefreshToken => {
            (StatusCode::UNAUTHORIZED, "NO_REFRESH_TOKEN", message)
        }
        AppError::InvalidRefreshToken => {
            (StatusCode::UNAUTHORIZED, "INVALID_REFRESH_TOKEN", message)
        }
        AppError::InvalidOtp(_) => (StatusCode::BAD_REQUEST, "INVALID_OTP", message),
        AppError::RateLimitExceeded => {
            (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
        }
        AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
        AppError::MissingParameters => {
            (StatusCode::BAD_REQUEST, "MISSING_PARAMETERS", message)
        }
        AppError::LocationExists => (StatusCode::BAD_REQUEST, "LOCATION_EXISTS", message),
        AppError::LocationLimit(_) => (StatusCode::BAD_REQUEST, "LOCATION_LIMIT", message),
        AppError::LocationNotFound => (StatusCode::NOT_FOUND, "LOCATION_NOT_FOUND", message),
        AppError::Upstream(UpstreamError::Status { status: 404, .. }) => {
            (StatusCode::NOT_FOUND, "UPSTREAM_NOT_FOUND", message)
        }
        AppError::Upstream(UpstreamError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", message)
        }
        AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message),
        AppError::RouteNotFound => (StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND", message),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Validation(errors) = self {
            let body = Json(json!({ "errors": errors }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, code, message) = error_parts(&self);
        if status.is_server_error() {
            error!(error = %self, code, "request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            warn!(code, "request rejected");
        }

        let body = Json(json!({
            "status": "error",
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Best-effort client address: proxy headers first, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("cf-connecting-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
        })
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

pub fn set_refresh_cookie(
    cookies: &tower_cookies::Cookies,
    refresh_token: &str,
    config: &AppConfig,
) {
    use tower_cookies::{cookie::time::Duration, cookie::SameSite, Cookie};

    let same_site = match config.refresh_cookie_same_site.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    };

    let mut cookie = Cookie::build((
        config.refresh_cookie_name.clone(),
        refresh_token.to_string(),
    ))
    .http_only(true)
    .secure(config.refresh_cookie_secure)
    .same_site(same_site)
    .path(config.refresh_cookie_path.clone())
    .max_age(Duration::days(config.refresh_token_expire_days));

    if let Some(domain) = &config.refresh_cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookies.add(cookie.build());
}

pub fn refresh_cookie_value(
    cookies: &tower_cookies::Cookies,
    config: &AppConfig,
) -> Option<String> {
    cookies
        .get(&config.refresh_cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn clear_refresh_cookie(cookies: &tower_cookies::Cookies, config: &AppConfig) {
    use tower_cookies::Cookie;

    let mut cookie = Cookie::build((config.refresh_cookie_name.clone(), ""))
        .path(config.refresh_cookie_path.clone());
    if let Some(domain) = &config.refresh_cookie_domain {
        cookie = cookie.domain(domain.clone());
    }
    cookies.remove(cookie.build());
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.cache.store();
    let cache = match store.health_check().await {
        Ok(()) => format!("{} cache connected", store.backend_name()),
        Err(e) => {
            warn!(error = %e, "cache health check failed");
            format!("{} cache unavailable", store.backend_name())
        }
    };
    Json(json!({ "message": "Server is running...", "cache": cache }))
}

async fn fallback() -> AppError {
    AppError::RouteNotFound
}

/// The full application router. The caller adds the cookie, CORS and trace
/// layers.
pub fn app_router(state: AppState) -> Router {
    let bearer = || middleware::from_fn_with_state(state.clone(), verify_jwt);

    Router::new()
        .route("/", get(health))
        .nest("/api/auth", auth::router())
        .nest("/api/users", users::router().route_layer(bearer()))
        .nest("/api/locations", locations::router().route_layer(bearer()))
        .nest("/api/weather", weather::router().route_layer(bearer()))
        .nest("/api/news", news::router().route_layer(bearer()))
        .fallback(fallback)
        .with_state(state)
}
