#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use climecast::axum_api::{app_router, AppState};
use climecast::cache::{CacheAside, InMemoryCache};
use climecast::upstream::{NewsQuery, SourcesQuery, UpstreamError, WeatherQuery};
use climecast::{
    AppConfig, AppError, AuthService, EmailSender, InMemoryOtpStore, InMemoryUserStore,
    NewsProvider, WeatherProvider,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

#[derive(Clone, Default)]
pub struct TestEmailSender {
    pub sent_emails: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl TestEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// The code from the most recent email to `recipient`.
    pub fn last_otp(&self, recipient: &str) -> Option<String> {
        let sent = self.sent_emails.lock().unwrap();
        let (_, _, body) = sent.iter().rev().find(|(to, _, _)| to == recipient)?;
        body.lines()
            .map(str::trim)
            .skip_while(|line| !line.contains("following code"))
            .skip(1)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl EmailSender for TestEmailSender {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AppError> {
        self.sent_emails.lock().unwrap().push((
            recipient.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

/// Echoes the query back and counts how often the upstream was reached.
#[derive(Default)]
pub struct StubWeather {
    pub calls: AtomicUsize,
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn current(&self, query: &WeatherQuery) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match query {
            WeatherQuery::City(city) if city.eq_ignore_ascii_case("atlantis") => {
                Err(UpstreamError::Status {
                    status: 404,
                    message: "city not found".into(),
                })
            }
            _ => Ok(json!({ "name": query.describe(), "main": { "temp": 21.5 } })),
        }
    }

    async fn forecast(&self, query: &WeatherQuery) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "city": query.describe(), "hourly": [], "daily": [] }))
    }
}

#[derive(Default)]
pub struct StubNews {
    pub calls: AtomicUsize,
}

#[async_trait]
impl NewsProvider for StubNews {
    async fn articles(&self, query: &NewsQuery) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "articles": [{ "title": format!("{} headline", query.query) }],
            "totalResults": 1,
            "page": query.page,
        }))
    }

    async fn sources(&self, query: &SourcesQuery) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!([{ "id": "bbc-news", "language": query.language }]))
    }
}

pub struct TestApp {
    pub router: Router,
    pub email_sender: Arc<TestEmailSender>,
    pub weather: Arc<StubWeather>,
    pub news: Arc<StubNews>,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default())
}

pub fn spawn_app_with(config: AppConfig) -> TestApp {
    let otps = Arc::new(InMemoryOtpStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let email_sender = Arc::new(TestEmailSender::new());
    let weather = Arc::new(StubWeather::default());
    let news = Arc::new(StubNews::default());

    let state = AppState {
        config: Arc::new(config.clone()),
        auth_service: Arc::new(AuthService::new(
            config,
            otps,
            users.clone(),
            email_sender.clone(),
        )),
        users,
        cache: CacheAside::new(Arc::new(InMemoryCache::new())),
        weather: weather.clone(),
        news: news.clone(),
    };

    let router = app_router(state).layer(tower_cookies::CookieManagerLayer::new());
    TestApp {
        router,
        email_sender,
        weather,
        news,
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` of the refresh cookie set on `response`, if any.
pub fn refresh_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refreshToken="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub struct SignedIn {
    pub access_token: String,
    pub cookie: String,
    pub user: Value,
}

/// Runs send-otp then verify-otp with the emailed code.
pub async fn sign_in(app: &TestApp, email: &str, name: &str) -> SignedIn {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/send-otp",
            json!({ "email": email, "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let otp = app.email_sender.last_otp(email).expect("otp email sent");
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify-otp",
            json!({ "email": email, "name": name, "otp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let cookie = refresh_cookie(&response).expect("refresh cookie set");
    let body = body_json(response).await;
    SignedIn {
        access_token: body["data"]["accessToken"].as_str().unwrap().to_string(),
        cookie,
        user: body["data"]["user"].clone(),
    }
}
