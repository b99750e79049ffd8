use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

/// Path of the credential renewal endpoint, relative to the API base.
pub const RENEWAL_PATH: &str = "/auth/refresh";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A logical request against the backend. The path is relative to the
/// transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    renewal: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            renewal: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The credential renewal call. It is never itself renewed-and-replayed.
    pub fn renewal() -> Self {
        Self {
            renewal: true,
            ..Self::new(Method::Post, RENEWAL_PATH)
        }
    }

    pub fn is_renewal(&self) -> bool {
        self.renewal
    }
}

/// Whatever the server answered, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl RawResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request left but nothing came back: timeout, refused, reset.
    #[error("No response from server: {0}")]
    NoResponse(String),

    #[error("{0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`, attaching `credential` as a bearer token when given.
    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
    ) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport. The cookie store carries the renewal cookie
/// set at login to the renewal endpoint.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::NoResponse(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::NoResponse(e.to_string()))?;
        let body = serde_json::from_slice(&bytes).ok();

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sends_bearer_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/users/me"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "name": "Kai" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/api/", server.uri())).unwrap();
        let response = transport
            .send(&ApiRequest::put("/users/me", json!({ "name": "Kai" })), Some("tok"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(json!({ "status": "success" })));
    }

    #[tokio::test]
    async fn test_non_json_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri()).unwrap();
        let response = transport.send(&ApiRequest::get("/x"), None).await.unwrap();
        assert_eq!(response.status, 502);
        assert_eq!(response.body, None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_no_response() {
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
        let result = transport.send(&ApiRequest::get("/x"), None).await;
        assert!(matches!(result, Err(TransportError::NoResponse(_))));
    }
}
