use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::client::gateway::{Failure, Gateway, Outcome};
use crate::client::transport::ApiRequest;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthApiError {
    #[error("{message}")]
    Failed {
        message: String,
        status: Option<u16>,
    },

    #[error("Session expired. Please sign in again.")]
    ReauthenticationRequired,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unexpected response: {0}")]
    Malformed(&'static str),
}

impl AuthApiError {
    /// Keeps the server's message when it sent one, else `fallback`.
    fn from_failure(failure: Failure, fallback: &str) -> Self {
        if failure.requires_reauthentication() {
            return AuthApiError::ReauthenticationRequired;
        }
        let message = failure
            .data
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string();
        AuthApiError::Failed {
            message,
            status: failure.status,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AuthApiError::Failed { status, .. } => *status,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    pub user: Value,
    pub access_token: String,
}

/// Sign-in and session calls on top of a [`Gateway`].
#[derive(Clone)]
pub struct AuthApi {
    gateway: Gateway,
}

impl AuthApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub async fn send_otp(&self, email: &str, name: &str) -> Result<(), AuthApiError> {
        let request = ApiRequest::post("/auth/send-otp", json!({ "email": email, "name": name }));
        data(self.gateway.execute(&request).await, "Failed to send OTP").map(|_| ())
    }

    /// Exchanges a code for a session and keeps the access token.
    pub async fn verify_otp(
        &self,
        email: &str,
        otp: &str,
        name: &str,
    ) -> Result<SignedIn, AuthApiError> {
        let request = ApiRequest::post(
            "/auth/verify-otp",
            json!({ "email": email, "otp": otp, "name": name }),
        );
        let body = data(self.gateway.execute(&request).await, "Failed to verify OTP")?;

        let access_token = body
            .pointer("/data/accessToken")
            .and_then(Value::as_str)
            .ok_or(AuthApiError::Malformed("missing access token"))?
            .to_string();
        let user = body.pointer("/data/user").cloned().unwrap_or(Value::Null);

        self.gateway.credentials().set(access_token.clone());
        Ok(SignedIn { user, access_token })
    }

    /// The signed-in user, or `None` when no credential is held.
    ///
    /// A failure other than a 401 drops the credential; a 401 has already
    /// been through renewal and is left for the caller to act on.
    pub async fn check_auth(&self) -> Result<Option<Value>, AuthApiError> {
        if self.gateway.credentials().get().is_none() {
            return Ok(None);
        }

        match self.gateway.execute(&ApiRequest::get("/users/me")).await {
            Outcome::Success { data: body, .. } => {
                Ok(body.pointer("/data").cloned().filter(|user| !user.is_null()))
            }
            Outcome::Failure(failure) => {
                if failure.status != Some(401) {
                    debug!(status = ?failure.status, "session check failed, dropping credential");
                    self.gateway.credentials().clear();
                }
                Err(AuthApiError::from_failure(failure, "Failed to load profile"))
            }
            Outcome::Cancelled => Err(AuthApiError::Cancelled),
        }
    }

    /// Ends the session server-side when possible; the local credential is
    /// cleared either way.
    pub async fn logout(&self) {
        if let Outcome::Failure(failure) = self
            .gateway
            .execute(&ApiRequest::post("/auth/logout", json!({})))
            .await
        {
            debug!(message = %failure.message, "logout call failed");
        }
        self.gateway.credentials().clear();
    }
}

fn data(outcome: Outcome, fallback: &str) -> Result<Value, AuthApiError> {
    match outcome {
        Outcome::Success { data, .. } => Ok(data),
        Outcome::Failure(failure) => Err(AuthApiError::from_failure(failure, fallback)),
        Outcome::Cancelled => Err(AuthApiError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::credentials::{CredentialStore, MemoryCredentialStore};
    use crate::client::transport::{RawResponse, Transport, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Answers each path with a fixed response and records what was sent.
    #[derive(Default)]
    struct Scripted {
        responses: HashMap<&'static str, RawResponse>,
        sent: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Scripted {
        fn with(mut self, path: &'static str, status: u16, body: Value) -> Self {
            self.responses.insert(path, RawResponse::new(status, body));
            self
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(
            &self,
            request: &ApiRequest,
            credential: Option<&str>,
        ) -> Result<RawResponse, TransportError> {
            self.sent
                .lock()
                .push((request.path.clone(), credential.map(str::to_string)));
            self.responses
                .get(request.path.as_str())
                .cloned()
                .ok_or_else(|| TransportError::NoResponse("connection refused".into()))
        }
    }

    fn api(
        transport: Scripted,
        credential: Option<&str>,
    ) -> (AuthApi, Arc<Scripted>, Arc<MemoryCredentialStore>) {
        let transport = Arc::new(transport);
        let credentials = Arc::new(match credential {
            Some(c) => MemoryCredentialStore::with_credential(c),
            None => MemoryCredentialStore::new(),
        });
        let gateway = Gateway::new(transport.clone(), credentials.clone());
        (AuthApi::new(gateway), transport, credentials)
    }

    #[tokio::test]
    async fn test_verify_otp_keeps_access_token() {
        let transport = Scripted::default().with(
            "/auth/verify-otp",
            200,
            json!({
                "status": "success",
                "message": "Login successful",
                "data": { "user": { "email": "kai@example.com" }, "accessToken": "abc" }
            }),
        );
        let (api, _, credentials) = api(transport, None);

        let signed_in = api.verify_otp("kai@example.com", "123456", "Kai").await.unwrap();
        assert_eq!(signed_in.access_token, "abc");
        assert_eq!(signed_in.user["email"], "kai@example.com");
        assert_eq!(credentials.get().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_server_message_or_fallback() {
        let transport = Scripted::default()
            .with(
                "/auth/verify-otp",
                400,
                json!({
                    "status": "error",
                    "code": "INVALID_OTP",
                    "message": "Invalid OTP. 2 attempts remaining"
                }),
            )
            .with(
                "/auth/send-otp",
                400,
                json!({ "errors": { "email": "email: Valid email required" } }),
            );
        let (api, _, credentials) = api(transport, None);

        let err = api.verify_otp("kai@example.com", "000000", "Kai").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid OTP. 2 attempts remaining");
        assert_eq!(err.status(), Some(400));
        assert_eq!(credentials.get(), None);

        let err = api.send_otp("nope", "Kai").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to send OTP");
    }

    #[tokio::test]
    async fn test_check_auth_without_credential_skips_network() {
        let (api, transport, _) = api(Scripted::default(), None);
        assert_eq!(api.check_auth().await.unwrap(), None);
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_check_auth_drops_credential_on_server_error() {
        let transport = Scripted::default().with(
            "/users/me",
            500,
            json!({
                "status": "error",
                "code": "INTERNAL_ERROR",
                "message": "Internal server error"
            }),
        );
        let (api, _, credentials) = api(transport, Some("tok"));

        let err = api.check_auth().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(credentials.get(), None);
    }

    #[tokio::test]
    async fn test_check_auth_returns_profile() {
        let transport = Scripted::default().with(
            "/users/me",
            200,
            json!({ "status": "success", "data": { "name": "Kai" } }),
        );
        let (api, transport, credentials) = api(transport, Some("tok"));

        let user = api.check_auth().await.unwrap().unwrap();
        assert_eq!(user["name"], "Kai");
        assert_eq!(credentials.get().as_deref(), Some("tok"));
        assert_eq!(transport.sent.lock()[0].1.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_unreachable() {
        let (api, transport, credentials) = api(Scripted::default(), Some("tok"));
        api.logout().await;
        assert_eq!(credentials.get(), None);
        assert_eq!(transport.sent.lock()[0].0, "/auth/logout");
    }
}
