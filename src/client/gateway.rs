//! The request gateway: every backend call goes through [`Gateway::execute`].
//!
//! The gateway attaches the held access token, and when the backend rejects
//! it with a 401 it renews the token through the renewal endpoint and
//! replays the request once. Renewal is single-flight per gateway: the first
//! rejected request starts it, every request rejected while it runs waits on
//! the same result, and waiters are released in the order they arrived once
//! it resolves.
//!
//! The renewal runs on its own task, so cancelling any caller, including the
//! one that started it, never cancels the renewal or the other waiters.
//!
//! Outcomes are always normalized into [`Outcome`]; only a 401 from the
//! renewal endpoint itself discards the held token and reports
//! [`FailureKind::ReauthenticationRequired`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::credentials::CredentialStore;
use crate::client::transport::{ApiRequest, RawResponse, Transport, TransportError};

const UNAUTHORIZED: u16 = 401;
const MAX_REPLAYS: u32 = 1;
const NO_RESPONSE_MESSAGE: &str = "No response from server. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered with a non-success status.
    Http,
    /// Nothing came back.
    NoResponse,
    /// The request could not be built or sent at all.
    Request,
    /// The renewal token was rejected; the user must sign in again.
    ReauthenticationRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
    pub data: Option<Value>,
}

impl Failure {
    fn from_response(response: RawResponse) -> Self {
        let message = response
            .body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status {}", response.status));
        Self {
            kind: FailureKind::Http,
            message,
            status: Some(response.status),
            data: response.body,
        }
    }

    fn from_transport(err: &TransportError) -> Self {
        let (kind, message) = match err {
            TransportError::NoResponse(_) => (FailureKind::NoResponse, NO_RESPONSE_MESSAGE.into()),
            TransportError::InvalidRequest(msg) => (FailureKind::Request, msg.clone()),
        };
        Self {
            kind,
            message,
            status: None,
            data: None,
        }
    }

    pub fn requires_reauthentication(&self) -> bool {
        self.kind == FailureKind::ReauthenticationRequired
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { status: u16, data: Value },
    Failure(Failure),
    /// The caller's cancellation token fired first. Not an error.
    Cancelled,
}

impl Outcome {
    fn from_response(response: RawResponse) -> Self {
        if response.is_success() {
            Outcome::Success {
                status: response.status,
                data: response.body.unwrap_or(Value::Null),
            }
        } else {
            Outcome::Failure(Failure::from_response(response))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success { status, .. } => Some(*status),
            Outcome::Failure(failure) => failure.status,
            Outcome::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Renewal {
    Renewed(String),
    Failed(Failure),
}

#[derive(Default)]
struct RenewalState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Renewal>>,
}

enum Join {
    /// The token changed while the request was on the wire; use it.
    Replay(String),
    Wait(oneshot::Receiver<Renewal>),
}

struct Inner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    renewal: Mutex<RenewalState>,
}

#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                renewal: Mutex::new(RenewalState::default()),
            }),
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    pub async fn execute(&self, request: &ApiRequest) -> Outcome {
        self.execute_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but resolves to
    /// [`Outcome::Cancelled`] as soon as `cancel` fires.
    pub async fn execute_cancellable(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Outcome {
        let mut credential = self.inner.credentials.get();
        let mut replays = 0;

        loop {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Outcome::Cancelled,
                sent = self.inner.transport.send(request, credential.as_deref()) => sent,
            };
            let response = match sent {
                Ok(response) => response,
                Err(err) => return Outcome::Failure(Failure::from_transport(&err)),
            };

            if response.status != UNAUTHORIZED || request.is_renewal() || replays >= MAX_REPLAYS {
                return Outcome::from_response(response);
            }

            let renewed = match self.join_renewal(credential.as_deref()) {
                Join::Replay(current) => current,
                Join::Wait(receiver) => {
                    let renewal = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Outcome::Cancelled,
                        renewal = receiver => renewal,
                    };
                    match renewal {
                        Ok(Renewal::Renewed(token)) => token,
                        Ok(Renewal::Failed(failure)) => return Outcome::Failure(failure),
                        // The renewal task went away without reporting.
                        Err(_) => {
                            return Outcome::Failure(Failure::from_transport(
                                &TransportError::NoResponse("renewal abandoned".into()),
                            ))
                        }
                    }
                }
            };

            debug!(path = %request.path, "replaying request with renewed credential");
            credential = Some(renewed);
            replays += 1;
        }
    }

    fn join_renewal(&self, sent_with: Option<&str>) -> Join {
        let (sender, receiver) = oneshot::channel();
        {
            let mut state = self.inner.renewal.lock();
            if !state.in_flight {
                if let Some(current) = self.inner.credentials.get() {
                    if sent_with != Some(current.as_str()) {
                        return Join::Replay(current);
                    }
                }
            }
            state.waiters.push(sender);
            if state.in_flight {
                return Join::Wait(receiver);
            }
            state.in_flight = true;
        }

        let gateway = self.clone();
        tokio::spawn(async move { gateway.renew().await });
        Join::Wait(receiver)
    }

    async fn renew(self) {
        info!("access token rejected, renewing");
        let renewal = match self
            .inner
            .transport
            .send(&ApiRequest::renewal(), None)
            .await
        {
            Ok(response) if response.is_success() => match access_token(&response) {
                Some(token) => {
                    self.inner.credentials.set(token.clone());
                    Renewal::Renewed(token)
                }
                None => {
                    let mut failure = Failure::from_response(response);
                    failure.message = "Renewal response carried no access token".into();
                    Renewal::Failed(failure)
                }
            },
            Ok(response) if response.status == UNAUTHORIZED => {
                warn!("renewal token rejected, credential cleared");
                self.inner.credentials.clear();
                let mut failure = Failure::from_response(response);
                failure.kind = FailureKind::ReauthenticationRequired;
                Renewal::Failed(failure)
            }
            Ok(response) => Renewal::Failed(Failure::from_response(response)),
            Err(err) => {
                warn!(error = %err, "renewal call failed");
                Renewal::Failed(Failure::from_transport(&err))
            }
        };

        let waiters = {
            let mut state = self.inner.renewal.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(waiters = waiters.len(), "renewal resolved");
        for waiter in waiters {
            // A cancelled waiter has dropped its receiver.
            let _ = waiter.send(renewal.clone());
        }
    }
}

fn access_token(response: &RawResponse) -> Option<String> {
    response
        .body
        .as_ref()?
        .pointer("/data/accessToken")?
        .as_str()
        .map(str::to_string)
}
