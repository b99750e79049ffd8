//! Client side of the API: a [`Gateway`] that keeps one access token fresh
//! across concurrent callers, and the [`AuthApi`] sign-in calls on top of it.

pub mod auth;
pub mod credentials;
pub mod gateway;
pub mod transport;

pub use self::auth::{AuthApi, AuthApiError, SignedIn};
pub use self::credentials::{CredentialStore, MemoryCredentialStore};
pub use self::gateway::{Failure, FailureKind, Gateway, Outcome};
pub use self::transport::{
    ApiRequest, HttpTransport, Method, RawResponse, Transport, TransportError,
};
