#![doc = include_str!("../README.md")]

#[cfg(feature = "axum")]
pub use tower_cookies;

#[cfg(feature = "axum")]
pub mod axum_api;
pub mod cache;
pub mod client;
pub mod config;
pub mod cron;
pub mod email;
pub mod errors;
pub mod rate_limit;
pub mod renewal;
pub mod service;
pub mod storage;
pub mod token;
pub mod upstream;
pub mod users;
pub mod validation;

pub use cache::{CacheAside, CacheKey, CacheStore};
pub use client::{AuthApi, Gateway, Outcome};
pub use config::{AppConfig, CacheBackend, OtpType};
pub use email::{EmailSender, LettreEmailSender};
pub use errors::AppError;
pub use service::{AuthService, Session};
pub use storage::{InMemoryOtpStore, OtpStore};
pub use upstream::{NewsProvider, UpstreamError, WeatherProvider};
pub use users::{InMemoryUserStore, User, UserStore};
