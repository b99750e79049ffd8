use crate::errors::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub mod memory;

/// A pending one-time code for an email address.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpRecord {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl OtpRecord {
    pub fn new(code: impl Into<String>, expiry_seconds: u64) -> Self {
        let created_at = Utc::now();
        Self {
            code: code.into(),
            created_at,
            expires_at: created_at + Duration::seconds(expiry_seconds as i64),
            attempts: 0,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Replaces any previous record for `email`.
    async fn save_otp(&self, email: &str, record: OtpRecord) -> Result<(), AppError>;
    async fn get_otp(&self, email: &str) -> Result<Option<OtpRecord>, AppError>;
    async fn delete_otp(&self, email: &str) -> Result<(), AppError>;

    /// Bumps the failed-attempt counter and returns the new value, or 0 when
    /// no record exists.
    async fn record_failed_attempt(&self, email: &str) -> Result<u32, AppError>;

    /// Drops every record whose expiry has passed, along with rate-limit
    /// windows that have closed. Returns how many OTP records were removed.
    async fn purge_expired(&self) -> Result<usize, AppError>;

    async fn increment_rate_limit(&self, key: &str, window_seconds: u64) -> Result<u32, AppError>;
}

pub use self::memory::InMemoryOtpStore;
