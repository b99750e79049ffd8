use crate::errors::AppError;
use crate::storage::OtpStore;
use std::sync::Arc;
use tracing::warn;

const WINDOW_SECONDS: u64 = 60;

/// Fixed one-minute window on OTP requests per email address.
pub struct RateLimiter {
    store: Arc<dyn OtpStore>,
    per_minute: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn OtpStore>, per_minute: u32) -> Self {
        Self { store, per_minute }
    }

    pub async fn check_rate_limit(&self, email: &str) -> Result<(), AppError> {
        let key = format!("rate_limit:{}", email);
        let count = self.store.increment_rate_limit(&key, WINDOW_SECONDS).await?;

        if count > self.per_minute {
            warn!(email, count, "otp rate limit exceeded");
            return Err(AppError::RateLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryOtpStore, MockOtpStore};
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(Arc::new(InMemoryOtpStore::new()), 2);
        assert!(limiter.check_rate_limit("a@example.com").await.is_ok());
        assert!(limiter.check_rate_limit("a@example.com").await.is_ok());
        assert!(matches!(
            limiter.check_rate_limit("a@example.com").await,
            Err(AppError::RateLimitExceeded)
        ));
        assert!(limiter.check_rate_limit("b@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_uses_one_minute_window_key() {
        let mut store = MockOtpStore::new();
        store
            .expect_increment_rate_limit()
            .with(eq("rate_limit:c@example.com"), eq(60))
            .times(1)
            .returning(|_, _| Ok(1));

        let limiter = RateLimiter::new(Arc::new(store), 5);
        assert!(limiter.check_rate_limit("c@example.com").await.is_ok());
    }
}
