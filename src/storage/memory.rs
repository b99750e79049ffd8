use crate::errors::AppError;
use crate::storage::{OtpRecord, OtpStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
struct RateLimitEntry {
    count: u32,
    start_window: u64,
    window_seconds: u64,
}

impl RateLimitEntry {
    fn is_stale_at(&self, now: u64) -> bool {
        now > self.start_window + self.window_seconds
    }
}

pub struct InMemoryOtpStore {
    otps: Arc<RwLock<HashMap<String, OtpRecord>>>,
    rate_limits: Arc<RwLock<HashMap<String, RateLimitEntry>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self {
            otps: Arc::new(RwLock::new(HashMap::new())),
            rate_limits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::StorageError("Lock poisoned".into())
    }
}

impl Default for InMemoryOtpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn save_otp(&self, email: &str, record: OtpRecord) -> Result<(), AppError> {
        let mut map = self.otps.write().map_err(Self::poisoned)?;
        map.insert(email.to_string(), record);
        Ok(())
    }

    async fn get_otp(&self, email: &str) -> Result<Option<OtpRecord>, AppError> {
        let map = self.otps.read().map_err(Self::poisoned)?;
        Ok(map.get(email).cloned())
    }

    async fn delete_otp(&self, email: &str) -> Result<(), AppError> {
        let mut map = self.otps.write().map_err(Self::poisoned)?;
        map.remove(email);
        Ok(())
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<u32, AppError> {
        let mut map = self.otps.write().map_err(Self::poisoned)?;
        match map.get_mut(email) {
            Some(record) => {
                record.attempts += 1;
                Ok(record.attempts)
            }
            None => Ok(0),
        }
    }

    async fn purge_expired(&self) -> Result<usize, AppError> {
        let mut map = self.otps.write().map_err(Self::poisoned)?;
        let now = Utc::now();
        let before = map.len();
        map.retain(|_, record| !record.is_expired_at(now));
        let removed = before - map.len();
        drop(map);

        let now = Self::now_secs();
        let mut windows = self.rate_limits.write().map_err(Self::poisoned)?;
        windows.retain(|_, entry| !entry.is_stale_at(now));
        Ok(removed)
    }

    async fn increment_rate_limit(&self, key: &str, window_seconds: u64) -> Result<u32, AppError> {
        let mut map = self.rate_limits.write().map_err(Self::poisoned)?;
        let now = Self::now_secs();

        let entry = map.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            start_window: now,
            window_seconds,
        });

        if entry.is_stale_at(now) {
            entry.count = 1;
            entry.start_window = now;
            entry.window_seconds = window_seconds;
        } else {
            entry.count += 1;
        }

        Ok(entry.count)
    }
}
