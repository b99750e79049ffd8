//! Per-user record of outstanding refresh tokens.
//!
//! Every login appends a token; every refresh supersedes the presented token
//! with a new one, so a token can be exchanged at most once. Tokens older
//! than the validity window are purged whenever the record is touched.

use chrono::{DateTime, Duration, Utc};

pub const RENEWAL_TOKEN_VALIDITY_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct RenewalToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl RenewalToken {
    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.created_at + Duration::days(RENEWAL_TOKEN_VALIDITY_DAYS) > now
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenewalRecord {
    tokens: Vec<RenewalToken>,
}

impl RenewalRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[RenewalToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns the number of tokens removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.is_live_at(now));
        before - self.tokens.len()
    }

    pub fn issue(&mut self, token: impl Into<String>, now: DateTime<Utc>) {
        self.purge_expired(now);
        self.tokens.push(RenewalToken {
            token: token.into(),
            created_at: now,
        });
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.token == token)
    }

    /// Replaces `presented` with `replacement`. Returns `false`, leaving the
    /// record unchanged apart from the purge, when `presented` is not a live
    /// token.
    pub fn supersede(
        &mut self,
        presented: &str,
        replacement: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        self.purge_expired(now);
        let Some(index) = self.tokens.iter().position(|t| t.token == presented) else {
            return false;
        };
        self.tokens.remove(index);
        self.tokens.push(RenewalToken {
            token: replacement.into(),
            created_at: now,
        });
        true
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.token != token);
        before != self.tokens.len()
    }
}
