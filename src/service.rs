use crate::config::{AppConfig, OtpType};
use crate::email::{otp_email_body, EmailSender, OTP_SUBJECT};
use crate::errors::AppError;
use crate::rate_limit::RateLimiter;
use crate::storage::{OtpRecord, OtpStore};
use crate::token::{TokenKind, TokenService};
use crate::users::{normalize_email, User, UserStore};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const MAGIC_DIGIT: &str = "0";

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    pub config: AppConfig,
    otps: Arc<dyn OtpStore>,
    users: Arc<dyn UserStore>,
    email_sender: Arc<dyn EmailSender>,
    token_service: TokenService,
    rate_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(
        config: AppConfig,
        otps: Arc<dyn OtpStore>,
        users: Arc<dyn UserStore>,
        email_sender: Arc<dyn EmailSender>,
    ) -> Self {
        let token_service = TokenService::new(&config);
        let rate_limiter = RateLimiter::new(otps.clone(), config.otp_rate_limit_per_minute);
        Self {
            config,
            otps,
            users,
            email_sender,
            token_service,
            rate_limiter,
        }
    }

    #[instrument(skip(self))]
    pub async fn send_otp(
        &self,
        email: &str,
        name: &str,
        client_ip: Option<&str>,
    ) -> Result<(), AppError> {
        let email = normalize_email(email);
        self.rate_limiter.check_rate_limit(&email).await?;

        let otp = if self.config.enable_magic_login {
            MAGIC_DIGIT.repeat(self.config.otp_length)
        } else {
            self.generate_otp()
        };

        self.otps
            .save_otp(&email, OtpRecord::new(otp.clone(), self.config.otp_expiry_seconds))
            .await?;

        if self.config.enable_magic_login {
            info!("magic login enabled, skipping otp email");
            return Ok(());
        }

        let body = otp_email_body(
            name,
            &otp,
            client_ip,
            self.config.otp_expiry_seconds / 60,
            &self.config.frontend_origin,
        );
        self.email_sender
            .send_email(&email, OTP_SUBJECT, &body)
            .await?;

        info!("otp sent");
        Ok(())
    }

    /// Checks `otp` against the stored record and, on a match, logs the user
    /// in, creating the account on first login.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(
        &self,
        email: &str,
        name: &str,
        otp: &str,
    ) -> Result<Session, AppError> {
        let email = normalize_email(email);

        let record = self
            .otps
            .get_otp(&email)
            .await?
            .ok_or_else(|| AppError::InvalidOtp("OTP not found or expired".into()))?;

        if record.is_expired_at(Utc::now()) {
            self.otps.delete_otp(&email).await?;
            return Err(AppError::InvalidOtp("OTP has expired".into()));
        }

        if !record.code.eq_ignore_ascii_case(otp.trim()) {
            let attempts = self.otps.record_failed_attempt(&email).await?;
            let max = self.config.otp_max_verify_attempts;
            if attempts >= max {
                self.otps.delete_otp(&email).await?;
                warn!("otp locked after too many failed attempts");
                return Err(AppError::InvalidOtp("Too many failed attempts".into()));
            }
            return Err(AppError::InvalidOtp(format!(
                "Invalid OTP. {} attempts remaining",
                max - attempts
            )));
        }

        self.otps.delete_otp(&email).await?;

        let (user, created) = self.users.find_or_create(&email, name).await?;
        let access_token = self.token_service.create_access_token(user.id)?;
        let refresh_token = self.token_service.create_refresh_token(user.id)?;
        self.users
            .issue_renewal_token(user.id, &refresh_token)
            .await?;

        info!(user_id = %user.id, created, "user logged in");
        Ok(Session {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Exchanges a refresh token for a new access token. The presented token
    /// is superseded by the returned one and cannot be used again.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, String), AppError> {
        let claims = self
            .token_service
            .verify_token(refresh_token, TokenKind::Refresh)
            .map_err(|_| AppError::InvalidRefreshToken)?;

        let replacement = self.token_service.create_refresh_token(claims.sub)?;
        let rotated = self
            .users
            .rotate_renewal_token(claims.sub, refresh_token, &replacement)
            .await?;
        if !rotated {
            warn!(user_id = %claims.sub, "refresh token not in renewal record");
            return Err(AppError::InvalidRefreshToken);
        }

        let access_token = self.token_service.create_access_token(claims.sub)?;
        Ok((access_token, replacement))
    }

    /// Forgets the presented refresh token. Unverifiable tokens are ignored.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AppError> {
        let Some(token) = refresh_token else {
            return Ok(());
        };
        if let Ok(claims) = self.token_service.verify_token(token, TokenKind::Refresh) {
            self.users.revoke_renewal_token(claims.sub, token).await?;
            info!(user_id = %claims.sub, "user logged out");
        }
        Ok(())
    }

    /// Resolves a bearer access token to its user.
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self
            .token_service
            .verify_token(access_token, TokenKind::Access)?;
        self.users
            .get(claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    fn generate_otp(&self) -> String {
        let mut rng = rand::thread_rng();
        match self.config.otp_type {
            OtpType::Numeric => {
                let range = 10u32.pow(self.config.otp_length as u32);
                let num = rng.gen_range(0..range);
                format!("{:0width$}", num, width = self.config.otp_length)
            }
            OtpType::Alphanumeric => {
                let chars: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
                (0..self.config.otp_length)
                    .map(|_| {
                        let idx = rng.gen_range(0..chars.len());
                        chars[idx] as char
                    })
                    .collect()
            }
        }
    }
}
