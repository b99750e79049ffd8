use crate::config::AppConfig;
use crate::errors::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub jti: String,
    pub typ: TokenKind,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies access and refresh tokens. Each kind has its own
/// secret so one can never be accepted in place of the other.
pub struct TokenService {
    algorithm: jsonwebtoken::Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
    access: Keys,
    refresh: Keys,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            algorithm: config.jwt_algorithm,
            access_ttl: Duration::minutes(config.access_token_expire_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expire_days),
            access: Keys::from_secret(&config.jwt_access_secret),
            refresh: Keys::from_secret(&config.jwt_refresh_secret),
        }
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn create(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let expiration = Utc::now()
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| AppError::ConfigError("Token lifetime out of range".into()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id,
            exp: expiration,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.keys(kind).encoding)?;
        Ok(token)
    }

    pub fn create_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.create(user_id, TokenKind::Access)
    }

    pub fn create_refresh_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.create(user_id, TokenKind::Refresh)
    }

    pub fn verify_token(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let validation = Validation::new(self.algorithm);
        let token_data = decode::<Claims>(token, &self.keys(expected).decoding, &validation)?;

        if token_data.claims.typ != expected {
            return Err(AppError::TokenError(ErrorKind::InvalidToken.into()));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AppConfig::default())
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = service();
        let user_id = Uuid::new_v4();
        let token = service.create_access_token(user_id).unwrap();
        let claims = service.verify_token(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = service();
        let token = service.create_refresh_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            service.verify_token(&token, TokenKind::Access),
            Err(AppError::TokenError(_))
        ));
        assert!(service.verify_token(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = service();
        let user_id = Uuid::new_v4();
        let a = service.create_refresh_token(user_id).unwrap();
        let b = service.create_refresh_token(user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = AppConfig {
            access_token_expire_minutes: -5,
            ..AppConfig::default()
        };
        let service = TokenService::new(&config);
        let token = service.create_access_token(Uuid::new_v4()).unwrap();
        match service.verify_token(&token, TokenKind::Access) {
            Err(AppError::TokenError(e)) => {
                assert!(matches!(e.kind(), ErrorKind::ExpiredSignature))
            }
            other => panic!("expected expiry error, got {:?}", other.map(|c| c.sub)),
        }
    }
}
