use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub frontend_origin: String,
    pub production: bool,

    pub otp_expiry_seconds: u64,
    pub otp_max_verify_attempts: u32,
    pub otp_rate_limit_per_minute: u32,
    pub otp_sweep_interval_seconds: u64,
    pub otp_length: usize,
    pub otp_type: OtpType,
    pub enable_magic_login: bool, // stores all zeros and skips the email

    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_algorithm: jsonwebtoken::Algorithm,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,

    pub cache_backend: CacheBackend,
    pub redis_url: String,
    pub cache_default_ttl_seconds: u64,
    pub cache_weather_ttl_seconds: u64,

    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_geo_url: String,
    pub newsapi_key: String,
    pub newsapi_base_url: String,

    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_starttls: bool,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_from: String,
    pub mail_from_name: String,

    pub refresh_cookie_name: String,
    pub refresh_cookie_domain: Option<String>,
    pub refresh_cookie_path: String,
    pub refresh_cookie_secure: bool,
    pub refresh_cookie_same_site: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OtpType {
    Numeric,
    Alphanumeric,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            frontend_origin: "http://localhost:5173".to_string(),
            production: false,
            otp_expiry_seconds: 300,
            otp_max_verify_attempts: 3,
            otp_rate_limit_per_minute: 5,
            otp_sweep_interval_seconds: 600,
            otp_length: 6,
            otp_type: OtpType::Alphanumeric,
            enable_magic_login: false,
            jwt_access_secret: "access-secret".to_string(),
            jwt_refresh_secret: "refresh-secret".to_string(),
            jwt_algorithm: jsonwebtoken::Algorithm::HS256,
            access_token_expire_minutes: 15,
            refresh_token_expire_days: 7,
            cache_backend: CacheBackend::Memory,
            redis_url: "redis://127.0.0.1/".to_string(),
            cache_default_ttl_seconds: 600,
            cache_weather_ttl_seconds: 900,
            openweather_api_key: "".to_string(),
            openweather_base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            openweather_geo_url: "https://api.openweathermap.org/geo/1.0".to_string(),
            newsapi_key: "".to_string(),
            newsapi_base_url: "https://newsapi.org/v2".to_string(),
            smtp_server: "localhost".to_string(),
            smtp_port: 1025,
            smtp_starttls: true,
            smtp_username: "".to_string(),
            smtp_password: "".to_string(),
            mail_from: "noreply@climecast.com".to_string(),
            mail_from_name: "ClimeCast".to_string(),
            refresh_cookie_name: "refreshToken".to_string(),
            refresh_cookie_domain: None,
            refresh_cookie_path: "/".to_string(),
            refresh_cookie_secure: false,
            refresh_cookie_same_site: "Lax".to_string(),
        }
    }
}

/// Numeric codes are drawn below `10^len`, which must fit a `u32`.
pub const OTP_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=9;

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::ConfigError(format!("Invalid {}", name))),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(port) = parse_var("PORT")? {
            config.port = port;
        }
        if let Ok(val) = std::env::var("FRONTEND_ORIGIN") {
            config.frontend_origin = val;
        }
        if let Ok(val) = std::env::var("APP_ENV") {
            config.production = val.eq_ignore_ascii_case("production");
        }
        // Production defaults mirror the cookie policy of a cross-site frontend.
        if config.production {
            config.refresh_cookie_secure = true;
            config.refresh_cookie_same_site = "None".to_string();
        }

        if let Some(val) = parse_var("OTP_EXPIRY_SECONDS")? {
            config.otp_expiry_seconds = val;
        }
        if let Some(val) = parse_var("OTP_MAX_VERIFY_ATTEMPTS")? {
            config.otp_max_verify_attempts = val;
        }
        if let Some(val) = parse_var("OTP_RATE_LIMIT_PER_MINUTE")? {
            config.otp_rate_limit_per_minute = val;
        }
        if let Some(val) = parse_var("OTP_SWEEP_INTERVAL_SECONDS")? {
            config.otp_sweep_interval_seconds = val;
        }
        if let Some(val) = parse_var("OTP_LENGTH")? {
            config.otp_length = val;
        }
        if let Ok(val) = std::env::var("OTP_TYPE") {
            config.otp_type = match val.to_lowercase().as_str() {
                "numeric" => OtpType::Numeric,
                "alphanumeric" => OtpType::Alphanumeric,
                _ => {
                    return Err(AppError::ConfigError(
                        "Invalid OTP_TYPE: must be 'numeric' or 'alphanumeric'".to_string(),
                    ))
                }
            };
        }
        if let Ok(val) = std::env::var("ENABLE_MAGIC_LOGIN") {
            config.enable_magic_login = val.parse().unwrap_or(false);
        }

        if let Ok(val) = std::env::var("JWT_ACCESS_SECRET") {
            config.jwt_access_secret = val;
        }
        if let Ok(val) = std::env::var("JWT_REFRESH_SECRET") {
            config.jwt_refresh_secret = val;
        }
        if let Some(val) = parse_var("ACCESS_TOKEN_EXPIRE_MINUTES")? {
            config.access_token_expire_minutes = val;
        }
        if let Some(val) = parse_var("REFRESH_TOKEN_EXPIRE_DAYS")? {
            config.refresh_token_expire_days = val;
        }

        if let Ok(val) = std::env::var("CACHE_BACKEND") {
            config.cache_backend = match val.to_lowercase().as_str() {
                "memory" => CacheBackend::Memory,
                "redis" => CacheBackend::Redis,
                _ => {
                    return Err(AppError::ConfigError(
                        "Invalid CACHE_BACKEND: must be 'memory' or 'redis'".to_string(),
                    ))
                }
            };
        }
        if let Ok(val) = std::env::var("REDIS_URL") {
            config.redis_url = val;
        } else if config.cache_backend == CacheBackend::Redis {
            return Err(AppError::ConfigError(
                "REDIS_URL must be set when CACHE_BACKEND=redis".to_string(),
            ));
        }
        if let Some(val) = parse_var("CACHE_DEFAULT_TTL_SECONDS")? {
            config.cache_default_ttl_seconds = val;
        }
        if let Some(val) = parse_var("CACHE_WEATHER_TTL_SECONDS")? {
            config.cache_weather_ttl_seconds = val;
        }

        config.openweather_api_key = std::env::var("OPENWEATHER_API_KEY")
            .map_err(|_| AppError::ConfigError("OPENWEATHER_API_KEY must be set".to_string()))?;
        if let Ok(val) = std::env::var("OPENWEATHER_BASE_URL") {
            config.openweather_base_url = val;
        }
        if let Ok(val) = std::env::var("OPENWEATHER_GEO_URL") {
            config.openweather_geo_url = val;
        }
        config.newsapi_key = std::env::var("NEWSAPI_KEY")
            .map_err(|_| AppError::ConfigError("NEWSAPI_KEY must be set".to_string()))?;
        if let Ok(val) = std::env::var("NEWSAPI_BASE_URL") {
            config.newsapi_base_url = val;
        }

        if let Ok(val) = std::env::var("SMTP_HOST") {
            config.smtp_server = val;
        }
        if let Some(val) = parse_var("SMTP_PORT")? {
            config.smtp_port = val;
        }
        if let Ok(val) = std::env::var("SMTP_STARTTLS") {
            config.smtp_starttls = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("SMTP_USERNAME") {
            config.smtp_username = val;
        }
        if let Ok(val) = std::env::var("SMTP_PASSWORD") {
            config.smtp_password = val;
        }
        if let Ok(val) = std::env::var("SMTP_MAIL_FROM") {
            config.mail_from = val;
        }
        if let Ok(val) = std::env::var("SMTP_MAIL_FROM_NAME") {
            config.mail_from_name = val;
        }

        if let Ok(val) = std::env::var("JWT_AUTH_REFRESH_COOKIE") {
            config.refresh_cookie_name = val;
        }
        if let Ok(val) = std::env::var("JWT_AUTH_COOKIE_DOMAIN") {
            config.refresh_cookie_domain = Some(val);
        }
        if let Ok(val) = std::env::var("JWT_AUTH_REFRESH_COOKIE_PATH") {
            config.refresh_cookie_path = val;
        }
        if let Ok(val) = std::env::var("JWT_AUTH_COOKIE_SECURE") {
            config.refresh_cookie_secure = val.parse().unwrap_or(config.refresh_cookie_secure);
        }
        if let Ok(val) = std::env::var("JWT_AUTH_COOKIE_SAMESITE") {
            config.refresh_cookie_same_site = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the OTP generator, the sweeper or the cache cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if !OTP_LENGTH_RANGE.contains(&self.otp_length) {
            return Err(AppError::ConfigError(format!(
                "Invalid OTP_LENGTH: must be between {} and {}",
                OTP_LENGTH_RANGE.start(),
                OTP_LENGTH_RANGE.end()
            )));
        }
        let positive = [
            ("OTP_EXPIRY_SECONDS", self.otp_expiry_seconds),
            ("OTP_SWEEP_INTERVAL_SECONDS", self.otp_sweep_interval_seconds),
            ("CACHE_DEFAULT_TTL_SECONDS", self.cache_default_ttl_seconds),
            ("CACHE_WEATHER_TTL_SECONDS", self.cache_weather_ttl_seconds),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::ConfigError(format!(
                    "Invalid {}: must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}
