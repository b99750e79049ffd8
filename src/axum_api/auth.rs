use crate::axum_api::{
    clear_refresh_cookie, client_ip, refresh_cookie_value, set_refresh_cookie, ApiResponse,
    AppState,
};
use crate::errors::AppError;
use crate::users::User;
use crate::validation::{is_plain_name, is_valid_email, FieldErrors};
use axum::{
    extract::{ConnectInfo, Extension, Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl SendOtpRequest {
    fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim();
        let mut errors = FieldErrors::new();
        errors
            .check("name", !name.is_empty(), "Username is required")
            .check(
                "name",
                is_plain_name(name),
                "No special character allowed in Username",
            )
            .check("email", is_valid_email(self.email.trim()), "Valid email required");
        errors.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub otp: String,
}

impl VerifyOtpRequest {
    /// `otp_length` is the configured code length, so issued codes always pass.
    fn validate(&self, otp_length: usize) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check("name", !self.name.trim().is_empty(), "Username is required")
            .check("email", is_valid_email(self.email.trim()), "Valid email required")
            .check("otp", self.otp.chars().count() == otp_length, "Invalid value");
        errors.finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

pub async fn send_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    Json(payload): Json<SendOtpRequest>,
) -> Result<ApiResponse<()>, AppError> {
    payload.validate()?;

    let ip = client_ip(&headers, peer.map(|Extension(ConnectInfo(addr))| addr));
    state
        .auth_service
        .send_otp(&payload.email, &payload.name, ip.as_deref())
        .await?;

    Ok(ApiResponse::message("OTP sent to email successfully"))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    payload.validate(state.config.otp_length)?;

    let session = state
        .auth_service
        .verify_otp(&payload.email, &payload.name, &payload.otp)
        .await?;
    set_refresh_cookie(&cookies, &session.refresh_token, &state.config);

    Ok(ApiResponse::ok(LoginResponse {
        user: session.user,
        access_token: session.access_token,
    })
    .with_message("Login successful"))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<ApiResponse<RefreshResponse>, AppError> {
    let presented =
        refresh_cookie_value(&cookies, &state.config).ok_or(AppError::MissingRefreshToken)?;

    let (access_token, replacement) = state.auth_service.refresh(&presented).await?;
    set_refresh_cookie(&cookies, &replacement, &state.config);

    Ok(ApiResponse::ok(RefreshResponse { access_token })
        .with_message("Token refreshed successfully"))
}

pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<ApiResponse<()>, AppError> {
    let presented = refresh_cookie_value(&cookies, &state.config);
    state.auth_service.logout(presented.as_deref()).await?;
    clear_refresh_cookie(&cookies, &state.config);

    Ok(ApiResponse::message("Logout successful"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
}
