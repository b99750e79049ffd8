use crate::axum_api::AppState;
use crate::errors::AppError;
use crate::users::User;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// The authenticated user, inserted into request extensions by [`verify_jwt`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn verify_jwt(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::MissingToken)?;
    let user = state.auth_service.authenticate(&token).await?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
