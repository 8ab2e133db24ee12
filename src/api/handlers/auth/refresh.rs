//! Refresh token exchange.
//!
//! The refresh token is read from the JSON body when present, otherwise from
//! the refresh cookie. A valid exchange rotates both cookies.

use axum::{body::Bytes, extract::Extension, http::HeaderMap, response::IntoResponse};
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookies::{REFRESH_COOKIE_NAME, extract_cookie},
    login::token_response,
    types::{RefreshRequest, TokenResponse},
};
use crate::api::{AppState, error::ErrorBody};
use crate::rbac::{ErrorCode, RbacError};

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body(content = RefreshRequest, description = "Optional when the refresh cookie is sent"),
    responses(
        (status = 200, description = "New token pair issued", body = TokenResponse),
        (status = 401, description = "Missing, invalid or expired refresh token", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    let request = parse_body(&body)?;
    let token = request
        .refresh_token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| extract_cookie(&headers, REFRESH_COOKIE_NAME));

    let (user, pair) = state.accounts().refresh(token.as_deref()).await?;
    Ok(token_response(&state, &user, pair))
}

fn parse_body(body: &[u8]) -> Result<RefreshRequest, RbacError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RefreshRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        RbacError::validation(
            ErrorCode::ValidationError,
            format!("Invalid refresh request body: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_falls_back_to_cookie() {
        let parsed = parse_body(b"  ").ok();
        assert!(parsed.is_some_and(|r| r.refresh_token.is_none()));
    }

    #[test]
    fn body_token_is_read() {
        let parsed = parse_body(br#"{"refresh_token":"abc"}"#).ok();
        assert_eq!(
            parsed.and_then(|r| r.refresh_token),
            Some("abc".to_string())
        );
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let err = parse_body(b"{not json").err();
        assert_eq!(err.map(|e| e.code()), Some(ErrorCode::ValidationError));
    }
}
