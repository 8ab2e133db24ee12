//! Credential login: issues a token pair in the body and as cookies.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookies::token_cookie_headers,
    types::{LoginRequest, TokenResponse},
};
use crate::api::{AppState, error::ErrorBody, error::JsonBody, handlers::types::UserView};
use crate::rbac::{RbacError, User, accounts::TokenPair};

pub(super) const TOKEN_TYPE: &str = "bearer";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; access and refresh cookies set", body = TokenResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, RbacError> {
    let (user, pair) = state
        .accounts()
        .login(&request.email, &request.password)
        .await?;
    Ok(token_response(&state, &user, pair))
}

/// Body and cookies for a freshly issued pair.
pub(super) fn token_response(state: &AppState, user: &User, pair: TokenPair) -> impl IntoResponse {
    let headers = token_cookie_headers(state.auth(), &pair.access_token, &pair.refresh_token);
    let body = TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: pair.expires_in,
        user: UserView::from(user),
    };
    (StatusCode::OK, headers, Json(body))
}
