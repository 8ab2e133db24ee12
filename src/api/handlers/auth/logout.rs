use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

use super::cookies::cleared_cookie_headers;
use crate::api::{AppState, handlers::types::MessageResponse};

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Token cookies cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
/// Clear both token cookies. Issued tokens stay valid until they expire.
pub async fn logout(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        cleared_cookie_headers(state.auth()),
        Json(MessageResponse::new("Successfully logged out")),
    )
}
