//! Self-service registration.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::instrument;

use super::types::RegisterRequest;
use crate::api::{AppState, error::ErrorBody, error::JsonBody, handlers::types::UserView};
use crate::rbac::RbacError;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created with the default role", body = UserView),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 422, description = "Invalid registration input", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    state: Extension<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, RbacError> {
    let user = state.accounts().register(request.into()).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}
