//! Self-service profile endpoints for the authenticated user.
//!
//! Flow Overview:
//! 1) Resolve the principal from the bearer header or access cookie.
//! 2) Read, update or deactivate the caller's own account.

use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::auth::{cookies::cleared_cookie_headers, principal::require_auth};
use super::types::{MessageResponse, ProfileView};
use crate::api::{AppState, error::ErrorBody, error::parse_json};
use crate::rbac::{RbacError, models::ProfileUpdate};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

impl From<ProfileUpdateRequest> for ProfileUpdate {
    fn from(request: ProfileUpdateRequest) -> Self {
        Self {
            first_name: request.first_name,
            last_name: request.last_name,
            middle_name: request.middle_name,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Own profile with roles and effective permissions", body = ProfileView),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "User account is inactive", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn get_me(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_auth(&headers, &state).await?;
    Ok(Json(ProfileView::from(&principal)))
}

#[utoipa::path(
    put,
    path = "/v1/users/me",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileView),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 422, description = "Empty update or invalid name", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn update_me(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_auth(&headers, &state).await?;
    let request: ProfileUpdateRequest = parse_json(&body)?;
    let user = state
        .accounts()
        .update_profile(principal.user.id, request.into())
        .await?;
    Ok(Json(ProfileView::from(&user)))
}

#[utoipa::path(
    delete,
    path = "/v1/users/me",
    responses(
        (status = 200, description = "Account deactivated and cookies cleared", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn delete_me(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_auth(&headers, &state).await?;
    state.accounts().deactivate(principal.user.id).await?;
    Ok((
        StatusCode::OK,
        cleared_cookie_headers(state.auth()),
        Json(MessageResponse::new("Account deactivated")),
    ))
}
