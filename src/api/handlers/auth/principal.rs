//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: pull the access token from the bearer header or the access
//! cookie, resolve it to an active user graph, then optionally check one
//! permission. Gating is purely permission based; role names carry no
//! implicit privilege.

use axum::http::HeaderMap;

use super::cookies::extract_access_token;
use crate::api::AppState;
use crate::rbac::{Principal, RbacResult};

/// Resolve the request credentials into a principal.
///
/// # Errors
/// 401 for missing or unusable credentials, 403 for an inactive user.
pub async fn require_auth(headers: &HeaderMap, state: &AppState) -> RbacResult<Principal> {
    let token = extract_access_token(headers);
    state.identity().resolve(token.as_deref()).await
}

/// [`require_auth`] plus a permission check by canonical name.
///
/// # Errors
/// As [`require_auth`], and 403 `PERMISSION_REQUIRED` on denial.
pub async fn require_permission(
    headers: &HeaderMap,
    state: &AppState,
    permission: &str,
) -> RbacResult<Principal> {
    let principal = require_auth(headers, state).await?;
    principal.require(permission)?;
    Ok(principal)
}
