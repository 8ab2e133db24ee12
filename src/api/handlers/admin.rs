//! Administrative endpoints over users, roles and the permission catalog.
//!
//! Flow Overview:
//! 1) Resolve the principal and require the admin permission for the route.
//! 2) Delegate to the administration service, which validates before writing.
//! 3) Render the updated entity.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::principal::require_permission;
use super::types::{PermissionView, ResourceView, RoleView, StatsView, UserView};
use crate::api::{AppState, error::ErrorBody, error::parse_json};
use crate::rbac::{ErrorCode, RbacError, RbacResult};

const USERS_MANAGE: &str = "admin_users_manage";
const ROLES_MANAGE: &str = "admin_roles_manage";
const SYSTEM_CONFIG: &str = "admin_system_config";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignRolesRequest {
    pub role_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RolePermissionsRequest {
    pub permission_names: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PermissionFilter {
    /// Only permissions for this resource type.
    pub resource_type: Option<String>,
}

fn parse_id(kind: &str, raw: &str) -> RbacResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        RbacError::validation(ErrorCode::ValidationError, format!("Invalid {kind} id"))
    })
}

#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    responses(
        (status = 200, description = "Entity counts", body = StatsView),
        (status = 403, description = "Permission 'admin_system_config' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn stats(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, SYSTEM_CONFIG).await?;
    let stats = state.admin().stats().await?;
    Ok(Json(StatsView::from(stats)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    responses(
        (status = 200, description = "All users with role names", body = [UserView]),
        (status = 403, description = "Permission 'admin_users_manage' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn list_users(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, USERS_MANAGE).await?;
    let users = state.admin().list_users().await?;
    Ok(Json(users.iter().map(UserView::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}",
    params(
        ("id" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User detail", body = UserView),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 422, description = "Invalid user id", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, USERS_MANAGE).await?;
    let user = state.admin().get_user(parse_id("user", &id)?).await?;
    Ok(Json(UserView::from(&user)))
}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}/roles",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Role set replaced", body = UserView),
        (status = 404, description = "User or role not found", body = ErrorBody),
        (status = 422, description = "Invalid role assignment", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn assign_user_roles(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, USERS_MANAGE).await?;
    let request: AssignRolesRequest = parse_json(&body)?;
    let user = state
        .admin()
        .assign_user_roles(parse_id("user", &id)?, &request.role_names)
        .await?;
    Ok(Json(UserView::from(&user)))
}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}/active",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = ActiveRequest,
    responses(
        (status = 200, description = "User active flag updated", body = UserView),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn set_user_active(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, USERS_MANAGE).await?;
    let request: ActiveRequest = parse_json(&body)?;
    let user = state
        .admin()
        .set_user_active(parse_id("user", &id)?, request.is_active)
        .await?;
    Ok(Json(UserView::from(&user)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/roles",
    responses(
        (status = 200, description = "All roles with permission names", body = [RoleView]),
        (status = 403, description = "Permission 'admin_roles_manage' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn list_roles(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let roles = state.admin().list_roles().await?;
    Ok(Json(roles.iter().map(RoleView::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/v1/admin/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleView),
        (status = 404, description = "Unknown permission", body = ErrorBody),
        (status = 409, description = "Role name taken", body = ErrorBody),
        (status = 422, description = "Invalid role", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn create_role(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let request: CreateRoleRequest = parse_json(&body)?;
    let role = state
        .admin()
        .create_role(&request.name, request.description, &request.permission_names)
        .await?;
    Ok((StatusCode::CREATED, Json(RoleView::from(&role))))
}

#[utoipa::path(
    get,
    path = "/v1/admin/roles/{id}",
    params(
        ("id" = String, Path, description = "Role id or name")
    ),
    responses(
        (status = 200, description = "Role detail", body = RoleView),
        (status = 404, description = "Role not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn get_role(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let role = state.admin().get_role(&id).await?;
    Ok(Json(RoleView::from(&role)))
}

#[utoipa::path(
    put,
    path = "/v1/admin/roles/{id}/active",
    params(
        ("id" = String, Path, description = "Role id")
    ),
    request_body = ActiveRequest,
    responses(
        (status = 200, description = "Role active flag updated", body = RoleView),
        (status = 404, description = "Role not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn set_role_active(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let request: ActiveRequest = parse_json(&body)?;
    let role = state
        .admin()
        .set_role_active(parse_id("role", &id)?, request.is_active)
        .await?;
    Ok(Json(RoleView::from(&role)))
}

#[utoipa::path(
    put,
    path = "/v1/admin/roles/{id}/permissions",
    params(
        ("id" = String, Path, description = "Role id")
    ),
    request_body = RolePermissionsRequest,
    responses(
        (status = 200, description = "Permission set replaced", body = RoleView),
        (status = 404, description = "Role or permission not found", body = ErrorBody),
        (status = 422, description = "Invalid permission assignment", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn replace_role_permissions(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let request: RolePermissionsRequest = parse_json(&body)?;
    let role = state
        .admin()
        .replace_role_permissions(parse_id("role", &id)?, &request.permission_names)
        .await?;
    Ok(Json(RoleView::from(&role)))
}

#[utoipa::path(
    post,
    path = "/v1/admin/roles/{id}/permissions",
    params(
        ("id" = String, Path, description = "Role id")
    ),
    request_body = RolePermissionsRequest,
    responses(
        (status = 200, description = "Permissions added", body = RoleView),
        (status = 404, description = "Role or permission not found", body = ErrorBody),
        (status = 422, description = "Invalid permission assignment", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn add_role_permissions(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let request: RolePermissionsRequest = parse_json(&body)?;
    let role = state
        .admin()
        .add_role_permissions(parse_id("role", &id)?, &request.permission_names)
        .await?;
    Ok(Json(RoleView::from(&role)))
}

#[utoipa::path(
    delete,
    path = "/v1/admin/roles/{id}/permissions",
    params(
        ("id" = String, Path, description = "Role id")
    ),
    request_body = RolePermissionsRequest,
    responses(
        (status = 200, description = "Permissions removed", body = RoleView),
        (status = 404, description = "Role or permission not found", body = ErrorBody),
        (status = 422, description = "Invalid permission assignment", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn remove_role_permissions(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let request: RolePermissionsRequest = parse_json(&body)?;
    let role = state
        .admin()
        .remove_role_permissions(parse_id("role", &id)?, &request.permission_names)
        .await?;
    Ok(Json(RoleView::from(&role)))
}

#[utoipa::path(
    get,
    path = "/v1/admin/permissions",
    params(PermissionFilter),
    responses(
        (status = 200, description = "Permission catalog", body = [PermissionView]),
        (status = 403, description = "Permission 'admin_roles_manage' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn list_permissions(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(filter): Query<PermissionFilter>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, ROLES_MANAGE).await?;
    let permissions = state
        .admin()
        .list_permissions(filter.resource_type.as_deref())
        .await?;
    Ok(Json(
        permissions.iter().map(PermissionView::from).collect::<Vec<_>>(),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/admin/resources",
    responses(
        (status = 200, description = "Resource catalog", body = [ResourceView]),
        (status = 403, description = "Permission 'admin_system_config' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn list_resources(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, SYSTEM_CONFIG).await?;
    let resources = state.admin().list_resources().await?;
    Ok(Json(resources.iter().map(ResourceView::from).collect::<Vec<_>>()))
}
