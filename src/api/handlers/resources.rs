//! Permission-gated demo resources.
//!
//! Each endpoint names the single canonical permission it requires; the check
//! runs before any catalog access.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::principal::{require_auth, require_permission};
use crate::api::{AppState, error::ErrorBody, error::parse_json};
use crate::catalog::{Document, PublicProfile, Report};
use crate::rbac::{
    ErrorCode, RbacError, RbacResult, models::canonical_permission_name,
    password::MIN_PASSWORD_LENGTH,
    validators::{MAX_PERMISSIONS_PER_ROLE, MAX_ROLES_PER_USER},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedDocument {
    pub message: String,
    pub deleted_document: String,
    pub deleted_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    pub name: String,
    pub report_type: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// Export format, `json` by default.
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportExport {
    pub message: String,
    pub total_reports: usize,
    pub exported_by: String,
    pub export_time: DateTime<Utc>,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfigSetting {
    pub setting_name: String,
    pub setting_value: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionCheckView {
    pub user_id: Uuid,
    pub email: String,
    pub resource_type: String,
    pub action: String,
    /// Stored name of the permission, or the canonical name when none is defined.
    pub permission: String,
    /// Whether the permission catalog defines this pair.
    pub registered: bool,
    pub has_permission: bool,
    pub user_permissions: Vec<String>,
    pub message: String,
}

fn required_text(field: &str, value: &str) -> RbacResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RbacError::validation(
            ErrorCode::ValidationError,
            format!("{field} must not be empty"),
        ));
    }
    Ok(trimmed.to_string())
}

#[utoipa::path(
    get,
    path = "/v1/resources/documents",
    responses(
        (status = 200, description = "All documents", body = [Document]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Permission 'documents_read' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn list_documents(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, "documents_read").await?;
    Ok(Json(state.catalog().documents().await))
}

#[utoipa::path(
    post,
    path = "/v1/resources/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = Document),
        (status = 403, description = "Permission 'documents_write' required", body = ErrorBody),
        (status = 422, description = "Invalid document", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn create_document(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_permission(&headers, &state, "documents_write").await?;
    let request: CreateDocumentRequest = parse_json(&body)?;
    let title = required_text("title", &request.title)?;
    let document = state
        .catalog()
        .add_document(title, request.content, request.is_public, &principal.user.email)
        .await;
    info!(document_id = document.id, user_id = %principal.user.id, "Created document");
    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    delete,
    path = "/v1/resources/documents/{id}",
    params(
        ("id" = u64, Path, description = "Document id")
    ),
    responses(
        (status = 200, description = "Document deleted", body = DeletedDocument),
        (status = 403, description = "Permission 'documents_delete' required", body = ErrorBody),
        (status = 404, description = "Document not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn delete_document(
    Path(id): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_permission(&headers, &state, "documents_delete").await?;
    let document_id = id.trim().parse::<u64>().map_err(|_| {
        RbacError::validation(ErrorCode::ValidationError, "Invalid document id")
    })?;
    let Some(document) = state.catalog().remove_document(document_id).await else {
        return Err(RbacError::not_found(
            ErrorCode::ResourceNotFound,
            "Document not found",
        ));
    };
    info!(document_id, user_id = %principal.user.id, "Deleted document");
    Ok(Json(DeletedDocument {
        message: "Document deleted successfully".to_string(),
        deleted_document: document.title,
        deleted_by: principal.user.email,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/resources/reports",
    responses(
        (status = 200, description = "All reports", body = [Report]),
        (status = 403, description = "Permission 'reports_read' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn list_reports(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, "reports_read").await?;
    Ok(Json(state.catalog().reports().await))
}

#[utoipa::path(
    post,
    path = "/v1/resources/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report created", body = Report),
        (status = 403, description = "Permission 'reports_create' required", body = ErrorBody),
        (status = 422, description = "Invalid report", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn create_report(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_permission(&headers, &state, "reports_create").await?;
    let request: CreateReportRequest = parse_json(&body)?;
    let name = required_text("name", &request.name)?;
    let report_type = required_text("report_type", &request.report_type)?;
    let data = if request.data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        request.data
    };
    let report = state
        .catalog()
        .add_report(name, report_type, data, &principal.user.email)
        .await;
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/v1/resources/reports/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "Export prepared", body = ReportExport),
        (status = 403, description = "Permission 'reports_export' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn export_reports(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_permission(&headers, &state, "reports_export").await?;
    let format = query
        .format
        .map(|f| f.trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "json".to_string());
    if !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RbacError::validation(
            ErrorCode::ValidationError,
            "Export format must be alphanumeric",
        ));
    }
    let now = Utc::now();
    Ok(Json(ReportExport {
        message: format!("Reports exported in {format} format"),
        total_reports: state.catalog().reports().await.len(),
        exported_by: principal.user.email,
        export_time: now,
        download_url: format!("/downloads/reports_{}.{format}", now.format("%Y%m%d_%H%M%S")),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/resources/profiles",
    responses(
        (status = 200, description = "Demo public profiles", body = [PublicProfile]),
        (status = 403, description = "Permission 'user_profiles_read' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn list_profiles(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, "user_profiles_read").await?;
    Ok(Json(state.catalog().profiles().await))
}

#[utoipa::path(
    get,
    path = "/v1/resources/system-config",
    responses(
        (status = 200, description = "Effective system settings", body = [ConfigSetting]),
        (status = 403, description = "Permission 'admin_system_config' required", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn system_config(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    require_permission(&headers, &state, "admin_system_config").await?;
    Ok(Json(config_settings(&state)))
}

fn config_settings(state: &AppState) -> Vec<ConfigSetting> {
    let setting = |name: &str, value: String, description: &str| ConfigSetting {
        setting_name: name.to_string(),
        setting_value: value,
        description: description.to_string(),
    };
    vec![
        setting(
            "access_token_ttl_seconds",
            state.tokens().access_ttl_seconds().to_string(),
            "Access token lifetime",
        ),
        setting(
            "refresh_token_ttl_seconds",
            state.tokens().refresh_ttl_seconds().to_string(),
            "Refresh token lifetime",
        ),
        setting(
            "password_min_length",
            MIN_PASSWORD_LENGTH.to_string(),
            "Minimum password length",
        ),
        setting(
            "max_roles_per_user",
            MAX_ROLES_PER_USER.to_string(),
            "Maximum roles assigned to one user",
        ),
        setting(
            "max_permissions_per_role",
            MAX_PERMISSIONS_PER_ROLE.to_string(),
            "Maximum permissions attached to one role",
        ),
        setting(
            "cookie_secure",
            state.auth().cookie_secure().to_string(),
            "Token cookies carry the Secure attribute",
        ),
        setting(
            "cookie_samesite",
            state.auth().same_site().to_string(),
            "SameSite attribute of token cookies",
        ),
        setting(
            "store_backend",
            state.stores().backend().to_string(),
            "Persistence backend",
        ),
    ]
}

#[utoipa::path(
    get,
    path = "/v1/resources/check/{resource_type}/{action}",
    params(
        ("resource_type" = String, Path, description = "Resource type, e.g. documents"),
        ("action" = String, Path, description = "Action, e.g. read")
    ),
    responses(
        (status = 200, description = "Permission decision for the caller", body = PermissionCheckView),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "resources"
)]
#[instrument(skip_all)]
pub async fn check_permission(
    Path((resource_type, action)): Path<(String, String)>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, RbacError> {
    let principal = require_auth(&headers, &state).await?;
    let registered = state
        .stores()
        .permissions
        .find_by_pair(&resource_type, &action)
        .await?;
    let allowed = principal.can(&resource_type, &action);
    let permission = registered.as_ref().map_or_else(
        || canonical_permission_name(&resource_type, &action),
        |p| p.name.clone(),
    );
    let message = match (registered.is_some(), allowed) {
        (false, _) => format!("Permission '{permission}' is not defined"),
        (true, true) => format!("User has permission '{permission}'"),
        (true, false) => format!("User lacks permission '{permission}'"),
    };
    Ok(Json(PermissionCheckView {
        user_id: principal.user.id,
        email: principal.user.email.clone(),
        resource_type,
        action,
        permission,
        registered: registered.is_some(),
        has_permission: allowed,
        user_permissions: principal.permissions.iter().cloned().collect(),
        message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_trims_and_rejects_blank() {
        assert_eq!(required_text("title", "  Plan ").ok(), Some("Plan".to_string()));
        let err = required_text("title", "   ").err();
        assert_eq!(err.map(|e| e.code()), Some(ErrorCode::ValidationError));
    }
}
