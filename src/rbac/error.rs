//! Typed errors for the authorization domain.
//!
//! Every error carries a stable machine-readable [`ErrorCode`] next to the human
//! message. Validators build these close to the violation and services
//! propagate them untouched with `?`.

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use thiserror::Error;
use utoipa::{
    openapi::{
        schema::{ObjectBuilder, Schema, Type},
        RefOr,
    },
    PartialSchema, ToSchema,
};

use crate::store::StoreError;

/// Stable machine-readable error code. [`ErrorCode::as_str`] is the only
/// source of the wire names; serialization, `Display` and the schema use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    NoToken,
    InvalidToken,
    InvalidTokenPayload,
    UserNotFound,
    InvalidCredentials,
    UserInactive,
    PermissionRequired,
    ValidationError,
    WeakPassword,
    PasswordMismatch,
    InvalidRoleName,
    InvalidRoleAssignment,
    InvalidPermissionAssignment,
    EmailAlreadyExists,
    RoleAlreadyExists,
    RoleNotFound,
    PermissionNotFound,
    ResourceNotFound,
    DefaultRoleMissing,
    InternalError,
}

impl ErrorCode {
    pub const ALL: [Self; 20] = [
        Self::NoToken,
        Self::InvalidToken,
        Self::InvalidTokenPayload,
        Self::UserNotFound,
        Self::InvalidCredentials,
        Self::UserInactive,
        Self::PermissionRequired,
        Self::ValidationError,
        Self::WeakPassword,
        Self::PasswordMismatch,
        Self::InvalidRoleName,
        Self::InvalidRoleAssignment,
        Self::InvalidPermissionAssignment,
        Self::EmailAlreadyExists,
        Self::RoleAlreadyExists,
        Self::RoleNotFound,
        Self::PermissionNotFound,
        Self::ResourceNotFound,
        Self::DefaultRoleMissing,
        Self::InternalError,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoToken => "NO_TOKEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidTokenPayload => "INVALID_TOKEN_PAYLOAD",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UserInactive => "USER_INACTIVE",
            Self::PermissionRequired => "PERMISSION_REQUIRED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::InvalidRoleName => "INVALID_ROLE_NAME",
            Self::InvalidRoleAssignment => "INVALID_ROLE_ASSIGNMENT",
            Self::InvalidPermissionAssignment => "INVALID_PERMISSION_ASSIGNMENT",
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::RoleAlreadyExists => "ROLE_ALREADY_EXISTS",
            Self::RoleNotFound => "ROLE_NOT_FOUND",
            Self::PermissionNotFound => "PERMISSION_NOT_FOUND",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::DefaultRoleMissing => "DEFAULT_ROLE_MISSING",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl PartialSchema for ErrorCode {
    fn schema() -> RefOr<Schema> {
        ObjectBuilder::new()
            .schema_type(Type::String)
            .enum_values(Some(Self::ALL.iter().map(|code| code.as_str())))
            .into()
    }
}

impl ToSchema for ErrorCode {
    fn name() -> Cow<'static, str> {
        Cow::Borrowed("ErrorCode")
    }
}

#[derive(Debug, Error)]
pub enum RbacError {
    /// Missing, invalid or expired credentials. Maps to 401.
    #[error("{message}")]
    Authentication { code: ErrorCode, message: String },
    /// Authenticated but not allowed. Maps to 403.
    #[error("{message}")]
    Authorization { code: ErrorCode, message: String },
    /// Malformed input or a policy violation. Maps to 422.
    #[error("{message}")]
    Validation { code: ErrorCode, message: String },
    #[error("{message}")]
    Conflict { code: ErrorCode, message: String },
    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },
    /// Unexpected failure; the source is logged and never shown to callers.
    #[error("{source:#}")]
    Internal {
        code: ErrorCode,
        #[source]
        source: anyhow::Error,
    },
}

pub type RbacResult<T> = Result<T, RbacError>;

impl RbacError {
    pub fn unauthenticated(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Authentication {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Authorization {
            code,
            message: message.into(),
        }
    }

    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn permission_required(permission: &str) -> Self {
        Self::forbidden(
            ErrorCode::PermissionRequired,
            format!("Permission '{permission}' required"),
        )
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. }
            | Self::Authorization { code, .. }
            | Self::Validation { code, .. }
            | Self::Conflict { code, .. }
            | Self::NotFound { code, .. }
            | Self::Internal { code, .. } => *code,
        }
    }

    /// Message safe to hand to a client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for RbacError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unexpected(source) => Self::internal(source),
            other => Self::internal(anyhow::anyhow!(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InvalidRoleAssignment).unwrap_or_default();
        assert_eq!(json, "\"INVALID_ROLE_ASSIGNMENT\"");
        assert_eq!(ErrorCode::NoToken.as_str(), "NO_TOKEN");
    }

    #[test]
    fn wire_names_agree_everywhere() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::ALL {
            let wire = code.as_str();
            assert!(seen.insert(wire), "duplicate wire name {wire}");
            assert_eq!(serde_json::to_value(code).ok(), Some(serde_json::json!(wire)));
            assert_eq!(code.to_string(), wire);
        }

        let schema = serde_json::to_value(ErrorCode::schema()).unwrap_or_default();
        let listed = schema["enum"].as_array().map(Vec::len);
        assert_eq!(listed, Some(ErrorCode::ALL.len()));
        assert_eq!(schema["enum"][0], "NO_TOKEN");
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = RbacError::internal(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn permission_required_names_the_permission() {
        let err = RbacError::permission_required("documents_read");
        assert_eq!(err.code(), ErrorCode::PermissionRequired);
        assert_eq!(err.to_string(), "Permission 'documents_read' required");
    }
}
