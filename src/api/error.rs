//! HTTP rendering of [`RbacError`] and JSON body decoding that reports
//! malformed input in the same envelope.
//!
//! Public routes use the [`JsonBody`] extractor. Protected routes take the raw
//! `Bytes` and call [`parse_json`] after the caller is authorized, so an
//! anonymous request never learns anything from body validation.

use axum::{
    Json,
    extract::{FromRequest, Request},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::rbac::{ErrorCode, RbacError};

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

pub(crate) fn status_for(err: &RbacError) -> StatusCode {
    match err {
        RbacError::Authentication { .. } => StatusCode::UNAUTHORIZED,
        RbacError::Authorization { .. } => StatusCode::FORBIDDEN,
        RbacError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RbacError::Conflict { .. } => StatusCode::CONFLICT,
        RbacError::NotFound { .. } => StatusCode::NOT_FOUND,
        RbacError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        match &self {
            Self::Internal { code, source } => {
                error!(code = %code, "Request failed: {source:#}");
            }
            Self::Authentication { code, .. } | Self::Authorization { code, .. } => {
                warn!(code = %code, status = status.as_u16(), "Request denied");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.public_message(),
            },
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// `Json<T>` whose rejections become `VALIDATION_ERROR` responses.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RbacError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(RbacError::validation(
                ErrorCode::ValidationError,
                rejection.body_text(),
            )),
        }
    }
}

/// Decode a request body already read as bytes.
///
/// # Errors
/// `VALIDATION_ERROR` (422) if the bytes are not a valid `T`.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, RbacError> {
    serde_json::from_slice(body).map_err(|err| {
        RbacError::validation(
            ErrorCode::ValidationError,
            format!("Invalid request body: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Flag {
        is_active: bool,
    }

    #[test]
    fn parse_json_maps_errors_to_validation() {
        let flag: Result<Flag, _> = parse_json(br#"{"is_active": true}"#);
        assert!(flag.is_ok_and(|f| f.is_active));

        let bodies: [&[u8]; 3] = [b"{bad", b"", br#"{"is_active": "yes"}"#];
        for body in bodies {
            let err = parse_json::<Flag>(body).err();
            assert_eq!(err.map(|e| e.code()), Some(ErrorCode::ValidationError));
        }
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response =
            RbacError::unauthenticated(ErrorCode::NoToken, "Authorization credentials required")
                .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&RbacError::permission_required("documents_read")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&RbacError::validation(ErrorCode::WeakPassword, "weak")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&RbacError::conflict(ErrorCode::RoleAlreadyExists, "exists")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&RbacError::not_found(ErrorCode::RoleNotFound, "missing")),
            StatusCode::NOT_FOUND
        );
        let internal = RbacError::internal(anyhow::anyhow!("boom"));
        let response = internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn body_shape() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: ErrorCode::PermissionRequired,
                message: "Permission 'documents_read' required".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(json["error"]["code"], "PERMISSION_REQUIRED");
        assert_eq!(
            json["error"]["message"],
            "Permission 'documents_read' required"
        );
    }
}
