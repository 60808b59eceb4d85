use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::AccountStatus;

/// Application result type alias.
pub type Result<T> = std::result::Result<T, ApiError>;

/// ApiError
///
/// The six-kind error taxonomy used by every workflow operation and access
/// check. Workflow operations return one of these kinds plus a human-readable
/// reason; raw storage or hashing failures are classified as `Internal` and
/// never leak driver details to callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Entity absent.
    #[error("{0}")]
    NotFound(String),

    /// Entity already decided, or a duplicate privileged account.
    #[error("{0}")]
    Conflict(String),

    /// Bad credential or key. Carries remaining-attempt telemetry for the
    /// bootstrap gate so the caller can back off.
    #[error("{message}")]
    Unauthorized {
        message: String,
        attempts_remaining: Option<u32>,
    },

    /// Authenticated but insufficient role, permission or status. `detail`
    /// surfaces context such as the required roles or the caller's current
    /// status.
    #[error("{message}")]
    Forbidden {
        message: String,
        detail: Option<serde_json::Value>,
    },

    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// Storage or hashing failure, already logged at the point of origin.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            attempts_remaining: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            detail: None,
        }
    }

    pub fn forbidden_with(message: impl Into<String>, detail: serde_json::Value) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            detail: Some(detail),
        }
    }

    /// Forbidden response for an unvalidated teacher, surfacing the current
    /// status so the caller can distinguish "not yet reviewed" from
    /// "rejected".
    pub fn teacher_not_validated(status: AccountStatus) -> Self {
        ApiError::forbidden_with(
            "teacher account is not validated",
            json!({ "status": status }),
        )
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("record not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("a record with this identity already exists".to_string())
            }
            _ => {
                tracing::error!("database error: {:?}", err);
                ApiError::Internal("database operation failed".to_string())
            }
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        tracing::error!("bcrypt error: {:?}", err);
        ApiError::Internal("password hashing failed".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({ "error": self.to_string() });
        match &self {
            ApiError::Unauthorized {
                attempts_remaining: Some(remaining),
                ..
            } => {
                body["attempts_remaining"] = json!(remaining);
            }
            ApiError::Forbidden {
                detail: Some(detail),
                ..
            } => {
                if let (Some(map), Some(extra)) = (body.as_object_mut(), detail.as_object()) {
                    for (k, v) in extra {
                        map.insert(k.clone(), v.clone());
                    }
                }
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
