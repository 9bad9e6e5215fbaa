//! API error handling and response envelope
//!
//! Every response body has the shape
//! `{ "success": bool, "message": str, "data"?: T, "error"?: { code, message } }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::auth::jwt::JwtError;
use crate::auth::service::AuthError;

/// Machine-readable error detail
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code, e.g. EMAIL_TAKEN
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Error envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: ApiError,
}

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn ack(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
        })
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest { code: &'static str, message: String },
    Unauthorized { code: &'static str, message: String },
    Forbidden { code: &'static str, message: String },
    NotFound(String),
    Conflict { code: &'static str, message: String },
    NotificationFailed(String),
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code: "VALIDATION_ERROR",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotificationFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Conflict { code, .. } => code,
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotificationFailed(_) => "NOTIFICATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error = match self {
            AppError::BadRequest { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Conflict { message, .. } => ApiError::new(code, message),
            AppError::NotFound(resource) => ApiError::new(code, format!("{resource} not found")),
            AppError::NotificationFailed(detail) => {
                error!(error = %detail, "Notification delivery failed");
                ApiError::new(code, "Failed to send notification email")
            }
            AppError::Internal(detail) => {
                // Details stay in the log.
                error!(error = %detail, "Internal error");
                ApiError::new(code, "Internal server error")
            }
        };

        let body = ErrorResponse {
            success: false,
            message: "Request failed".to_string(),
            error,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::PasswordMismatch => AppError::validation(message),
            AuthError::InvalidRole(_) => AppError::BadRequest {
                code: "INVALID_ROLE",
                message,
            },
            AuthError::WeakPassword(_) => AppError::BadRequest {
                code: "WEAK_PASSWORD",
                message,
            },
            AuthError::EmailTaken => AppError::Conflict {
                code: "EMAIL_TAKEN",
                message,
            },
            AuthError::UsernameTaken => AppError::Conflict {
                code: "USERNAME_TAKEN",
                message,
            },
            AuthError::InvalidCredentials => AppError::Unauthorized {
                code: "INVALID_CREDENTIALS",
                message,
            },
            AuthError::AccountInactive => AppError::Forbidden {
                code: "ACCOUNT_INACTIVE",
                message,
            },
            AuthError::EmailNotVerified => AppError::Forbidden {
                code: "EMAIL_NOT_VERIFIED",
                message,
            },
            AuthError::InvalidToken => AppError::BadRequest {
                code: "INVALID_TOKEN",
                message,
            },
            AuthError::TokenExpired => AppError::BadRequest {
                code: "TOKEN_EXPIRED",
                message,
            },
            AuthError::Jwt(jwt) => AppError::from(jwt),
            AuthError::NotFound(what) => AppError::NotFound(what),
            AuthError::NotificationFailed(detail) => AppError::NotificationFailed(detail),
            AuthError::Internal(detail) => AppError::Internal(detail),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AppError::Unauthorized {
                code: "TOKEN_EXPIRED",
                message: "Token has expired".to_string(),
            },
            JwtError::WrongType { .. } => AppError::Unauthorized {
                code: "WRONG_TOKEN_TYPE",
                message: err.to_string(),
            },
            JwtError::Invalid => AppError::Unauthorized {
                code: "INVALID_TOKEN",
                message: "Invalid token".to_string(),
            },
            JwtError::Encoding(e) => AppError::Internal(e.to_string()),
            JwtError::InvalidKey(e) => AppError::Internal(e),
            JwtError::LifetimeOutOfRange(secs) => {
                AppError::Internal(format!("token lifetime out of range: {secs}s"))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::validation(err.to_string())
    }
}
