//! Bearer authentication and role gating for protected routes
//!
//! `auth_middleware` validates the access token from the Authorization
//! header and stores an [`AuthenticatedUser`] in the request extensions.
//! `require_role` must run after it.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use encore_core::UserRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::jwt::{Claims, JwtError};
use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::error::AppError;
use crate::state::AppState;

/// Caller identity taken from a valid access token
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    /// Token id of the access token used
    pub jti: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
            jti: claims.jti,
        }
    }
}

/// Bearer authentication failures
#[derive(Debug, Error)]
pub enum BearerError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error(transparent)]
    InvalidToken(#[from] JwtError),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for BearerError {
    fn into_response(self) -> Response {
        let error = match self {
            BearerError::MissingAuthHeader | BearerError::InvalidAuthHeader => {
                AppError::Unauthorized {
                    code: "UNAUTHORIZED",
                    message: self.to_string(),
                }
            }
            BearerError::InvalidToken(e) => AppError::from(e),
            BearerError::InsufficientPermissions => AppError::Forbidden {
                code: "FORBIDDEN",
                message: self.to_string(),
            },
        };
        error.into_response()
    }
}

/// Require a valid access token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, BearerError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(BearerError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| BearerError::InvalidAuthHeader)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(BearerError::InvalidAuthHeader)?;

    let claims = match state.auth.jwt().validate_access(token) {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: e.to_string(),
                },
                &RequestMeta::from_headers(request.headers()),
            );
            return Err(BearerError::InvalidToken(e));
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, BearerError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Admins pass every role check.
///
/// ```ignore
/// Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn(require_role(UserRole::Admin)))
///     .route_layer(middleware::from_fn_with_state(state, auth_middleware));
/// ```
pub fn require_role(
    required: UserRole,
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let user = request
                .extensions()
                .get::<AuthenticatedUser>()
                .ok_or(BearerError::MissingAuthHeader)?
                .clone();

            if user.role != required && !user.is_admin() {
                audit_log(
                    &AuditEvent::AccessDenied {
                        user_id: user.user_id,
                        email: user.email.clone(),
                        required_role: required,
                    },
                    &RequestMeta::from_headers(request.headers()),
                );
                return Err(BearerError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use axum::http::StatusCode;

    #[test]
    fn test_authenticated_user_from_claims() {
        let claims = Claims {
            iss: "encore-api".to_string(),
            sub: "5".to_string(),
            jti: "jti-1".to_string(),
            iat: 0,
            nbf: 0,
            exp: 0,
            user_id: 5,
            email: "mod@example.com".to_string(),
            role: UserRole::Moderator,
            token_type: TokenType::Access,
        };

        let user = AuthenticatedUser::from(claims);
        assert_eq!(user.user_id, 5);
        assert_eq!(user.role, UserRole::Moderator);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_bearer_error_statuses() {
        assert_eq!(
            BearerError::MissingAuthHeader.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            BearerError::InvalidToken(JwtError::Expired)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            BearerError::InsufficientPermissions
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
    }
}
