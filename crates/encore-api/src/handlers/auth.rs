//! Authentication API handlers
//!
//! Registration, login, email verification, password reset, token refresh
//! and the caller's own profile.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::auth::models::{AccountView, TokenPair};
use crate::auth::service::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, RoleInfo, UpdateProfileRequest, VerifiedAccount,
};
use crate::auth::AuthenticatedUser;
use crate::error::{ApiResponse, AppError, ErrorResponse};
use crate::state::AppState;

/// Query string of the verification link
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    /// Token from the verification email
    pub token: Option<String>,
}

/// Verification confirmation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub user_id: i64,
    pub email: String,
    pub email_verified: bool,
}

impl From<VerifiedAccount> for VerifyResponse {
    fn from(v: VerifiedAccount) -> Self {
        Self {
            user_id: v.user_id,
            email: v.email,
            email_verified: v.email_verified,
        }
    }
}

/// Register a new account
///
/// The account starts unverified; a verification link is emailed and a
/// token pair is returned right away.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid role, input or weak password", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::from_headers(&headers);
    let email = request.email.clone();

    if let Err(e) = request.validate() {
        audit_log(
            &AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
            },
            &meta,
        );
        return Err(e.into());
    }

    match state.auth.register(request).await {
        Ok(response) => {
            audit_log(
                &AuditEvent::RegistrationSuccess {
                    user_id: response.user.id,
                    email: response.user.email.clone(),
                    role: response.user.role,
                },
                &meta,
            );
            Ok((
                StatusCode::CREATED,
                ApiResponse::ok(
                    "Registration successful. Please check your email to verify your account.",
                    response,
                ),
            ))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::RegistrationFailure {
                    email,
                    reason: e.to_string(),
                },
                &meta,
            );
            Err(e.into())
        }
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account inactive or email not verified", body = ErrorResponse),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let meta = RequestMeta::from_headers(&headers);
    let email = request.email.clone();

    match state.auth.login(request).await {
        Ok(response) => {
            audit_log(
                &AuditEvent::LoginSuccess {
                    user_id: response.user.id,
                    email,
                },
                &meta,
            );
            Ok(ApiResponse::ok("Login successful", response))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::LoginFailure {
                    email,
                    reason: e.to_string(),
                },
                &meta,
            );
            Err(e.into())
        }
    }
}

/// Verify an email address from the emailed link
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "auth",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Email verified", body = VerifyResponse),
        (status = 400, description = "Missing, invalid or expired token", body = ErrorResponse),
    )
)]
pub async fn verify_email_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::from_headers(&headers);

    let token = match query.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            return Err(AppError::BadRequest {
                code: "MISSING_TOKEN",
                message: "Verification token is required".to_string(),
            })
        }
    };

    match state.auth.verify_email(&token).await {
        Ok(verified) => {
            audit_log(
                &AuditEvent::EmailVerified {
                    user_id: verified.user_id,
                    email: verified.email.clone(),
                },
                &meta,
            );
            Ok(ApiResponse::ok(
                "Your email has been verified. You can now log in to your account.",
                VerifyResponse::from(verified),
            ))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::EmailVerificationFailure {
                    reason: e.to_string(),
                },
                &meta,
            );
            Err(e.into())
        }
    }
}

/// Request a password reset email
///
/// Responds the same way whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists"),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 500, description = "Reset email could not be sent", body = ErrorResponse),
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    state.auth.forgot_password(&request.email).await?;

    audit_log(
        &AuditEvent::PasswordResetRequested {
            email: request.email,
        },
        &RequestMeta::from_headers(&headers),
    );

    Ok(ApiResponse::ack(
        "If an account with this email exists, you will receive a password reset link.",
    ))
}

/// Set a new password using a reset token
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired token, weak password or mismatch", body = ErrorResponse),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let meta = RequestMeta::from_headers(&headers);

    match state.auth.reset_password(request).await {
        Ok(user_id) => {
            audit_log(&AuditEvent::PasswordResetCompleted { user_id }, &meta);
            Ok(ApiResponse::ack(
                "Password has been reset successfully. You can now log in with your new password.",
            ))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::PasswordResetFailure {
                    reason: e.to_string(),
                },
                &meta,
            );
            Err(e.into())
        }
    }
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenPair),
        (status = 401, description = "Invalid, expired or wrong-type token", body = ErrorResponse),
        (status = 403, description = "Account inactive", body = ErrorResponse),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let meta = RequestMeta::from_headers(&headers);

    match state.auth.refresh(&request.refresh_token).await {
        Ok(pair) => {
            if let Ok(claims) = state.auth.jwt().validate_access(&pair.access_token) {
                audit_log(
                    &AuditEvent::TokenRefresh {
                        user_id: claims.user_id,
                    },
                    &meta,
                );
            }
            Ok(ApiResponse::ok("Token refreshed successfully", pair))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: e.to_string(),
                },
                &meta,
            );
            Err(e.into())
        }
    }
}

/// Registrable roles
#[utoipa::path(
    get,
    path = "/api/v1/auth/roles",
    tag = "auth",
    responses(
        (status = 200, description = "Role catalogue", body = [RoleInfo]),
    )
)]
pub async fn roles_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::ok("Available roles", state.auth.roles())
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Profile", body = AccountView),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.profile(user.user_id).await?;
    Ok(ApiResponse::ok("Profile retrieved", profile))
}

/// Update the current user's profile
#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    tag = "auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = AccountView),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let profile = state.auth.update_profile(user.user_id, request).await?;

    audit_log(
        &AuditEvent::AccountUpdated {
            user_id: user.user_id,
            actor_id: user.user_id,
        },
        &RequestMeta::from_headers(&headers),
    );

    Ok(ApiResponse::ok("Profile updated", profile))
}

/// Logout
///
/// Tokens are stateless; the client discards them.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    audit_log(
        &AuditEvent::Logout {
            user_id: user.user_id,
            email: user.email,
        },
        &RequestMeta::from_headers(&headers),
    );

    ApiResponse::ack("Logged out successfully")
}
