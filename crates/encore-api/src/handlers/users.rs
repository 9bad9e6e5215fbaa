//! Account administration handlers (admin only)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::auth::models::AccountView;
use crate::auth::service::{CreateAccountRequest, UpdateAccountRequest};
use crate::auth::AuthenticatedUser;
use crate::error::{ApiResponse, AppError, ErrorResponse};
use crate::state::AppState;

/// Pagination for the account listing
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page size, 1-100 (default 10)
    pub limit: Option<i64>,
    /// Rows to skip (default 0)
    pub offset: Option<i64>,
}

/// List active and suspended accounts in id order
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(ListQuery),
    responses(
        (status = 200, description = "Accounts", body = [AccountView]),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = state.auth.list_accounts(query.limit, query.offset).await?;
    Ok(ApiResponse::ok("Users retrieved", accounts))
}

/// Create an account with any role
///
/// The new account is unverified; its owner receives a verification email.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountView),
        (status = 400, description = "Invalid input, weak password or mismatch", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(admin): Extension<AuthenticatedUser>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let account = state.auth.create_account(request).await?;

    audit_log(
        &AuditEvent::AccountCreated {
            user_id: account.id,
            actor_id: admin.user_id,
            role: account.role,
        },
        &RequestMeta::from_headers(&headers),
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("User created successfully", account),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AccountView),
        (status = 404, description = "No such account", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.get_account(id).await?;
    Ok(ApiResponse::ok("User retrieved", account))
}

/// Update any field of an account, including role and status
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "Account id")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated account", body = AccountView),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse),
        (status = 409, description = "Email or username taken", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let account = state.auth.update_account(id, request).await?;

    audit_log(
        &AuditEvent::AccountUpdated {
            user_id: id,
            actor_id: admin.user_id,
        },
        &RequestMeta::from_headers(&headers),
    );

    Ok(ApiResponse::ok("User updated", account))
}

/// Soft delete: the account is marked inactive and can no longer log in
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deactivated", body = AccountView),
        (status = 404, description = "No such account", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.auth.deactivate_account(id).await?;

    audit_log(
        &AuditEvent::AccountDeactivated {
            user_id: id,
            actor_id: admin.user_id,
        },
        &RequestMeta::from_headers(&headers),
    );

    Ok(ApiResponse::ok("User deactivated", account))
}
