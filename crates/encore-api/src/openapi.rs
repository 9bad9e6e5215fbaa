//! OpenAPI document served at `/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::models::{AccountView, TokenPair};
use crate::auth::service::{
    AuthResponse, CreateAccountRequest, ForgotPasswordRequest, LoginRequest, RefreshRequest,
    RegisterRequest, ResetPasswordRequest, RoleInfo, UpdateAccountRequest, UpdateProfileRequest,
};
use crate::error::{ApiError, ErrorResponse};
use crate::handlers::{auth, health, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Encore Accounts API",
        description = "Registration, login, email verification, password reset and account administration"
    ),
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::verify_email_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        auth::refresh_handler,
        auth::roles_handler,
        auth::profile_handler,
        auth::update_profile_handler,
        auth::logout_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::get_user_handler,
        users::update_user_handler,
        users::delete_user_handler,
        health::health_check,
        health::readiness_check,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        RefreshRequest,
        UpdateProfileRequest,
        CreateAccountRequest,
        UpdateAccountRequest,
        AuthResponse,
        AccountView,
        TokenPair,
        RoleInfo,
        auth::VerifyResponse,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        ApiError,
        ErrorResponse,
        encore_core::UserRole,
        encore_core::AccountStatus,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Authentication and self-service profile"),
        (name = "users", description = "Account administration"),
        (name = "health", description = "Probes"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_account_paths() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();

        let paths = json["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/auth/register"));
        assert!(paths.contains_key("/api/v1/users/{id}"));
        assert!(paths["/api/v1/users"]["post"].is_object());
        assert!(paths.contains_key("/ready"));
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
