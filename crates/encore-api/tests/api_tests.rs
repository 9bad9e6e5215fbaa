//! API integration tests
//!
//! Drive the full router against in-memory stores and a recording notifier.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use encore_api::auth::models::EphemeralTokenKind;
use encore_api::notify::NotificationKind;
use encore_api::testing::TestContext;
use serde_json::{json, Value};
use tower::ServiceExt;

const PASSWORD: &str = "Passw0rd";

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn create_authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> Request<Body> {
    let mut request = create_json_request(method, uri, body);
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn registration(email: &str, username: &str, role: &str) -> Value {
    json!({
        "email": email,
        "username": username,
        "first_name": "Alice",
        "last_name": "Liddell",
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "role": role
    })
}

async fn register(ctx: &TestContext, email: &str, username: &str) -> Value {
    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(registration(email, username, "fan")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

/// Register, verify and log in; returns the login payload
async fn verified_login(ctx: &TestContext, email: &str, username: &str) -> Value {
    register(ctx, email, username).await;
    let token = ctx
        .notifier
        .last_token(NotificationKind::Verification, email)
        .unwrap();

    let (status, _) = send(
        ctx.router(),
        create_json_request("GET", &format!("/api/v1/auth/verify?token={token}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json
}

async fn admin_token(ctx: &TestContext) -> String {
    ctx.seed_admin("root@example.com", "root", PASSWORD)
        .await
        .unwrap();

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "root@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["data"]["access_token"].as_str().unwrap().to_string()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let (status, json) = send(ctx.router(), create_json_request("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let ctx = TestContext::new();

    let (status, json) = send(ctx.router(), create_json_request("GET", "/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);

    ctx.state.set_ready(false);
    let (status, json) = send(ctx.router(), create_json_request("GET", "/ready", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
}

#[tokio::test]
async fn test_openapi_document() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", "/api-docs/openapi.json", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
}

// =============================================================================
// Registration and Verification Tests
// =============================================================================

#[tokio::test]
async fn test_full_account_lifecycle() {
    let ctx = TestContext::new();

    let json = register(&ctx, "alice@example.com", "alice").await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["email_verified"], false);
    assert_eq!(json["data"]["token_type"], "Bearer");
    assert!(json["data"]["user"].get("password_hash").is_none());

    // Unverified accounts cannot log in
    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "alice@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "EMAIL_NOT_VERIFIED");

    let token = ctx
        .notifier
        .last_token(NotificationKind::Verification, "alice@example.com")
        .unwrap();
    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", &format!("/api/v1/auth/verify?token={token}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email_verified"], true);
    assert_eq!(ctx.notifier.sent_of(NotificationKind::Welcome).len(), 1);

    // The verification token is single use
    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", &format!("/api/v1/auth/verify?token={token}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_TOKEN");

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "alice@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = json["data"]["access_token"].as_str().unwrap().to_string();

    let (status, json) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/auth/profile", &access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["email_verified"], true);
    assert!(json["data"]["last_login_at"].is_string());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    register(&ctx, "dup@example.com", "dup").await;

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(registration("dup@example.com", "someone-else", "fan")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "EMAIL_TAKEN");

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(registration("other@example.com", "dup", "fan")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "USERNAME_TAKEN");

    assert_eq!(ctx.accounts.all().await.len(), 1);
}

#[tokio::test]
async fn test_register_rejects_legacy_role() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(registration("buyer@example.com", "buyer", "buyer")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_ROLE");
    assert!(ctx.accounts.all().await.is_empty());
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let ctx = TestContext::new();
    let mut body = registration("weak@example.com", "weak", "artist");
    body["password"] = json!("password");
    body["confirm_password"] = json!("password");

    let (status, json) = send(
        ctx.router(),
        create_json_request("POST", "/api/v1/auth/register", Some(body)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "WEAK_PASSWORD");
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/register",
            Some(registration("not-an-email", "invalid", "fan")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_verify_without_token() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", "/api/v1/auth/verify", None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn test_roles_catalogue() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", "/api/v1/auth/roles", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let values: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, vec!["producer", "artist", "fan", "moderator", "admin"]);
}

// =============================================================================
// Password Reset Tests
// =============================================================================

#[tokio::test]
async fn test_forgot_password_unknown_email_is_silent() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/forgot-password",
            Some(json!({ "email": "ghost@example.com" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(ctx.tokens.count(EphemeralTokenKind::PasswordReset).await, 0);
    assert!(ctx.notifier.sent_of(NotificationKind::PasswordReset).is_empty());
}

#[tokio::test]
async fn test_password_reset_flow() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "reset@example.com", "resetter").await;
    let user_id = login["data"]["user"]["id"].as_i64().unwrap();

    let (status, _) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/forgot-password",
            Some(json!({ "email": "reset@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let issued = ctx
        .tokens
        .tokens_for(EphemeralTokenKind::PasswordReset, user_id)
        .await;
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].expires_at - issued[0].created_at, Duration::hours(1));

    let token = ctx
        .notifier
        .last_token(NotificationKind::PasswordReset, "reset@example.com")
        .unwrap();
    let new_password = "N3wSecretValue";

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/reset-password",
            Some(json!({
                "token": token,
                "new_password": new_password,
                "confirm_password": new_password
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "reset@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");

    let (status, _) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "reset@example.com", "password": new_password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_reset_token() {
    let ctx = TestContext::new();
    verified_login(&ctx, "late@example.com", "late").await;

    send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/forgot-password",
            Some(json!({ "email": "late@example.com" })),
        ),
    )
    .await;
    let token = ctx
        .notifier
        .last_token(NotificationKind::PasswordReset, "late@example.com")
        .unwrap();

    ctx.clock.advance(Duration::hours(2));

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/reset-password",
            Some(json!({
                "token": token,
                "new_password": "N3wSecretValue",
                "confirm_password": "N3wSecretValue"
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_forgot_password_reports_delivery_failure() {
    let ctx = TestContext::new();
    verified_login(&ctx, "mailfail@example.com", "mailfail").await;
    ctx.notifier
        .set_failing(NotificationKind::PasswordReset, true);

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/forgot-password",
            Some(json!({ "email": "mailfail@example.com" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "NOTIFICATION_FAILED");
}

// =============================================================================
// Token Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "refresh@example.com", "refresher").await;
    let refresh = login["data"]["refresh_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["refresh_token"], refresh);
    let access = json["data"]["access_token"].as_str().unwrap();

    let (status, _) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/auth/profile", access, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_token_types_are_not_interchangeable() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "types@example.com", "types").await;
    let access = login["data"]["access_token"].as_str().unwrap();
    let refresh = login["data"]["refresh_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/auth/profile", refresh, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "WRONG_TOKEN_TYPE");

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": access })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "WRONG_TOKEN_TYPE");
}

#[tokio::test]
async fn test_protected_route_requires_bearer() {
    let ctx = TestContext::new();

    let (status, json) = send(
        ctx.router(),
        create_json_request("GET", "/api/v1/auth/profile", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, json) = send(
        ctx.router(),
        create_authed_request("POST", "/api/v1/auth/logout", "not-a-jwt", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_logout_acknowledges() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "bye@example.com", "bye").await;
    let access = login["data"]["access_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request("POST", "/api/v1/auth/logout", access, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json.get("data").is_none());
}

// =============================================================================
// Profile Tests
// =============================================================================

#[tokio::test]
async fn test_profile_update() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "profile@example.com", "profiler").await;
    let access = login["data"]["access_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "PUT",
            "/api/v1/auth/profile",
            access,
            Some(json!({ "first_name": "Alicia", "role": "producer" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["first_name"], "Alicia");
    assert_eq!(json["data"]["last_name"], "Liddell");
    assert_eq!(json["data"]["role"], "producer");

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "PUT",
            "/api/v1/auth/profile",
            access,
            Some(json!({ "role": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_ROLE");
}

#[tokio::test]
async fn test_profile_update_conflict() {
    let ctx = TestContext::new();
    register(&ctx, "taken@example.com", "taken").await;
    let login = verified_login(&ctx, "mover@example.com", "mover").await;
    let access = login["data"]["access_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "PUT",
            "/api/v1/auth/profile",
            access,
            Some(json!({ "username": "taken" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "USERNAME_TAKEN");
}

// =============================================================================
// Administration Tests
// =============================================================================

#[tokio::test]
async fn test_users_routes_require_admin() {
    let ctx = TestContext::new();
    let login = verified_login(&ctx, "fan@example.com", "fan").await;
    let access = login["data"]["access_token"].as_str().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/users", access, None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_lists_and_updates_accounts() {
    let ctx = TestContext::new();
    let token = admin_token(&ctx).await;
    let created = register(&ctx, "member@example.com", "member").await;
    let member_id = created["data"]["user"]["id"].as_i64().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/users?limit=500", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "PUT",
            &format!("/api/v1/users/{member_id}"),
            &token,
            Some(json!({ "role": "moderator", "status": "suspended" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["role"], "moderator");
    assert_eq!(json["data"]["status"], "suspended");

    let (status, _) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/users/9999", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_creates_account() {
    let ctx = TestContext::new();
    let token = admin_token(&ctx).await;

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "POST",
            "/api/v1/users",
            &token,
            Some(json!({
                "email": "legacy@example.com",
                "username": "legacy",
                "first_name": "Lee",
                "last_name": "Gacy",
                "password": PASSWORD,
                "confirm_password": PASSWORD,
                "role": "buyer"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["role"], "buyer");
    assert_eq!(json["data"]["email_verified"], false);
    assert!(json["data"].get("password_hash").is_none());
    assert!(json["data"].get("access_token").is_none());

    let stored = ctx.accounts.all().await;
    let created = stored
        .iter()
        .find(|a| a.email == "legacy@example.com")
        .unwrap();
    assert!(created.password_hash.starts_with("$argon2id$"));
    assert!(ctx
        .notifier
        .last_token(NotificationKind::Verification, "legacy@example.com")
        .is_some());
}

#[tokio::test]
async fn test_admin_create_conflicts_and_permissions() {
    let ctx = TestContext::new();
    let token = admin_token(&ctx).await;
    let member = verified_login(&ctx, "member@example.com", "member").await;
    let member_access = member["data"]["access_token"].as_str().unwrap();

    let body = json!({
        "email": "member@example.com",
        "username": "someone",
        "first_name": "Some",
        "last_name": "One",
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "role": "fan"
    });

    let (status, json) = send(
        ctx.router(),
        create_authed_request("POST", "/api/v1/users", &token, Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "EMAIL_TAKEN");

    let mut taken_username = body.clone();
    taken_username["email"] = json!("fresh@example.com");
    taken_username["username"] = json!("member");
    let (status, json) = send(
        ctx.router(),
        create_authed_request("POST", "/api/v1/users", &token, Some(taken_username)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "USERNAME_TAKEN");

    // Non-admins are turned away before the body is looked at
    let (status, _) = send(
        ctx.router(),
        create_authed_request("POST", "/api/v1/users", member_access, Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.accounts.all().await.len(), 2);
}

#[tokio::test]
async fn test_admin_soft_delete() {
    let ctx = TestContext::new();
    let token = admin_token(&ctx).await;
    let login = verified_login(&ctx, "leaving@example.com", "leaving").await;
    let member_id = login["data"]["user"]["id"].as_i64().unwrap();

    let (status, json) = send(
        ctx.router(),
        create_authed_request(
            "DELETE",
            &format!("/api/v1/users/{member_id}"),
            &token,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "inactive");

    // Row is kept but hidden from the listing and barred from login
    assert_eq!(ctx.accounts.all().await.len(), 2);

    let (status, json) = send(
        ctx.router(),
        create_authed_request("GET", "/api/v1/users", &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": "leaving@example.com", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "ACCOUNT_INACTIVE");

    let refresh = login["data"]["refresh_token"].as_str().unwrap();
    let (status, json) = send(
        ctx.router(),
        create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "ACCOUNT_INACTIVE");
}
