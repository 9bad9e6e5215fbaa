//! API route definitions

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use encore_core::UserRole;

use crate::auth::middleware::{auth_middleware, require_role};
use crate::handlers::{auth, users};
use crate::state::AppState;

/// Routes nested under `/api/v1`
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/verify", get(auth::verify_email_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/roles", get(auth::roles_handler));

    // Admin only; the role check runs after bearer authentication
    let admin_routes = Router::new()
        .route(
            "/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/users/:id",
            get(users::get_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route_layer(middleware::from_fn(require_role(UserRole::Admin)));

    let protected_routes = Router::new()
        .route(
            "/auth/profile",
            get(auth::profile_handler).put(auth::update_profile_handler),
        )
        .route("/auth/logout", post(auth::logout_handler))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
