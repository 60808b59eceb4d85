use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Routes nested under `/admin`. Apart from the login endpoint, these are
/// reachable only through the authentication layer, and each handler
/// additionally requires the admin role before doing any work.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/login
        // Triple-factor administrator login (allowlisted email, shared
        // admin key, account password). Unauthenticated by necessity, but
        // scoped under the admin prefix.
        .route("/login", post(handlers::admin_login))
        // GET /admin/stats
        // Live dashboard counters (accounts, validations, enrollments,
        // courses), computed from storage on every call.
        .route("/stats", get(handlers::admin_stats))
        // GET /admin/teacher-requests
        // Teacher validation requests still awaiting review.
        .route("/teacher-requests", get(handlers::list_teacher_requests))
        // PUT /admin/teachers/{id}/validation
        // Applies an approve/reject decision to a pending teacher. The
        // account transition and the request record commit atomically; a
        // second decision observes 409.
        .route(
            "/teachers/{id}/validation",
            put(handlers::decide_teacher_validation),
        )
        // PUT /admin/accounts/{id}
        // Explicit role/status override. Permissions are re-derived from
        // the resulting role and cannot be edited directly.
        .route("/accounts/{id}", put(handlers::override_account))
        // POST /admin/reset
        // Wipes every account. Local development only; refused in
        // production regardless of role.
        .route("/reset", post(handlers::reset_accounts))
}
