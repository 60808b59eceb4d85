use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any account that has passed the
/// authentication layer. Every handler here relies on the `AuthAccount`
/// extractor middleware on the router layer above this module, so each
/// receives a freshly resolved account whose role, status and permissions
/// reflect storage at request time (a suspension takes effect on the very
/// next request, not at token expiry).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's account as resolved for this request.
        .route("/me", get(handlers::get_me))
        // GET /accounts/{id}
        // Account lookup, permitted for admins or the account owner.
        .route("/accounts/{id}", get(handlers::get_account))
        // POST /courses
        // Course creation, restricted to admins and validated teachers.
        // An unvalidated teacher's rejection names their current status.
        .route("/courses", post(handlers::create_course))
}
