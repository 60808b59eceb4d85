use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Secretariat Router Module
///
/// Routes nested under `/secretariat`, covering the student enrollment
/// pipeline. Handlers gate on the `manage_enrollments` capability instead
/// of a hard role check, so both secretariat staff and admins (via the
/// `all` wildcard) can operate them.
pub fn secretariat_routes() -> Router<AppState> {
    Router::new()
        // GET /secretariat/enrollments
        // Enrollment requests still awaiting a decision.
        // POST /secretariat/enrollments
        // Opens an enrollment request for a prospective student who has no
        // account yet.
        .route(
            "/enrollments",
            get(handlers::list_enrollments).post(handlers::submit_enrollment),
        )
        // PUT /secretariat/enrollments/{id}/decision
        // Applies an approve/reject decision. Approval creates and links
        // the student account inside the same transaction; rejection
        // creates nothing.
        .route(
            "/enrollments/{id}/decision",
            put(handlers::decide_enrollment),
        )
}
