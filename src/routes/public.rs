use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client. These cover the identity gateway (registration, the two login
/// flows), the one-time bootstrap gate, and read-only course data.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load
        // balancer checks. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // New account creation. Teachers land in pending_validation with an
        // open review request; every other role is active immediately.
        .route("/register", post(handlers::register))
        // POST /login
        // Standard email/password login issuing a 24 hour token.
        .route("/login", post(handlers::login))
        // GET /bootstrap/status
        // Snapshot of the first-admin bootstrap gate: availability,
        // remaining attempts and any active lockout.
        .route("/bootstrap/status", get(handlers::bootstrap_status))
        // POST /bootstrap/admin
        // One-time creation of the platform's first administrator. Guarded
        // by the rate-limited bootstrap key, and by the authoritative
        // admin-count check in storage.
        .route("/bootstrap/admin", post(handlers::create_first_admin))
        // GET /courses
        // Lists the course catalog. Read-only, no visibility tiers.
        .route("/courses", get(handlers::list_courses))
}
