use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod access;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod workflow;

// Module for routing segregation (Public, Authenticated, Admin, Secretariat).
pub mod routes;
use auth::AuthAccount; // The resolved authenticated account identity.
use routes::{admin, authenticated, public, secretariat};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry
// point (main.rs) and to the integration tests.
pub use bootstrap::BootstrapGuard;
pub use config::AppConfig;
pub use error::{ApiError, Result};
pub use repository::{PostgresRepository, Repository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation (Swagger JSON) for the
/// application by aggregating every handler decorated with `#[utoipa::path]`
/// and every schema decorated with `#[derive(utoipa::ToSchema)]`.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::admin_login,
        handlers::bootstrap_status, handlers::create_first_admin,
        handlers::get_me, handlers::get_account,
        handlers::list_courses, handlers::create_course,
        handlers::admin_stats, handlers::list_teacher_requests,
        handlers::decide_teacher_validation, handlers::override_account,
        handlers::reset_accounts,
        handlers::list_enrollments, handlers::submit_enrollment,
        handlers::decide_enrollment,
    ),
    components(
        schemas(
            models::Account, models::Role, models::AccountStatus, models::ReviewStatus,
            models::RegisterRequest, models::LoginRequest, models::AdminLoginRequest,
            models::LoginResponse, models::BootstrapRequest, models::BootstrapAvailability,
            models::DecisionRequest, models::TeacherDecisionResponse,
            models::EnrollmentDecisionResponse, models::EnrollmentSubmission,
            models::AccountOverrideRequest, models::TeacherValidationRequest,
            models::StudentEnrollmentRequest, models::Course, models::CreateCourseRequest,
            models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "school-portal", description = "School administration portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe, immutable container holding all application
/// services and configuration, shared across every incoming request.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Bootstrap Guard: the one-time, rate-limited first-admin gate.
    /// Injected explicitly so each test constructs its own instance.
    pub bootstrap: Arc<BootstrapGuard>,
}

// --- Axum FromRef Extractor Implementations ---

// These allow extractors and handlers to selectively pull components from
// the shared AppState instead of receiving the whole container.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<BootstrapGuard> {
    fn from_ref(app_state: &AppState) -> Arc<BootstrapGuard> {
        app_state.bootstrap.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the `authenticated_routes`.
///
/// *Mechanism*: attempts to extract `AuthAccount` from the request. Since
/// `AuthAccount` implements `FromRequestParts`, a failed token validation or
/// account lookup rejects the request with 401 before the handler runs. The
/// account is re-read from storage on every request, so a suspension or role
/// change takes effect immediately rather than at token expiry.
async fn auth_middleware(_auth_account: AuthAccount, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and
/// scoped middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: protected by the `auth_middleware`. First
        // layer of defense; role and capability checks still run inside the
        // handlers.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: nested under '/admin'. The admin role check is
        // performed inside the handlers after the `AuthAccount` extractor
        // authenticates the request (the login endpoint is the exception).
        .nest("/admin", admin::admin_routes())
        // Secretariat Routes: nested under '/secretariat'. Handlers gate on
        // the `manage_enrollments` capability.
        .nest("/secretariat", secretariat::secretariat_routes())
        // Apply the unified state to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID generation: a unique UUID per request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request tracing: wraps the request/response lifecycle
                // in a span carrying the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS layer.
        .layer(cors)
}

/// trace_span_logger
///
/// Customizes the `TraceLayer` span so every log line for a single request
/// is correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
