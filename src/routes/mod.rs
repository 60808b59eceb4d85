/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated
/// modules. Access control is applied explicitly at the module level (via
/// Axum layers) and re-checked inside handlers, so no protected endpoint is
/// exposed by accident.

/// Routes accessible without authentication: registration, login flows,
/// the bootstrap gate and public course listings.
pub mod public;

/// Routes protected by the `AuthAccount` extractor middleware.
/// Requires a valid session token.
pub mod authenticated;

/// Routes nested under `/admin`. The admin role check is performed inside
/// each handler after authentication.
pub mod admin;

/// Routes nested under `/secretariat` for the enrollment pipeline. Handlers
/// check the `manage_enrollments` capability rather than a hard role, so an
/// admin (whose `all` wildcard satisfies it) can operate the pipeline too.
pub mod secretariat;
