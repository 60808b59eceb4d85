use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    AppState, access,
    auth::AuthAccount,
    config::Env,
    error::{ApiError, Result},
    models::{
        Account, AccountOverrideRequest, AdminDashboardStats, AdminLoginRequest,
        BootstrapAvailability, BootstrapRequest, Course, CreateCourseRequest, DecisionRequest,
        EnrollmentDecisionResponse, EnrollmentSubmission, LoginRequest, LoginResponse,
        RegisterRequest, Role, StudentEnrollmentRequest, TeacherDecisionResponse,
        TeacherValidationRequest,
    },
    workflow,
};

// --- Public Handlers ---

/// register
///
/// [Public Route] Creates a new account with the caller-chosen role. Teacher
/// registrations come back with `status=pending_validation` and an open
/// review request; every other role is active immediately.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Account),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    let account = workflow::register_account(&state.repo, payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// login
///
/// [Public Route] Email/password login returning a 24 hour bearer token.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = workflow::login(&state.repo, &state.config, payload).await?;
    Ok(Json(response))
}

/// bootstrap_status
///
/// [Public Route] Reports the state of the first-admin bootstrap gate:
/// whether it is open, the attempts remaining, and any active lockout. A
/// spent or locked gate is still a 200; only the creation endpoint refuses.
#[utoipa::path(
    get,
    path = "/bootstrap/status",
    responses((status = 200, description = "Gate snapshot", body = BootstrapAvailability))
)]
pub async fn bootstrap_status(State(state): State<AppState>) -> Json<BootstrapAvailability> {
    Json(state.bootstrap.availability().await)
}

/// create_first_admin
///
/// [Public Route] One-time creation of the platform's first administrator,
/// protected by the rate-limited bootstrap key gate.
#[utoipa::path(
    post,
    path = "/bootstrap/admin",
    request_body = BootstrapRequest,
    responses(
        (status = 201, description = "First admin created", body = Account),
        (status = 401, description = "Bad bootstrap key"),
        (status = 403, description = "Gate spent or locked"),
        (status = 409, description = "An administrator already exists")
    )
)]
pub async fn create_first_admin(
    State(state): State<AppState>,
    Json(payload): Json<BootstrapRequest>,
) -> Result<(StatusCode, Json<Account>)> {
    let admin =
        workflow::check_and_create_first_admin(&state.repo, &state.bootstrap, payload).await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

/// list_courses
///
/// [Public Route] Lists all courses.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "Courses", body = [Course]))
)]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>> {
    Ok(Json(state.repo.list_courses().await?))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] Returns the caller's account as resolved for this
/// request (digest excluded by serialization).
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = Account))
)]
pub async fn get_me(AuthAccount(account): AuthAccount) -> Json<Account> {
    Json(account)
}

/// create_course
///
/// [Authenticated Route] Creates a course. Only admins and validated
/// teachers may create courses; an unvalidated teacher sees their current
/// status in the rejection.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 403, description = "Not a validated teacher or admin")
    )
)]
pub async fn create_course(
    AuthAccount(account): AuthAccount,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>)> {
    if !account.is_admin() {
        access::require_validated_teacher(&account)?;
    }
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }

    let course = state
        .repo
        .create_course(&payload.title, payload.description, account.id)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// get_account
///
/// [Authenticated Route] Fetches an account by id; allowed for admins or
/// the account owner.
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = Account),
        (status = 403, description = "Not admin or owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_account(
    AuthAccount(caller): AuthAccount,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>> {
    access::require_admin_or_self(&caller, id)?;
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| ApiError::not_found("account not found"))?;
    Ok(Json(account))
}

// --- Admin Handlers ---

/// admin_login
///
/// [Public Route, admin-scoped path] Triple-factor administrator login:
/// allowlisted email, shared admin key, account password.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin session opened", body = LoginResponse),
        (status = 401, description = "Failed factor")
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = workflow::admin_login(&state.repo, &state.config, payload).await?;
    Ok(Json(response))
}

/// admin_stats
///
/// [Admin Route] Live dashboard counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn admin_stats(
    AuthAccount(account): AuthAccount,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>> {
    access::require_role(&account, &[Role::Admin])?;
    Ok(Json(state.repo.admin_stats().await?))
}

/// list_teacher_requests
///
/// [Admin Route] Lists teacher validation requests awaiting review.
#[utoipa::path(
    get,
    path = "/admin/teacher-requests",
    responses((status = 200, description = "Pending requests", body = [TeacherValidationRequest]))
)]
pub async fn list_teacher_requests(
    AuthAccount(account): AuthAccount,
    State(state): State<AppState>,
) -> Result<Json<Vec<TeacherValidationRequest>>> {
    access::require_role(&account, &[Role::Admin])?;
    Ok(Json(state.repo.list_pending_teacher_requests().await?))
}

/// decide_teacher_validation
///
/// [Admin Route] Approves or rejects a pending teacher validation. The
/// account transition and the request decision commit atomically.
#[utoipa::path(
    put,
    path = "/admin/teachers/{id}/validation",
    params(("id" = i64, Path, description = "Teacher account id")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision applied", body = TeacherDecisionResponse),
        (status = 404, description = "Teacher not found"),
        (status = 409, description = "Already decided")
    )
)]
pub async fn decide_teacher_validation(
    AuthAccount(reviewer): AuthAccount,
    State(state): State<AppState>,
    Path(teacher_id): Path<i64>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<TeacherDecisionResponse>> {
    let response =
        workflow::approve_or_reject_teacher(&state.repo, &reviewer, teacher_id, payload).await?;
    Ok(Json(response))
}

/// override_account
///
/// [Admin Route] Explicit role/status override. Permissions are re-derived
/// from the resulting role; they cannot be edited directly.
#[utoipa::path(
    put,
    path = "/admin/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    request_body = AccountOverrideRequest,
    responses(
        (status = 200, description = "Updated", body = Account),
        (status = 404, description = "Not found")
    )
)]
pub async fn override_account(
    AuthAccount(caller): AuthAccount,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AccountOverrideRequest>,
) -> Result<Json<Account>> {
    access::require_role(&caller, &[Role::Admin])?;
    if payload.role.is_none() && payload.status.is_none() {
        return Err(ApiError::Validation(
            "a role or a status must be provided".to_string(),
        ));
    }
    let account = state
        .repo
        .override_account(id, payload.role, payload.status)
        .await?;
    Ok(Json(account))
}

/// reset_accounts
///
/// [Admin Route, Env::Local only] Deletes every account. Development
/// convenience; refused outright in production.
#[utoipa::path(
    post,
    path = "/admin/reset",
    responses(
        (status = 200, description = "Accounts wiped"),
        (status = 403, description = "Not available in production")
    )
)]
pub async fn reset_accounts(
    AuthAccount(caller): AuthAccount,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    access::require_role(&caller, &[Role::Admin])?;
    if state.config.env != Env::Local {
        return Err(ApiError::forbidden(
            "account reset is only available in local development",
        ));
    }
    let deleted = state.repo.reset_accounts().await?;
    Ok(Json(json!({
        "message": "all accounts deleted",
        "deleted": deleted,
    })))
}

// --- Secretariat Handlers ---

/// list_enrollments
///
/// [Secretariat Route] Lists student enrollment requests awaiting a
/// decision. Requires the `manage_enrollments` capability.
#[utoipa::path(
    get,
    path = "/secretariat/enrollments",
    responses((status = 200, description = "Pending enrollments", body = [StudentEnrollmentRequest]))
)]
pub async fn list_enrollments(
    AuthAccount(account): AuthAccount,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentEnrollmentRequest>>> {
    access::require_permission(&account, "manage_enrollments")?;
    Ok(Json(state.repo.list_pending_enrollments().await?))
}

/// submit_enrollment
///
/// [Secretariat Route] Raises a new student enrollment request for a
/// prospective student who has no account yet.
#[utoipa::path(
    post,
    path = "/secretariat/enrollments",
    request_body = EnrollmentSubmission,
    responses((status = 201, description = "Request opened", body = StudentEnrollmentRequest))
)]
pub async fn submit_enrollment(
    AuthAccount(account): AuthAccount,
    State(state): State<AppState>,
    Json(payload): Json<EnrollmentSubmission>,
) -> Result<(StatusCode, Json<StudentEnrollmentRequest>)> {
    access::require_permission(&account, "manage_enrollments")?;
    if payload.student_name.trim().is_empty() || !payload.student_email.contains('@') {
        return Err(ApiError::Validation(
            "student name and a valid email are required".to_string(),
        ));
    }
    let request = state.repo.create_enrollment_request(payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// decide_enrollment
///
/// [Secretariat Route] Approves or rejects a pending enrollment. Approval
/// creates and links the student account inside the same transaction.
#[utoipa::path(
    put,
    path = "/secretariat/enrollments/{id}/decision",
    params(("id" = i64, Path, description = "Enrollment request id")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision applied", body = EnrollmentDecisionResponse),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already decided")
    )
)]
pub async fn decide_enrollment(
    AuthAccount(processor): AuthAccount,
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<EnrollmentDecisionResponse>> {
    let response =
        workflow::process_student_enrollment(&state.repo, &processor, request_id, payload).await?;
    Ok(Json(response))
}
