//! Validation Workflow Engine.
//!
//! Orchestrates every mutation of account lifecycle state: registration,
//! teacher validation decisions, student enrollment decisions, login flows
//! and the one-time first-admin bootstrap. Handlers call each operation
//! exactly once per request; all multi-row writes delegate to the
//! repository's transactional operations so they commit together or not at
//! all.

use crate::{
    access,
    auth::{self, ADMIN_SESSION, ADMIN_TOKEN_TTL_HOURS, TOKEN_TTL_HOURS},
    bootstrap::BootstrapGuard,
    config::AppConfig,
    error::{ApiError, Result},
    models::{
        Account, AdminLoginRequest, BootstrapRequest, DecisionRequest,
        EnrollmentDecisionResponse, LoginRequest, LoginResponse, NewAccount, RegisterRequest,
        Role, TeacherDecisionResponse,
    },
    repository::RepositoryState,
};
use subtle::ConstantTimeEq;

/// Temporary credential assigned to student accounts created through
/// enrollment approval. Students are expected to change it on first login.
// TODO: replace with a generated one-time credential delivered out-of-band
// once the delivery channel is decided.
const STUDENT_TEMP_PASSWORD: &str = "ChangeMe2024!";

const MIN_PASSWORD_LEN: usize = 6;
const MIN_BOOTSTRAP_PASSWORD_LEN: usize = 8;

fn validate_identity(name: &str, email: &str, password: &str, min_password: usize) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".to_string()));
    }
    if password.len() < min_password {
        return Err(ApiError::Validation(format!(
            "password must be at least {min_password} characters"
        )));
    }
    Ok(())
}

/// register_account
///
/// Public registration. The caller chooses the role; the status and
/// permission set are derived from it (teachers start pending validation,
/// with their review request opened in the same transaction).
pub async fn register_account(repo: &RepositoryState, req: RegisterRequest) -> Result<Account> {
    validate_identity(&req.name, &req.email, &req.password, MIN_PASSWORD_LEN)?;

    let password_hash = auth::hash_password(&req.password)?;
    let mut new = NewAccount::from_role(req.name, req.email, password_hash, req.role);
    new.department = req.department;
    new.specialization = req.specialization;
    new.experience = req.experience;
    new.documents = req.documents;

    let account = repo.create_account(new).await?;
    tracing::info!(account_id = account.id, role = %account.role, "account registered");
    Ok(account)
}

/// login
///
/// Standard email/password login issuing a 24 hour token carrying the
/// account id, email and role.
pub async fn login(repo: &RepositoryState, config: &AppConfig, req: LoginRequest) -> Result<LoginResponse> {
    let account = repo
        .get_account_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;

    if !auth::verify_password(&account.password_hash, &req.password) {
        return Err(ApiError::unauthorized("invalid email or password"));
    }

    let (token, expires_at) =
        auth::issue_token(&account, &config.jwt_secret, TOKEN_TTL_HOURS, None)?;
    Ok(LoginResponse {
        token,
        account,
        expires_at,
    })
}

/// admin_login
///
/// Triple-factor administrator authentication: the email must appear in the
/// configured allowlist, the shared admin key must match, and the account
/// password must verify. The account must actually hold the admin role.
/// Issues a short-lived `admin_session` token.
pub async fn admin_login(
    repo: &RepositoryState,
    config: &AppConfig,
    req: AdminLoginRequest,
) -> Result<LoginResponse> {
    if !config.admin_emails.iter().any(|e| e == &req.email) {
        return Err(ApiError::unauthorized(
            "email not authorized for administrator access",
        ));
    }

    if !bool::from(
        req.admin_key
            .as_bytes()
            .ct_eq(config.admin_key.as_bytes()),
    ) {
        return Err(ApiError::unauthorized("invalid administrator key"));
    }

    let account = repo
        .get_account_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    if !auth::verify_password(&account.password_hash, &req.password) {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    if account.role != Role::Admin {
        return Err(ApiError::unauthorized("administrator privileges required"));
    }

    let (token, expires_at) = auth::issue_token(
        &account,
        &config.jwt_secret,
        ADMIN_TOKEN_TTL_HOURS,
        Some(ADMIN_SESSION),
    )?;
    tracing::info!(account_id = account.id, "admin session opened");
    Ok(LoginResponse {
        token,
        account,
        expires_at,
    })
}

/// approve_or_reject_teacher
///
/// Applies an admin's validation decision to a teacher account and its
/// pending review request as one atomic unit. Approval moves the account to
/// `validated`, records the reviewer and timestamp, and replaces the
/// permission set with the teacher defaults; rejection moves it to
/// `suspended`. A second decision on the same teacher observes `Conflict`.
pub async fn approve_or_reject_teacher(
    repo: &RepositoryState,
    reviewer: &Account,
    teacher_id: i64,
    decision: DecisionRequest,
) -> Result<TeacherDecisionResponse> {
    access::require_role(reviewer, &[Role::Admin])?;

    let account = repo
        .decide_teacher_validation(teacher_id, decision.approve, reviewer.id, &decision.comments)
        .await?;

    let message = if decision.approve {
        "teacher account validated successfully"
    } else {
        "teacher validation rejected"
    };
    tracing::info!(
        teacher_id,
        reviewer_id = reviewer.id,
        approved = decision.approve,
        "teacher validation decided"
    );
    Ok(TeacherDecisionResponse {
        message: message.to_string(),
        account,
    })
}

/// process_student_enrollment
///
/// Decides a pending student enrollment request. On approval a new active
/// student account is created from the request's captured identity and
/// linked back to the request, all inside one transaction; on rejection no
/// account is created. Requires the `manage_enrollments` capability.
pub async fn process_student_enrollment(
    repo: &RepositoryState,
    processor: &Account,
    request_id: i64,
    decision: DecisionRequest,
) -> Result<EnrollmentDecisionResponse> {
    access::require_permission(processor, "manage_enrollments")?;

    // The digest is only needed on approval; skip the hashing cost otherwise.
    let password_hash = if decision.approve {
        auth::hash_password(STUDENT_TEMP_PASSWORD)?
    } else {
        String::new()
    };

    let request = repo
        .decide_enrollment(
            request_id,
            decision.approve,
            processor.id,
            &decision.comments,
            &password_hash,
        )
        .await?;

    let message = if decision.approve {
        "enrollment approved and student account created"
    } else {
        "enrollment request rejected"
    };
    tracing::info!(
        request_id,
        processor_id = processor.id,
        approved = decision.approve,
        "enrollment decided"
    );
    Ok(EnrollmentDecisionResponse {
        message: message.to_string(),
        request,
    })
}

/// check_and_create_first_admin
///
/// The bootstrap gate. Holds the guard's lock across the availability check,
/// key verification, admin-count query and account insert so two racing
/// requests cannot both create a "first" admin. The authoritative check is
/// the admin count in storage: even if the in-memory flag was reset by a
/// process restart, an existing admin fails the operation with `Conflict`.
pub async fn check_and_create_first_admin(
    repo: &RepositoryState,
    guard: &BootstrapGuard,
    req: BootstrapRequest,
) -> Result<Account> {
    validate_identity(&req.name, &req.email, &req.password, MIN_BOOTSTRAP_PASSWORD_LEN)?;

    let mut state = guard.begin().await;
    guard.ensure_available(&mut state)?;
    guard.check_key(&mut state, &req.bootstrap_key)?;

    if repo.count_accounts_by_role(Role::Admin).await? > 0 {
        return Err(ApiError::conflict("an administrator already exists"));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let admin = repo
        .create_account(NewAccount::from_role(
            req.name,
            req.email,
            password_hash,
            Role::Admin,
        ))
        .await?;

    guard.consume(&mut state);
    tracing::info!(account_id = admin.id, "first administrator created, bootstrap disabled");
    Ok(admin)
}
