use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Role & Status Enumerations ---

/// Role
///
/// The RBAC field of an account. Exactly one role per account, immutable after
/// creation except through the admin override operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Admin,
    Secretariat,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Secretariat => "secretariat",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AccountStatus
///
/// Lifecycle stage of an account. Transitions are driven only by the
/// validation workflow or an explicit admin override, never by the subject
/// account itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum AccountStatus {
    Active,
    PendingValidation,
    Validated,
    Suspended,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::PendingValidation => "pending_validation",
            AccountStatus::Validated => "validated",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ReviewStatus
///
/// Decision state shared by teacher validation requests and student
/// enrollment requests. A request is terminated (approved/rejected) exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum ReviewStatus {
    PendingReview,
    Approved,
    Rejected,
}

// --- Permission Catalog ---

/// default_permissions
///
/// Pure mapping from role to the default capability set. The wildcard `"all"`
/// matches any requested capability. Called every time a role or validation
/// status changes, replacing (not merging into) the existing set.
pub fn default_permissions(role: Role) -> Vec<String> {
    let perms: &[&str] = match role {
        Role::Admin => &["all"],
        Role::Secretariat => &[
            "manage_students",
            "manage_enrollments",
            "view_reports",
            "manage_schedules",
        ],
        Role::Teacher => &["manage_courses", "view_students", "manage_grades"],
        Role::Student => &["view_courses", "submit_assignments"],
    };
    perms.iter().map(|p| p.to_string()).collect()
}

/// initial_status
///
/// Status assigned at registration: teachers start pending validation and
/// must pass a review before any teaching capability is usable; every other
/// role is active immediately.
pub fn initial_status(role: Role) -> AccountStatus {
    match role {
        Role::Teacher => AccountStatus::PendingValidation,
        _ => AccountStatus::Active,
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Account
///
/// Canonical user record from the `accounts` table, including the role,
/// lifecycle status and capability set consulted on every protected request.
/// The password digest is never serialized outward.
#[derive(Debug, Clone, Serialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,

    /// Bcrypt digest. Excluded from every response body.
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,

    pub role: Role,
    pub status: AccountStatus,
    /// Capability strings; always equal to `default_permissions(role)` right
    /// after any role or validation change.
    pub permissions: Vec<String>,

    // Teacher-only attributes.
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    pub documents: Vec<String>,
    pub validated_by: Option<i64>,
    #[ts(type = "string | null")]
    pub validated_at: Option<DateTime<Utc>>,

    // Student-only attributes.
    pub student_ref: Option<String>,
    pub class_name: Option<String>,
    pub parent_contact: Option<String>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// True if the account holds the capability, either directly or through
    /// the `"all"` wildcard.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == "all" || p == permission)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_secretariat(&self) -> bool {
        self.role == Role::Secretariat
    }

    /// The only combination that grants teaching capabilities. Recomputed
    /// from current state on every check, never cached past a request.
    pub fn is_validated_teacher(&self) -> bool {
        self.role == Role::Teacher && self.status == AccountStatus::Validated
    }
}

/// NewAccount
///
/// Insertion payload assembled by the workflow layer once the password has
/// been hashed and the status/permission defaults derived.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    pub permissions: Vec<String>,
    pub department: Option<String>,
    pub specialization: Option<String>,
    pub experience: Option<String>,
    pub documents: Vec<String>,
    pub student_ref: Option<String>,
    pub class_name: Option<String>,
    pub parent_contact: Option<String>,
}

impl NewAccount {
    /// Builds a minimal insertion payload with status and permissions derived
    /// from the role; optional attributes default to empty.
    pub fn from_role(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            name,
            email,
            password_hash,
            role,
            status: initial_status(role),
            permissions: default_permissions(role),
            department: None,
            specialization: None,
            experience: None,
            documents: Vec::new(),
            student_ref: None,
            class_name: None,
            parent_contact: None,
        }
    }
}

/// TeacherValidationRequest
///
/// A pending decision record gating a teacher's transition into a
/// capability-bearing state. At most one `pending_review` request may exist
/// per teacher at a time.
#[derive(Debug, Clone, Serialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct TeacherValidationRequest {
    pub id: i64,
    pub teacher_id: i64,
    /// Account that raised the request (the teacher at registration, or a
    /// secretariat member).
    pub requested_by: i64,
    pub reviewed_by: Option<i64>,
    pub status: ReviewStatus,
    pub comments: String,
    #[ts(type = "string")]
    pub request_date: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub review_date: Option<DateTime<Utc>>,
}

/// StudentEnrollmentRequest
///
/// Captures a prospective student's identity independent of any existing
/// account. `student_id` is set at most once, only together with
/// `status=approved`, inside the same transaction that creates the account.
#[derive(Debug, Clone, Serialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct StudentEnrollmentRequest {
    pub id: i64,
    pub student_name: String,
    pub student_email: String,
    pub parent_contact: String,
    pub requested_class: String,
    pub documents: Vec<String>,
    pub status: ReviewStatus,
    /// Free-text decision comments, set when the request is processed.
    pub comments: String,
    pub processed_by: Option<i64>,
    #[ts(type = "string | null")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Id of the student account created on approval.
    pub student_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Course
///
/// Minimal course record; listing and creation are thin adapters over the
/// repository, gated by the validated-teacher check.
#[derive(Debug, Clone, Serialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub author_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Teacher-specific attributes are accepted here so a teacher account can be
/// opened together with its validation request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// LoginRequest
///
/// Standard email/password credential pair (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// AdminLoginRequest
///
/// Triple-factor administrator login: allowlisted email, shared admin key,
/// and the account password (POST /admin/login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
    pub admin_key: String,
}

/// LoginResponse
///
/// Bearer credential plus the sanitized account it was issued for.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub account: Account,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// BootstrapRequest
///
/// Input for the one-time first-admin creation gate (POST /bootstrap/admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BootstrapRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub bootstrap_key: String,
}

/// BootstrapAvailability
///
/// Output of the bootstrap status probe (GET /bootstrap/status).
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct BootstrapAvailability {
    pub available: bool,
    pub attempts_remaining: u32,
    #[ts(type = "string | null")]
    pub lockout_until: Option<DateTime<Utc>>,
}

/// DecisionRequest
///
/// Shared approve/reject payload for teacher validation and student
/// enrollment decisions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DecisionRequest {
    pub approve: bool,
    #[serde(default)]
    pub comments: String,
}

/// TeacherDecisionResponse
///
/// Result of a teacher validation decision: the updated account (digest
/// stripped by serialization) and a human-readable outcome.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct TeacherDecisionResponse {
    pub message: String,
    pub account: Account,
}

/// EnrollmentDecisionResponse
///
/// Result of a student enrollment decision.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct EnrollmentDecisionResponse {
    pub message: String,
    pub request: StudentEnrollmentRequest,
}

/// EnrollmentSubmission
///
/// Input payload for a new student enrollment request raised by the
/// secretariat (POST /secretariat/enrollments). The student does not exist
/// as an account yet.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EnrollmentSubmission {
    pub student_name: String,
    pub student_email: String,
    pub parent_contact: String,
    pub requested_class: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// AccountOverrideRequest
///
/// Admin-only role/status override (PUT /admin/accounts/{id}). Permissions
/// are always re-derived from the resulting role; they are never edited
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountOverrideRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}

/// CreateCourseRequest
///
/// Input payload for course creation (POST /courses).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

// --- Dashboard Schemas (Output) ---

/// AdminDashboardStats
///
/// Output schema for the administrative dashboard (GET /admin/stats). All
/// counters come from live COUNT queries.
#[derive(Debug, Clone, Serialize, Default, TS, ToSchema)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_students: i64,
    pub total_teachers: i64,
    pub validated_teachers: i64,
    pub pending_teacher_requests: i64,
    pub pending_enrollments: i64,
    pub total_courses: i64,
}
