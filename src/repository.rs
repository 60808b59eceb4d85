use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    error::{ApiError, Result},
    models::{
        Account, AccountStatus, AdminDashboardStats, Course, EnrollmentSubmission, NewAccount,
        ReviewStatus, Role, StudentEnrollmentRequest, TeacherValidationRequest,
        default_permissions,
    },
};

/// Repository Trait
///
/// Abstract contract for all persistence operations, kept behind
/// `Arc<dyn Repository>` so handlers and the workflow engine never depend on
/// the concrete backend and tests can substitute an in-memory mock.
///
/// The multi-row mutating operations (`create_account` for teachers,
/// `decide_teacher_validation`, `decide_enrollment`) are atomic: every write
/// commits together or none do, and a second decision on an already-decided
/// request fails with `Conflict` instead of overwriting.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn get_account(&self, id: i64) -> Result<Option<Account>>;
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;
    /// Inserts the account; for teachers, also opens the pending validation
    /// request in the same transaction.
    async fn create_account(&self, new: NewAccount) -> Result<Account>;
    async fn count_accounts_by_role(&self, role: Role) -> Result<i64>;
    /// Admin override: applies the given role and/or status and re-derives
    /// permissions from the resulting role.
    async fn override_account(
        &self,
        id: i64,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> Result<Account>;

    // --- Teacher validation workflow ---
    async fn list_pending_teacher_requests(&self) -> Result<Vec<TeacherValidationRequest>>;
    /// Atomically applies a validation decision to the teacher account and
    /// its pending request (request update is best-effort when absent).
    async fn decide_teacher_validation(
        &self,
        teacher_id: i64,
        approve: bool,
        reviewer_id: i64,
        comments: &str,
    ) -> Result<Account>;

    // --- Student enrollment workflow ---
    async fn create_enrollment_request(
        &self,
        submission: EnrollmentSubmission,
    ) -> Result<StudentEnrollmentRequest>;
    async fn list_pending_enrollments(&self) -> Result<Vec<StudentEnrollmentRequest>>;
    /// Atomically decides an enrollment request; on approval the student
    /// account is created and linked inside the same transaction.
    async fn decide_enrollment(
        &self,
        request_id: i64,
        approve: bool,
        processor_id: i64,
        comments: &str,
        password_hash: &str,
    ) -> Result<StudentEnrollmentRequest>;

    // --- Courses ---
    async fn list_courses(&self) -> Result<Vec<Course>>;
    async fn create_course(
        &self,
        title: &str,
        description: Option<String>,
        author_id: i64,
    ) -> Result<Course>;

    // --- Dashboard ---
    async fn admin_stats(&self) -> Result<AdminDashboardStats>;

    // --- Development only ---
    /// Deletes every account. Exposed only through the Env::Local reset
    /// endpoint.
    async fn reset_accounts(&self) -> Result<u64>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, status, permissions, \
     department, specialization, experience, documents, validated_by, validated_at, \
     student_ref, class_name, parent_contact, created_at, updated_at";

const VALIDATION_REQUEST_COLUMNS: &str =
    "id, teacher_id, requested_by, reviewed_by, status, comments, request_date, review_date";

const ENROLLMENT_COLUMNS: &str = "id, student_name, student_email, parent_contact, \
     requested_class, documents, status, comments, processed_by, processed_at, student_id, \
     created_at";

/// PostgresRepository
///
/// The concrete `Repository` implementation backed by PostgreSQL. Uses
/// runtime-checked queries so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// initialize_schema
    ///
    /// Creates the tables on startup when they do not exist yet; the service
    /// owns its schema and needs no external migration step.
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                permissions TEXT[] NOT NULL DEFAULT '{}',
                department TEXT,
                specialization TEXT,
                experience TEXT,
                documents TEXT[] NOT NULL DEFAULT '{}',
                validated_by BIGINT,
                validated_at TIMESTAMPTZ,
                student_ref TEXT,
                class_name TEXT,
                parent_contact TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teacher_validation_requests (
                id BIGSERIAL PRIMARY KEY,
                teacher_id BIGINT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                requested_by BIGINT NOT NULL,
                reviewed_by BIGINT,
                status TEXT NOT NULL DEFAULT 'pending_review',
                comments TEXT NOT NULL DEFAULT '',
                request_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                review_date TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS student_enrollment_requests (
                id BIGSERIAL PRIMARY KEY,
                student_name TEXT NOT NULL,
                student_email TEXT NOT NULL,
                parent_contact TEXT NOT NULL,
                requested_class TEXT NOT NULL,
                documents TEXT[] NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'pending_review',
                comments TEXT NOT NULL DEFAULT '',
                processed_by BIGINT,
                processed_at TIMESTAMPTZ,
                student_id BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                author_id BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Email lookup is case-sensitive, matching the stored value exactly.
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts
                (name, email, password_hash, role, status, permissions, department,
                 specialization, experience, documents, student_ref, class_name, parent_contact)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(new.status)
        .bind(&new.permissions)
        .bind(&new.department)
        .bind(&new.specialization)
        .bind(&new.experience)
        .bind(&new.documents)
        .bind(&new.student_ref)
        .bind(&new.class_name)
        .bind(&new.parent_contact)
        .fetch_one(&mut *tx)
        .await?;

        // A teacher registration opens its review request in the same
        // transaction, so an account pending validation always has a
        // matching pending request.
        if account.role == Role::Teacher {
            sqlx::query(
                "INSERT INTO teacher_validation_requests (teacher_id, requested_by, status) \
                 VALUES ($1, $2, $3)",
            )
            .bind(account.id)
            .bind(account.id)
            .bind(ReviewStatus::PendingReview)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(account)
    }

    async fn count_accounts_by_role(&self, role: Role) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn override_account(
        &self,
        id: i64,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("account not found"))?;

        let new_role = role.unwrap_or(current.role);
        let new_status = status.unwrap_or(current.status);
        // Permissions always follow the resulting role.
        let permissions = default_permissions(new_role);

        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET role = $2, status = $3, permissions = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new_role)
        .bind(new_status)
        .bind(&permissions)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    async fn list_pending_teacher_requests(&self) -> Result<Vec<TeacherValidationRequest>> {
        let requests = sqlx::query_as::<_, TeacherValidationRequest>(&format!(
            "SELECT {VALIDATION_REQUEST_COLUMNS} FROM teacher_validation_requests \
             WHERE status = $1 ORDER BY request_date ASC"
        ))
        .bind(ReviewStatus::PendingReview)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn decide_teacher_validation(
        &self,
        teacher_id: i64,
        approve: bool,
        reviewer_id: i64,
        comments: &str,
    ) -> Result<Account> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent decisions on the same teacher; the
        // loser of the race sees the already-updated status below.
        let teacher = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND role = $2 FOR UPDATE"
        ))
        .bind(teacher_id)
        .bind(Role::Teacher)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("teacher account not found"))?;

        if teacher.status != AccountStatus::PendingValidation {
            return Err(ApiError::conflict(
                "teacher validation has already been decided",
            ));
        }

        let now = Utc::now();
        let account = if approve {
            sqlx::query_as::<_, Account>(&format!(
                r#"
                UPDATE accounts
                SET status = $2, validated_by = $3, validated_at = $4,
                    permissions = $5, updated_at = NOW()
                WHERE id = $1
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(teacher_id)
            .bind(AccountStatus::Validated)
            .bind(reviewer_id)
            .bind(now)
            .bind(default_permissions(Role::Teacher))
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, Account>(&format!(
                r#"
                UPDATE accounts
                SET status = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(teacher_id)
            .bind(AccountStatus::Suspended)
            .fetch_one(&mut *tx)
            .await?
        };

        // Best-effort request update: zero affected rows is fine (no pending
        // request existed), but a failing update aborts the whole decision.
        let request_status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };
        sqlx::query(
            "UPDATE teacher_validation_requests \
             SET status = $2, reviewed_by = $3, comments = $4, review_date = $5 \
             WHERE teacher_id = $1 AND status = $6",
        )
        .bind(teacher_id)
        .bind(request_status)
        .bind(reviewer_id)
        .bind(comments)
        .bind(now)
        .bind(ReviewStatus::PendingReview)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    async fn create_enrollment_request(
        &self,
        submission: EnrollmentSubmission,
    ) -> Result<StudentEnrollmentRequest> {
        let request = sqlx::query_as::<_, StudentEnrollmentRequest>(&format!(
            r#"
            INSERT INTO student_enrollment_requests
                (student_name, student_email, parent_contact, requested_class, documents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(&submission.student_name)
        .bind(&submission.student_email)
        .bind(&submission.parent_contact)
        .bind(&submission.requested_class)
        .bind(&submission.documents)
        .fetch_one(&self.pool)
        .await?;
        Ok(request)
    }

    async fn list_pending_enrollments(&self) -> Result<Vec<StudentEnrollmentRequest>> {
        let requests = sqlx::query_as::<_, StudentEnrollmentRequest>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM student_enrollment_requests \
             WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(ReviewStatus::PendingReview)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn decide_enrollment(
        &self,
        request_id: i64,
        approve: bool,
        processor_id: i64,
        comments: &str,
        password_hash: &str,
    ) -> Result<StudentEnrollmentRequest> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, StudentEnrollmentRequest>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM student_enrollment_requests \
             WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("enrollment request not found"))?;

        if request.status != ReviewStatus::PendingReview {
            return Err(ApiError::conflict(
                "enrollment request has already been decided",
            ));
        }

        // On approval the student account is created first; its id links the
        // request in the same transaction, so the link is set exactly once
        // and only together with status=approved.
        let student_id: Option<i64> = if approve {
            let student_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO accounts
                    (name, email, password_hash, role, status, permissions,
                     class_name, parent_contact)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(&request.student_name)
            .bind(&request.student_email)
            .bind(password_hash)
            .bind(Role::Student)
            .bind(AccountStatus::Active)
            .bind(default_permissions(Role::Student))
            .bind(&request.requested_class)
            .bind(&request.parent_contact)
            .fetch_one(&mut *tx)
            .await?;
            Some(student_id)
        } else {
            None
        };

        let status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };
        let updated = sqlx::query_as::<_, StudentEnrollmentRequest>(&format!(
            r#"
            UPDATE student_enrollment_requests
            SET status = $2, comments = $3, processed_by = $4, processed_at = NOW(),
                student_id = $5
            WHERE id = $1
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(status)
        .bind(comments)
        .bind(processor_id)
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            "SELECT id, title, description, author_id, created_at, updated_at \
             FROM courses ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn create_course(
        &self,
        title: &str,
        description: Option<String>,
        author_id: i64,
    ) -> Result<Course> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (title, description, author_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, author_id, created_at, updated_at
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(course)
    }

    async fn admin_stats(&self) -> Result<AdminDashboardStats> {
        let total_students: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = $1")
                .bind(Role::Student)
                .fetch_one(&self.pool)
                .await?;
        let total_teachers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = $1")
                .bind(Role::Teacher)
                .fetch_one(&self.pool)
                .await?;
        let validated_teachers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE role = $1 AND status = $2")
                .bind(Role::Teacher)
                .bind(AccountStatus::Validated)
                .fetch_one(&self.pool)
                .await?;
        let pending_teacher_requests: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM teacher_validation_requests WHERE status = $1",
        )
        .bind(ReviewStatus::PendingReview)
        .fetch_one(&self.pool)
        .await?;
        let pending_enrollments: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM student_enrollment_requests WHERE status = $1",
        )
        .bind(ReviewStatus::PendingReview)
        .fetch_one(&self.pool)
        .await?;
        let total_courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_students,
            total_teachers,
            validated_teachers,
            pending_teacher_requests,
            pending_enrollments,
            total_courses,
        })
    }

    async fn reset_accounts(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM accounts").execute(&self.pool).await?;
        // Restarting the id sequence is convenience only; ignore failures.
        let _ = sqlx::query("ALTER SEQUENCE accounts_id_seq RESTART WITH 1")
            .execute(&self.pool)
            .await;
        Ok(result.rows_affected())
    }
}
