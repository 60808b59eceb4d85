//! Shared test scaffolding: an in-memory `Repository` implementation and
//! builders for accounts and application state.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use school_portal::{
    ApiError, AppState, Repository, Result,
    bootstrap::BootstrapGuard,
    config::{AppConfig, Env},
    models::{
        Account, AccountStatus, AdminDashboardStats, Course, EnrollmentSubmission, NewAccount,
        ReviewStatus, Role, StudentEnrollmentRequest, TeacherValidationRequest,
        default_permissions,
    },
};

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const TEST_BOOTSTRAP_KEY: &str = "test-bootstrap-key";

/// account
///
/// Builds a fully populated account row with permissions derived from the
/// role, the way registration would produce it.
pub fn account(id: i64, role: Role, status: AccountStatus) -> Account {
    let now = Utc::now();
    Account {
        id,
        name: format!("Test Account {id}"),
        email: format!("account{id}@example.com"),
        password_hash: String::new(),
        role,
        status,
        permissions: default_permissions(role),
        department: None,
        specialization: None,
        experience: None,
        documents: vec![],
        validated_by: None,
        validated_at: None,
        student_ref: None,
        class_name: None,
        parent_contact: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Account>,
    validation_requests: Vec<TeacherValidationRequest>,
    enrollments: Vec<StudentEnrollmentRequest>,
    courses: Vec<Course>,
    next_id: i64,
}

/// MockRepo
///
/// In-memory `Repository` mirroring the transactional semantics of the
/// Postgres implementation: teacher creation opens a review request, decide
/// operations refuse already-decided records with `Conflict`, and enrollment
/// approval creates and links the student account.
#[derive(Default)]
pub struct MockRepo {
    state: Mutex<MockState>,
    fail_validation_request_update: AtomicBool,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an existing account, keeping the id counter ahead of it.
    pub fn seed_account(&self, acct: Account) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(acct.id);
        state.accounts.push(acct);
    }

    pub fn seed_enrollment(&self, request: StudentEnrollmentRequest) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(request.id);
        state.enrollments.push(request);
    }

    /// Makes the next teacher-decision request update fail, modelling a
    /// storage error partway through the transaction.
    pub fn fail_next_validation_request_update(&self) {
        self.fail_validation_request_update
            .store(true, Ordering::SeqCst);
    }

    pub fn pending_request_for(&self, teacher_id: i64) -> Option<TeacherValidationRequest> {
        let state = self.state.lock().unwrap();
        state
            .validation_requests
            .iter()
            .find(|r| r.teacher_id == teacher_id)
            .cloned()
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.iter().any(|a| a.email == new.email) {
            return Err(ApiError::conflict(
                "a record with this identity already exists",
            ));
        }

        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        let acct = Account {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            status: new.status,
            permissions: new.permissions,
            department: new.department,
            specialization: new.specialization,
            experience: new.experience,
            documents: new.documents,
            validated_by: None,
            validated_at: None,
            student_ref: new.student_ref,
            class_name: new.class_name,
            parent_contact: new.parent_contact,
            created_at: now,
            updated_at: now,
        };
        state.accounts.push(acct.clone());

        if acct.role == Role::Teacher {
            state.next_id += 1;
            let request_id = state.next_id;
            state.validation_requests.push(TeacherValidationRequest {
                id: request_id,
                teacher_id: acct.id,
                requested_by: acct.id,
                reviewed_by: None,
                status: ReviewStatus::PendingReview,
                comments: String::new(),
                request_date: now,
                review_date: None,
            });
        }

        Ok(acct)
    }

    async fn count_accounts_by_role(&self, role: Role) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().filter(|a| a.role == role).count() as i64)
    }

    async fn override_account(
        &self,
        id: i64,
        role: Option<Role>,
        status: Option<AccountStatus>,
    ) -> Result<Account> {
        let mut state = self.state.lock().unwrap();
        let acct = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ApiError::not_found("account not found"))?;

        if let Some(role) = role {
            acct.role = role;
        }
        if let Some(status) = status {
            acct.status = status;
        }
        acct.permissions = default_permissions(acct.role);
        acct.updated_at = Utc::now();
        Ok(acct.clone())
    }

    async fn list_pending_teacher_requests(&self) -> Result<Vec<TeacherValidationRequest>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .validation_requests
            .iter()
            .filter(|r| r.status == ReviewStatus::PendingReview)
            .cloned()
            .collect())
    }

    async fn decide_teacher_validation(
        &self,
        teacher_id: i64,
        approve: bool,
        reviewer_id: i64,
        comments: &str,
    ) -> Result<Account> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        let acct = state
            .accounts
            .iter_mut()
            .find(|a| a.id == teacher_id && a.role == Role::Teacher)
            .ok_or_else(|| ApiError::not_found("teacher account not found"))?;

        if acct.status != AccountStatus::PendingValidation {
            return Err(ApiError::conflict(
                "teacher validation has already been decided",
            ));
        }

        // An injected request-update failure rolls the whole decision back:
        // neither the account transition nor the request becomes visible.
        if self
            .fail_validation_request_update
            .swap(false, Ordering::SeqCst)
        {
            return Err(ApiError::Internal("database operation failed".to_string()));
        }

        if approve {
            acct.status = AccountStatus::Validated;
            acct.validated_by = Some(reviewer_id);
            acct.validated_at = Some(now);
            acct.permissions = default_permissions(Role::Teacher);
        } else {
            acct.status = AccountStatus::Suspended;
        }
        acct.updated_at = now;
        let updated = acct.clone();

        if let Some(request) = state
            .validation_requests
            .iter_mut()
            .find(|r| r.teacher_id == teacher_id && r.status == ReviewStatus::PendingReview)
        {
            request.status = if approve {
                ReviewStatus::Approved
            } else {
                ReviewStatus::Rejected
            };
            request.reviewed_by = Some(reviewer_id);
            request.comments = comments.to_string();
            request.review_date = Some(now);
        }

        Ok(updated)
    }

    async fn create_enrollment_request(
        &self,
        submission: EnrollmentSubmission,
    ) -> Result<StudentEnrollmentRequest> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let request = StudentEnrollmentRequest {
            id: state.next_id,
            student_name: submission.student_name,
            student_email: submission.student_email,
            parent_contact: submission.parent_contact,
            requested_class: submission.requested_class,
            documents: submission.documents,
            status: ReviewStatus::PendingReview,
            comments: String::new(),
            processed_by: None,
            processed_at: None,
            student_id: None,
            created_at: Utc::now(),
        };
        state.enrollments.push(request.clone());
        Ok(request)
    }

    async fn list_pending_enrollments(&self) -> Result<Vec<StudentEnrollmentRequest>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .enrollments
            .iter()
            .filter(|r| r.status == ReviewStatus::PendingReview)
            .cloned()
            .collect())
    }

    async fn decide_enrollment(
        &self,
        request_id: i64,
        approve: bool,
        processor_id: i64,
        comments: &str,
        password_hash: &str,
    ) -> Result<StudentEnrollmentRequest> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        let index = state
            .enrollments
            .iter()
            .position(|r| r.id == request_id)
            .ok_or_else(|| ApiError::not_found("enrollment request not found"))?;

        if state.enrollments[index].status != ReviewStatus::PendingReview {
            return Err(ApiError::conflict(
                "enrollment request has already been decided",
            ));
        }

        let student_id = if approve {
            // Enrollment-time account creation enforces the same email
            // uniqueness as create_account; a clash fails the decision and
            // leaves the request untouched.
            if state
                .accounts
                .iter()
                .any(|a| a.email == state.enrollments[index].student_email)
            {
                return Err(ApiError::conflict(
                    "a record with this identity already exists",
                ));
            }

            state.next_id += 1;
            let id = state.next_id;
            let request = &state.enrollments[index];
            let student = Account {
                id,
                name: request.student_name.clone(),
                email: request.student_email.clone(),
                password_hash: password_hash.to_string(),
                role: Role::Student,
                status: AccountStatus::Active,
                permissions: default_permissions(Role::Student),
                department: None,
                specialization: None,
                experience: None,
                documents: vec![],
                validated_by: None,
                validated_at: None,
                student_ref: None,
                class_name: Some(request.requested_class.clone()),
                parent_contact: Some(request.parent_contact.clone()),
                created_at: now,
                updated_at: now,
            };
            state.accounts.push(student);
            Some(id)
        } else {
            None
        };

        let request = &mut state.enrollments[index];
        request.status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };
        request.comments = comments.to_string();
        request.processed_by = Some(processor_id);
        request.processed_at = Some(now);
        request.student_id = student_id;
        Ok(request.clone())
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let state = self.state.lock().unwrap();
        Ok(state.courses.clone())
    }

    async fn create_course(
        &self,
        title: &str,
        description: Option<String>,
        author_id: i64,
    ) -> Result<Course> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let course = Course {
            id: state.next_id,
            title: title.to_string(),
            description,
            author_id: Some(author_id),
            created_at: now,
            updated_at: now,
        };
        state.courses.push(course.clone());
        Ok(course)
    }

    async fn admin_stats(&self) -> Result<AdminDashboardStats> {
        let state = self.state.lock().unwrap();
        Ok(AdminDashboardStats {
            total_students: state
                .accounts
                .iter()
                .filter(|a| a.role == Role::Student)
                .count() as i64,
            total_teachers: state
                .accounts
                .iter()
                .filter(|a| a.role == Role::Teacher)
                .count() as i64,
            validated_teachers: state
                .accounts
                .iter()
                .filter(|a| a.role == Role::Teacher && a.status == AccountStatus::Validated)
                .count() as i64,
            pending_teacher_requests: state
                .validation_requests
                .iter()
                .filter(|r| r.status == ReviewStatus::PendingReview)
                .count() as i64,
            pending_enrollments: state
                .enrollments
                .iter()
                .filter(|r| r.status == ReviewStatus::PendingReview)
                .count() as i64,
            total_courses: state.courses.len() as i64,
        })
    }

    async fn reset_accounts(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let deleted = state.accounts.len() as u64;
        state.accounts.clear();
        Ok(deleted)
    }
}

/// test_config
///
/// A safe default configuration pinned to the test JWT secret.
pub fn test_config(env: Env) -> AppConfig {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config.bootstrap_key = TEST_BOOTSTRAP_KEY.to_string();
    config
}

/// create_app_state
///
/// Assembles an `AppState` over the given mock repository, with a fresh
/// bootstrap guard per test.
pub fn create_app_state(env: Env, repo: MockRepo) -> AppState {
    let config = test_config(env);
    let bootstrap = Arc::new(BootstrapGuard::new(
        config.bootstrap_key.clone(),
        config.bootstrap_max_attempts,
    ));
    AppState {
        repo: Arc::new(repo),
        config,
        bootstrap,
    }
}
