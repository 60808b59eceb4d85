mod common;

use std::sync::Arc;

use common::{MockRepo, account, test_config};
use school_portal::{
    ApiError,
    config::Env,
    models::{
        AccountStatus, AdminLoginRequest, DecisionRequest, EnrollmentSubmission, LoginRequest,
        RegisterRequest, ReviewStatus, Role,
    },
    repository::RepositoryState,
    workflow,
};

fn register_request(role: Role) -> RegisterRequest {
    RegisterRequest {
        name: "Jordan Rivers".to_string(),
        email: "jordan@example.com".to_string(),
        password: "hunter22".to_string(),
        role,
        department: None,
        specialization: None,
        experience: None,
        documents: vec![],
    }
}

fn enrollment() -> EnrollmentSubmission {
    EnrollmentSubmission {
        student_name: "Sam Doe".to_string(),
        student_email: "sam@example.com".to_string(),
        parent_contact: "+10000000".to_string(),
        requested_class: "5B".to_string(),
        documents: vec![],
    }
}

// --- Registration ---

#[tokio::test]
async fn test_register_teacher_starts_pending_with_open_request() {
    let mock = Arc::new(MockRepo::new());
    let repo: RepositoryState = mock.clone();

    let created = workflow::register_account(&repo, register_request(Role::Teacher))
        .await
        .unwrap();

    assert_eq!(created.status, AccountStatus::PendingValidation);
    assert_eq!(
        created.permissions,
        vec!["manage_courses", "view_students", "manage_grades"]
    );

    let request = mock.pending_request_for(created.id).unwrap();
    assert_eq!(request.status, ReviewStatus::PendingReview);
    assert_eq!(request.requested_by, created.id);
}

#[tokio::test]
async fn test_register_student_is_active_immediately() {
    let repo: RepositoryState = Arc::new(MockRepo::new());

    let created = workflow::register_account(&repo, register_request(Role::Student))
        .await
        .unwrap();

    assert_eq!(created.status, AccountStatus::Active);
    assert_eq!(created.permissions, vec!["view_courses", "submit_assignments"]);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let repo: RepositoryState = Arc::new(MockRepo::new());

    let mut req = register_request(Role::Student);
    req.password = "abc".to_string();

    let result = workflow::register_account(&repo, req).await;
    assert!(matches!(result, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let repo: RepositoryState = Arc::new(MockRepo::new());

    workflow::register_account(&repo, register_request(Role::Student))
        .await
        .unwrap();
    let result = workflow::register_account(&repo, register_request(Role::Student)).await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));
}

// --- Login ---

#[tokio::test]
async fn test_login_roundtrip() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let config = test_config(Env::Local);

    workflow::register_account(&repo, register_request(Role::Student))
        .await
        .unwrap();

    let response = workflow::login(
        &repo,
        &config,
        LoginRequest {
            email: "jordan@example.com".to_string(),
            password: "hunter22".to_string(),
        },
    )
    .await
    .unwrap();

    assert!(!response.token.is_empty());
    assert_eq!(response.account.email, "jordan@example.com");
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let config = test_config(Env::Local);

    workflow::register_account(&repo, register_request(Role::Student))
        .await
        .unwrap();

    let result = workflow::login(
        &repo,
        &config,
        LoginRequest {
            email: "jordan@example.com".to_string(),
            password: "wrong-password".to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_admin_login_requires_allowlisted_email() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let config = test_config(Env::Local);

    let result = workflow::admin_login(
        &repo,
        &config,
        AdminLoginRequest {
            email: "intruder@example.com".to_string(),
            password: "whatever0".to_string(),
            admin_key: config.admin_key.clone(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
}

#[tokio::test]
async fn test_admin_login_requires_matching_key() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let config = test_config(Env::Local);

    let result = workflow::admin_login(
        &repo,
        &config,
        AdminLoginRequest {
            email: config.admin_emails[0].clone(),
            password: "whatever0".to_string(),
            admin_key: "not-the-key".to_string(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
}

// --- Teacher validation decisions ---

async fn seed_pending_teacher(repo: &RepositoryState) -> i64 {
    let teacher = workflow::register_account(
        repo,
        RegisterRequest {
            name: "Alex Kim".to_string(),
            email: "alex@example.com".to_string(),
            password: "teaching1".to_string(),
            role: Role::Teacher,
            department: Some("Mathematics".to_string()),
            specialization: None,
            experience: None,
            documents: vec![],
        },
    )
    .await
    .unwrap();
    teacher.id
}

#[tokio::test]
async fn test_approve_teacher_validates_account_and_request() {
    let mock = Arc::new(MockRepo::new());
    let repo: RepositoryState = mock.clone();
    let admin = account(100, Role::Admin, AccountStatus::Active);
    let teacher_id = seed_pending_teacher(&repo).await;

    let response = workflow::approve_or_reject_teacher(
        &repo,
        &admin,
        teacher_id,
        DecisionRequest {
            approve: true,
            comments: "credentials verified".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.account.status, AccountStatus::Validated);
    assert_eq!(response.account.validated_by, Some(admin.id));
    assert!(response.account.validated_at.is_some());
    assert!(response.account.is_validated_teacher());

    // The review request was decided in the same operation.
    let request = mock.pending_request_for(teacher_id).unwrap();
    assert_eq!(request.status, ReviewStatus::Approved);
    assert_eq!(request.reviewed_by, Some(admin.id));
    assert_eq!(request.comments, "credentials verified");
}

#[tokio::test]
async fn test_reject_teacher_suspends_account() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let admin = account(100, Role::Admin, AccountStatus::Active);
    let teacher_id = seed_pending_teacher(&repo).await;

    let response = workflow::approve_or_reject_teacher(
        &repo,
        &admin,
        teacher_id,
        DecisionRequest {
            approve: false,
            comments: "documents missing".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.account.status, AccountStatus::Suspended);
    assert!(response.account.validated_by.is_none());
    assert!(!response.account.is_validated_teacher());
}

#[tokio::test]
async fn test_second_decision_on_same_teacher_conflicts() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let admin = account(100, Role::Admin, AccountStatus::Active);
    let teacher_id = seed_pending_teacher(&repo).await;

    let approve = DecisionRequest {
        approve: true,
        comments: String::new(),
    };
    workflow::approve_or_reject_teacher(&repo, &admin, teacher_id, approve.clone())
        .await
        .unwrap();

    let second = workflow::approve_or_reject_teacher(&repo, &admin, teacher_id, approve).await;
    assert!(matches!(second, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_teacher_decision_requires_admin_role() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let secretariat = account(100, Role::Secretariat, AccountStatus::Active);
    let teacher_id = seed_pending_teacher(&repo).await;

    let result = workflow::approve_or_reject_teacher(
        &repo,
        &secretariat,
        teacher_id,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden { .. })));
}

#[tokio::test]
async fn test_failed_request_update_hides_account_transition() {
    let mock = Arc::new(MockRepo::new());
    let repo: RepositoryState = mock.clone();
    let admin = account(100, Role::Admin, AccountStatus::Active);
    let teacher_id = seed_pending_teacher(&repo).await;

    mock.fail_next_validation_request_update();
    let result = workflow::approve_or_reject_teacher(
        &repo,
        &admin,
        teacher_id,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Internal(_))));

    // Neither write is visible: the teacher never ends up validated while
    // its request remains pending.
    let teacher = repo.get_account(teacher_id).await.unwrap().unwrap();
    assert_eq!(teacher.status, AccountStatus::PendingValidation);
    assert!(teacher.validated_by.is_none());
    let request = mock.pending_request_for(teacher_id).unwrap();
    assert_eq!(request.status, ReviewStatus::PendingReview);

    // The transient failure leaves the decision retryable.
    let retried = workflow::approve_or_reject_teacher(
        &repo,
        &admin,
        teacher_id,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(retried.is_ok());
}

#[tokio::test]
async fn test_decision_on_unknown_teacher_is_not_found() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let admin = account(100, Role::Admin, AccountStatus::Active);

    let result = workflow::approve_or_reject_teacher(
        &repo,
        &admin,
        4242,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

// --- Student enrollment decisions ---

#[tokio::test]
async fn test_approve_enrollment_creates_linked_student_account() {
    let mock = Arc::new(MockRepo::new());
    let repo: RepositoryState = mock.clone();
    let secretariat = account(100, Role::Secretariat, AccountStatus::Active);

    let request = repo.create_enrollment_request(enrollment()).await.unwrap();

    let response = workflow::process_student_enrollment(
        &repo,
        &secretariat,
        request.id,
        DecisionRequest {
            approve: true,
            comments: "welcome".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.request.status, ReviewStatus::Approved);
    assert_eq!(response.request.processed_by, Some(secretariat.id));

    let student_id = response.request.student_id.expect("student account linked");
    let student = repo.get_account(student_id).await.unwrap().unwrap();
    assert_eq!(student.role, Role::Student);
    assert_eq!(student.status, AccountStatus::Active);
    assert_eq!(student.email, "sam@example.com");
    assert_eq!(student.class_name.as_deref(), Some("5B"));
    assert!(!student.password_hash.is_empty());
}

#[tokio::test]
async fn test_reject_enrollment_creates_no_account() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let secretariat = account(100, Role::Secretariat, AccountStatus::Active);

    let request = repo.create_enrollment_request(enrollment()).await.unwrap();

    let response = workflow::process_student_enrollment(
        &repo,
        &secretariat,
        request.id,
        DecisionRequest {
            approve: false,
            comments: "incomplete paperwork".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.request.status, ReviewStatus::Rejected);
    assert!(response.request.student_id.is_none());
    assert_eq!(repo.count_accounts_by_role(Role::Student).await.unwrap(), 0);
}

#[tokio::test]
async fn test_enrollment_approval_with_taken_email_leaves_request_pending() {
    let mock = Arc::new(MockRepo::new());
    let repo: RepositoryState = mock.clone();
    let secretariat = account(100, Role::Secretariat, AccountStatus::Active);

    // The enrollment's email already belongs to an account, so the
    // account-creation step of approval must fail.
    let mut existing = account(50, Role::Student, AccountStatus::Active);
    existing.email = "sam@example.com".to_string();
    mock.seed_account(existing);

    let request = repo.create_enrollment_request(enrollment()).await.unwrap();
    let result = workflow::process_student_enrollment(
        &repo,
        &secretariat,
        request.id,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    // The request remains undecided, with no partial state behind it.
    let pending = repo.list_pending_enrollments().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, ReviewStatus::PendingReview);
    assert!(pending[0].student_id.is_none());
    assert!(pending[0].processed_by.is_none());
    assert_eq!(repo.count_accounts_by_role(Role::Student).await.unwrap(), 1);
}

#[tokio::test]
async fn test_second_enrollment_decision_conflicts() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let secretariat = account(100, Role::Secretariat, AccountStatus::Active);

    let request = repo.create_enrollment_request(enrollment()).await.unwrap();
    let reject = DecisionRequest {
        approve: false,
        comments: String::new(),
    };
    workflow::process_student_enrollment(&repo, &secretariat, request.id, reject.clone())
        .await
        .unwrap();

    let second =
        workflow::process_student_enrollment(&repo, &secretariat, request.id, reject).await;
    assert!(matches!(second, Err(ApiError::Conflict(_))));
}

#[tokio::test]
async fn test_enrollment_decision_requires_manage_enrollments() {
    let repo: RepositoryState = Arc::new(MockRepo::new());
    let request = repo.create_enrollment_request(enrollment()).await.unwrap();

    // A teacher has no manage_enrollments capability.
    let teacher = account(100, Role::Teacher, AccountStatus::Validated);
    let result = workflow::process_student_enrollment(
        &repo,
        &teacher,
        request.id,
        DecisionRequest {
            approve: true,
            comments: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden { .. })));

    // An admin passes through the "all" wildcard.
    let admin = account(101, Role::Admin, AccountStatus::Active);
    let result = workflow::process_student_enrollment(
        &repo,
        &admin,
        request.id,
        DecisionRequest {
            approve: false,
            comments: String::new(),
        },
    )
    .await;
    assert!(result.is_ok());
}
