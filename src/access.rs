//! Access Control Evaluator.
//!
//! Stateless, request-time authorization predicates over an already-resolved
//! account. These functions never mutate state and never consult the
//! workflow engine; they only inspect the role, status and permission set
//! the repository resolved for the current request.

use serde_json::json;

use crate::{
    error::{ApiError, Result},
    models::{Account, Role},
};

/// require_role
///
/// Passes iff the account's role is one of `allowed`. The rejection names
/// both the required roles and the caller's actual role.
pub fn require_role(account: &Account, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&account.role) {
        return Ok(());
    }
    Err(ApiError::forbidden_with(
        "access denied: insufficient role",
        json!({
            "required_roles": allowed,
            "user_role": account.role,
        }),
    ))
}

/// require_permission
///
/// Passes iff the account holds the capability directly or via the `"all"`
/// wildcard.
pub fn require_permission(account: &Account, permission: &str) -> Result<()> {
    if account.has_permission(permission) {
        return Ok(());
    }
    Err(ApiError::forbidden_with(
        "access denied: insufficient permission",
        json!({ "required_permission": permission }),
    ))
}

/// require_admin_or_self
///
/// Passes for admins, or when the target resource belongs to the caller.
pub fn require_admin_or_self(account: &Account, target_id: i64) -> Result<()> {
    if account.is_admin() || account.id == target_id {
        return Ok(());
    }
    Err(ApiError::forbidden("access denied"))
}

/// require_validated_teacher
///
/// Passes only for `role=teacher, status=validated`. The rejection surfaces
/// the caller's current status so "not yet reviewed" and "rejected" are
/// distinguishable.
pub fn require_validated_teacher(account: &Account) -> Result<()> {
    if account.is_validated_teacher() {
        return Ok(());
    }
    Err(ApiError::teacher_not_validated(account.status))
}
