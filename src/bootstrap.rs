//! Bootstrap Guard.
//!
//! A one-time, rate-limited gate protecting creation of the very first admin
//! account. The guard is an explicitly constructed value injected into the
//! application state, so tests get independent instances. The in-memory flag
//! is only the first line of defense; the authoritative check during admin
//! creation is the admin count in storage, which survives process restarts.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    error::{ApiError, Result},
    models::BootstrapAvailability,
};

/// Lockout window opened after the attempt budget is exhausted.
pub const LOCKOUT_MINUTES: i64 = 15;

/// BootstrapState
///
/// Process-wide gate state. Once `used` is set the gate can never reopen;
/// `attempts` only resets when an elapsed lockout is observed.
#[derive(Debug, Clone)]
pub struct BootstrapState {
    pub enabled: bool,
    pub used: bool,
    pub max_attempts: u32,
    pub attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl BootstrapState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            enabled: true,
            used: false,
            max_attempts,
            attempts: 0,
            lockout_until: None,
        }
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// BootstrapGuard
///
/// Serializes every consultation of the gate behind one async lock so two
/// racing requests cannot both pass the attempt counting or both create a
/// "first" admin. The workflow holds the lock across the key check, the
/// admin-count query and the account insert.
pub struct BootstrapGuard {
    key: String,
    state: Mutex<BootstrapState>,
}

impl BootstrapGuard {
    pub fn new(key: String, max_attempts: u32) -> Self {
        Self {
            key,
            state: Mutex::new(BootstrapState::new(max_attempts)),
        }
    }

    /// Constructs a guard over pre-populated state. Used by tests to model
    /// lockouts and exhausted attempt budgets directly.
    pub fn with_state(key: String, state: BootstrapState) -> Self {
        Self {
            key,
            state: Mutex::new(state),
        }
    }

    /// Acquires the gate lock for the duration of a privileged operation.
    pub async fn begin(&self) -> MutexGuard<'_, BootstrapState> {
        self.state.lock().await
    }

    /// ensure_available
    ///
    /// Fails `Forbidden` when the gate is spent, disabled, or inside a
    /// lockout window. Observing an elapsed lockout clears it and resets the
    /// attempt counter as a side effect (lazy reset).
    pub fn ensure_available(&self, state: &mut BootstrapState) -> Result<()> {
        if state.used {
            return Err(ApiError::forbidden_with(
                "bootstrap is not available",
                json!({ "reason": "used" }),
            ));
        }
        if !state.enabled {
            return Err(ApiError::forbidden_with(
                "bootstrap is not available",
                json!({ "reason": "disabled" }),
            ));
        }

        if let Some(until) = state.lockout_until {
            let now = Utc::now();
            if now < until {
                return Err(ApiError::forbidden_with(
                    "bootstrap is not available",
                    json!({ "reason": "locked", "lockout_until": until }),
                ));
            }
            // Lockout elapsed: reset lazily.
            state.lockout_until = None;
            state.attempts = 0;
        }

        Ok(())
    }

    /// check_key
    ///
    /// Compares the supplied key against the configured secret in constant
    /// time. A mismatch consumes an attempt and, once the budget is
    /// exhausted, opens the lockout window. The rejection reports remaining
    /// attempts but never the key itself.
    pub fn check_key(&self, state: &mut BootstrapState, supplied: &str) -> Result<()> {
        if bool::from(supplied.as_bytes().ct_eq(self.key.as_bytes())) {
            return Ok(());
        }

        state.attempts += 1;
        if state.attempts >= state.max_attempts {
            state.lockout_until = Some(Utc::now() + Duration::minutes(LOCKOUT_MINUTES));
        }

        Err(ApiError::Unauthorized {
            message: "invalid bootstrap key".to_string(),
            attempts_remaining: Some(state.attempts_remaining()),
        })
    }

    /// consume
    ///
    /// Irreversibly spends the gate after the first admin has been created.
    pub fn consume(&self, state: &mut BootstrapState) {
        state.used = true;
        state.enabled = false;
    }

    /// is_available
    ///
    /// Synchronous boolean probe, applying the same lazy lockout reset as
    /// `ensure_available`.
    pub async fn is_available(&self) -> bool {
        let mut state = self.state.lock().await;
        self.ensure_available(&mut state).is_ok()
    }

    /// availability
    ///
    /// Telemetry snapshot for the status endpoint.
    pub async fn availability(&self) -> BootstrapAvailability {
        let mut state = self.state.lock().await;
        let available = self.ensure_available(&mut state).is_ok();
        BootstrapAvailability {
            available,
            attempts_remaining: state.attempts_remaining(),
            lockout_until: state.lockout_until,
        }
    }
}
