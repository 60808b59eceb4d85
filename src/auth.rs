use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Account, Role},
    repository::RepositoryState,
};

/// Claim value marking a token issued by the triple-factor admin login.
pub const ADMIN_SESSION: &str = "admin_session";

/// Standard token lifetime for the regular login flow.
pub const TOKEN_TTL_HOURS: i64 = 24;
/// Shortened lifetime for admin session tokens.
pub const ADMIN_TOKEN_TTL_HOURS: i64 = 2;

/// Claims
///
/// Payload carried by every bearer token: the account id, email and role,
/// plus the issue/expiry timestamps the middleware validates on each request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the numeric account id.
    pub sub: i64,
    pub email: String,
    pub role: Role,
    /// Expiration time, seconds since the epoch.
    pub exp: usize,
    /// Issued-at, seconds since the epoch.
    pub iat: usize,
    /// Set to `admin_session` for tokens issued by the admin login.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
}

/// issue_token
///
/// Signs a bearer token for the account with the given lifetime. Returns the
/// encoded token together with its expiry instant.
pub fn issue_token(
    account: &Account,
    secret: &str,
    ttl_hours: i64,
    session_type: Option<&str>,
) -> Result<(String, DateTime<Utc>), ApiError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);

    let claims = Claims {
        sub: account.id,
        email: account.email.clone(),
        role: account.role,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
        session_type: session_type.map(|s| s.to_string()),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| {
        tracing::error!("token signing failed: {:?}", e);
        ApiError::Internal("token generation failed".to_string())
    })
    .map(|token| (token, expires_at))
}

/// hash_password
///
/// The opaque `Hash(secret) -> digest` capability, backed by bcrypt at the
/// default cost.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// verify_password
///
/// The opaque `Verify(digest, secret) -> bool` capability. A malformed digest
/// counts as a failed verification rather than an error.
pub fn verify_password(digest: &str, password: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}

/// AuthAccount
///
/// The typed, validated account context attached to every authenticated
/// request. The full account row is re-read from storage on each request so
/// role, status and permission checks always see current state.
#[derive(Debug, Clone)]
pub struct AuthAccount(pub Account);

/// AuthAccount Extractor Implementation
///
/// Axum extractor resolving the caller's identity:
/// 1. Local development bypass via the `x-account-id` header (Env::Local only).
/// 2. Bearer token extraction and signature/expiry validation.
/// 3. Account lookup by the token's subject, rejecting tokens whose account
///    no longer exists.
///
/// Rejection: `ApiError::Unauthorized` on any failure.
impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local development bypass, guarded by the Env check. The id must
        // still resolve to a real account so role and status are genuine.
        if config.env == Env::Local {
            if let Some(value) = parts.headers.get("x-account-id") {
                if let Ok(id) = value.to_str().unwrap_or("").parse::<i64>() {
                    if let Ok(Some(account)) = repo.get_account(id).await {
                        return Ok(AuthAccount(account));
                    }
                }
            }
        }

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| ApiError::unauthorized("invalid or expired token"))?;

        // Final verification against storage: a valid token for a deleted
        // account must not authenticate, and the role/status used downstream
        // are the stored ones, not the token's snapshot.
        let account = repo
            .get_account(token_data.claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("account no longer exists"))?;

        Ok(AuthAccount(account))
    }
}
