// 🔑 Authentication - Password check, bearer token issuance and validation
//
// Tokens are random; only their SHA-256 is stored, next to the username and
// an expiry. A token therefore resolves to exactly one identity until it
// expires.

use crate::error::{AuthFailure, RequestError, RequestResult};
use crate::permissions::{EndpointKey, Operation, PermissionSet};
use crate::repository::{SessionRepository, UserRepository};
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

const HASH_SCHEME: &str = "sha256";

// ============================================================================
// PASSWORDS
// ============================================================================

/// `sha256$<salt>$<hex digest of salt + password>`
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{HASH_SCHEME}${salt}${}", salted_digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => {
            constant_time_eq(salted_digest(salt, password).as_bytes(), expected.as_bytes())
        }
        _ => false,
    }
}

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Fixed-width RFC 3339 so stored expiries compare correctly as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// LOGIN + TOKENS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Expiry of a session issued at `now`, if it stays a four-digit-year timestamp
pub fn session_expiry(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    now.checked_add_signed(ttl).filter(|at| at.year() <= 9999)
}

/// Check credentials and issue a bearer token valid for `ttl`
pub fn login<R>(repo: &R, username: &str, password: &str, ttl: Duration) -> RequestResult<IssuedToken>
where
    R: UserRepository + SessionRepository + ?Sized,
{
    let user = repo.find_user(username)?;

    let Some(user) = user.filter(|u| verify_password(password, &u.password_hash)) else {
        warn!(username, "login rejected");
        return Err(AuthFailure::InvalidCredentials.into());
    };

    let now = Utc::now();
    // Opportunistic cleanup keeps the sessions table bounded
    repo.delete_sessions_expired_before(&timestamp(now))?;

    let expires_at = session_expiry(now, ttl)
        .ok_or_else(|| RequestError::Internal(format!("token lifetime out of range: {ttl}")))?;
    let token = uuid::Uuid::new_v4().simple().to_string();

    repo.insert_session(
        &token_digest(&token),
        &user.username,
        &timestamp(now),
        &timestamp(expires_at),
    )?;

    info!(username = %user.username, "token issued");

    Ok(IssuedToken {
        access_token: token,
        token_type: "Bearer",
        expires_at,
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthFailure> {
    let header = header.ok_or(AuthFailure::MissingToken)?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthFailure::InvalidToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthFailure::MissingToken);
    }
    Ok(token)
}

/// Identity encoded by a token. Unknown and expired tokens fail distinctly.
pub fn identity_for_token<R>(repo: &R, token: &str, now: DateTime<Utc>) -> RequestResult<String>
where
    R: SessionRepository + ?Sized,
{
    let (username, expires_at) = repo
        .find_session(&token_digest(token))?
        .ok_or(AuthFailure::InvalidToken)?;

    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| RequestError::Internal(format!("corrupt session expiry: {e}")))?
        .with_timezone(&Utc);

    if expires_at <= now {
        return Err(AuthFailure::ExpiredToken.into());
    }

    Ok(username)
}

// ============================================================================
// AUTHORIZATION
// ============================================================================

/// Load the caller's permissions and require `op` on `endpoint`.
///
/// A token whose user no longer exists is an authentication failure.
pub fn authorize<R>(repo: &R, identity: &str, endpoint: EndpointKey, op: Operation) -> RequestResult<PermissionSet>
where
    R: UserRepository + ?Sized,
{
    let user = repo
        .find_user(identity)?
        .ok_or(AuthFailure::InvalidToken)?;

    let permissions = PermissionSet::from_json(&user.permissions).map_err(|e| {
        RequestError::Internal(format!("stored permissions of {identity} are invalid: {e}"))
    })?;

    if !permissions.allows(endpoint, op) {
        warn!(identity, endpoint = %endpoint, ?op, "insufficient permissions");
        return Err(RequestError::Authorization);
    }

    Ok(permissions)
}

// ============================================================================
// REGISTRATION
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub permissions: Option<serde_json::Value>,
}

/// Create a user. The caller is responsible for the admin check.
pub fn register_user<R>(repo: &R, username: &str, password: &str, permissions: &PermissionSet) -> RequestResult<i64>
where
    R: UserRepository + ?Sized,
{
    if username.trim().is_empty() {
        return Err(RequestError::validation("username is required"));
    }
    if password.is_empty() {
        return Err(RequestError::validation("password is required"));
    }
    if repo.find_user(username)?.is_some() {
        return Err(RequestError::Conflict("Username already exists".to_string()));
    }

    let id = repo.insert_user(username, &hash_password(password), &permissions.to_json())?;
    info!(username, id, "user registered");
    Ok(id)
}

// ============================================================================
// TESTS
// ============================================================================
