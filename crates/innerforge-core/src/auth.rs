//! Identity: password hashing, signup/login, and bearer-token sessions.
//!
//! Passwords are stored as `salt$digest` where the digest is SHA-256 over
//! the random salt and the password. Browser sessions are random 32-byte
//! tokens with a configurable TTL, held server-side so logout and expiry
//! revoke them immediately.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ForgeError, Result};
use crate::model::{FieldErrors, User};
use crate::storage::SqliteStore;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

/// An authenticated browser session: a random bearer token with an expiry.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a signup attempt. Validation failures are reportable data,
/// not errors: the form redisplays and nothing is persisted.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(User),
    Invalid(FieldErrors),
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), digest_with_salt(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let actual = digest_with_salt(&salt, password);
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

fn digest_with_salt(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Byte-wise comparison that does not short-circuit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Fresh random session token, 64 hex characters.
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn validate_signup(
    username: &str,
    password: &str,
    password_confirm: &str,
) -> std::result::Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    let name = username.trim();
    if name.is_empty() {
        errors.push("username", "username cannot be empty");
    } else if name.len() > MAX_USERNAME_LENGTH {
        errors.push(
            "username",
            format!("username exceeds maximum length of {MAX_USERNAME_LENGTH} characters"),
        );
    } else if !name
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.push(
            "username",
            "username may only contain letters, digits and @ . + - _",
        );
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        errors.push(
            "password",
            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        );
    }
    if password != password_confirm {
        errors.push("password_confirm", "passwords do not match");
    }
    errors.into_result()
}

/// Create an account directly. Used by admin tooling; the web flow goes
/// through [`signup`] for form-level validation.
pub async fn create_user(
    store: &SqliteStore,
    username: &str,
    password: &str,
    is_staff: bool,
) -> Result<User> {
    let name = username.trim();
    if name.is_empty() {
        return Err(ForgeError::Precondition("username cannot be empty".into()));
    }
    if store.user_by_name(name).await?.is_some() {
        return Err(ForgeError::Precondition(format!(
            "user '{name}' already exists"
        )));
    }
    let user = User::new(name.to_string()).with_staff(is_staff);
    store.create_user(&user, &hash_password(password)).await?;
    tracing::info!(username = %user.username, is_staff, "created user");
    Ok(user)
}

pub async fn signup(
    store: &SqliteStore,
    username: &str,
    password: &str,
    password_confirm: &str,
) -> Result<SignupOutcome> {
    if let Err(errors) = validate_signup(username, password, password_confirm) {
        return Ok(SignupOutcome::Invalid(errors));
    }
    match create_user(store, username, password, false).await {
        Ok(user) => Ok(SignupOutcome::Created(user)),
        Err(ForgeError::Precondition(_)) => {
            let mut errors = FieldErrors::new();
            errors.push("username", "that username is already taken");
            Ok(SignupOutcome::Invalid(errors))
        }
        Err(e) => Err(e),
    }
}

/// Verify credentials and, on success, issue a fresh session token.
pub async fn login(
    store: &SqliteStore,
    username: &str,
    password: &str,
    ttl_hours: u64,
) -> Result<Option<(User, AuthSession)>> {
    let Some((user, password_hash)) = store.credentials_by_name(username.trim()).await? else {
        return Ok(None);
    };
    if !verify_password(password, &password_hash) {
        return Ok(None);
    }
    let session = issue_session(store, user.id, ttl_hours).await?;
    tracing::debug!(username = %user.username, "login succeeded");
    Ok(Some((user, session)))
}

pub async fn issue_session(
    store: &SqliteStore,
    user_id: Uuid,
    ttl_hours: u64,
) -> Result<AuthSession> {
    let now = Utc::now();
    let session = AuthSession {
        token: new_token(),
        user_id,
        created_at: now,
        expires_at: now + Duration::hours(ttl_hours as i64),
    };
    store.insert_auth_session(&session).await?;
    Ok(session)
}

/// Resolve a bearer token to its user. Expired or unknown tokens resolve to
/// `None`, never to an error.
pub async fn authenticate(store: &SqliteStore, token: &str) -> Result<Option<User>> {
    if token.is_empty() {
        return Ok(None);
    }
    store.user_for_token(token, Utc::now()).await
}

pub async fn logout(store: &SqliteStore, token: &str) -> Result<()> {
    store.delete_auth_session(token).await
}
