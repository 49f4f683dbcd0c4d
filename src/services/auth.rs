use crate::db::{
    models::{AuditLog, Role, User},
    DbClient,
};
use crate::{errors::ApiError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// Hashes a password with Argon2 on the blocking pool
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::Custom(format!("hash task failed: {e}")))?
}

/// Checks a password against a stored PHC string. Malformed hashes never match.
pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&stored_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .map_err(|e| ApiError::Custom(format!("verify task failed: {e}")))
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
        })
        .filter(|token| !token.is_empty())
}

/// Creates the configured admin account when no user owns that email yet.
/// Returns whether an account was created.
pub async fn ensure_admin(db: &DbClient, email: &str, password: &str) -> Result<bool> {
    if db.find_user_by_email(email).await?.is_some() {
        return Ok(false);
    }
    let hash = hash_password(password).await?;
    let admin = db
        .insert_user(&User::new(email, hash, "Administrator", None, Role::Admin))
        .await?;
    db.record_audit(AuditLog::new(
        None,
        "user.bootstrapped",
        "user",
        Some(&admin.id),
        Some(&serde_json::json!({ "email": admin.email, "role": Role::Admin })),
    ))
    .await;
    tracing::info!("Bootstrapped admin account {}", admin.email);
    Ok(true)
}
