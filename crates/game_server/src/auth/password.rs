use super::AuthError;

/// Lowest work factor bcrypt accepts.
pub const BCRYPT_MIN_COST: u32 = 4;
/// Highest work factor bcrypt accepts.
pub const BCRYPT_MAX_COST: u32 = 31;

/// Hashes `password` with bcrypt on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Task join error: {e}")))?
}

/// Checks `password` against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || {
        bcrypt::verify(password, &hash).map_err(|e| AuthError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hashing(format!("Task join error: {e}")))?
}
