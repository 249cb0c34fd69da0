//! Credential checks, password hashing and bearer tokens.

mod password;
mod token;
mod validate;

pub use password::{hash_password, verify_password, BCRYPT_MAX_COST, BCRYPT_MIN_COST};
pub use token::{bearer_token, Claims, TokenAuthority};
pub use validate::{validate_email, validate_password, validate_username, ValidationError};

use thiserror::Error;

/// Why a request could not be authenticated.
///
/// The display strings double as the `reason` field of 401 responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization field empty")]
    Missing,
    #[error("authorization format error")]
    MalformedHeader,
    #[error("token is expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("failed to generate token")]
    Issue(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}
