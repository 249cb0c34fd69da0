//! Input rules for usernames, passwords and email addresses.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const USERNAME_MIN_LEN: usize = 6;
pub const USERNAME_MAX_LEN: usize = 16;
pub const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_SYMBOLS: &str = "#?!@$%^&*-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username must be 6 to 16 characters")]
    UsernameLength,
    #[error("username may only use letters, digits, and single '.' or '_' separators")]
    UsernameFormat,
    #[error("password must be at least 8 characters")]
    PasswordLength,
    #[error("password needs upper and lower case letters, a digit and a symbol")]
    PasswordStrength,
    #[error("invalid email address")]
    Email,
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Alphanumeric runs joined by single separators: no leading, trailing
    // or doubled '.'/'_'.
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+([._][a-zA-Z0-9]+)*$").expect("valid regex"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$")
            .expect("valid regex")
    })
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::UsernameLength);
    }
    if !username_pattern().is_match(username) {
        return Err(ValidationError::UsernameFormat);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::PasswordLength);
    }

    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    let symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));
    if upper && lower && digit && symbol {
        Ok(())
    } else {
        Err(ValidationError::PasswordStrength)
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > 254 || !email_pattern().is_match(email) {
        return Err(ValidationError::Email);
    }
    Ok(())
}
