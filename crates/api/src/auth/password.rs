//! Agent password hashing (Argon2id) and strength rules

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

const MIN_PASSWORD_LEN: usize = 12;
const MAX_PASSWORD_LEN: usize = 128;
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`";

/// Passwords rejected regardless of composition (compared case-insensitively)
const COMMON_PASSWORDS: &[&str] = &[
    "password123!",
    "password1234!",
    "password@123",
    "password#123",
    "p@ssw0rd1234",
    "p@ssword1234",
    "welcome123!!",
    "welcome@1234",
    "qwerty123456!",
    "qwertyuiop1!",
    "letmein12345!",
    "admin@123456",
    "changeme123!",
    "iloveyou123!",
    "support@1234",
    "helpdesk123!",
    "livechat123!",
];

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Run one verification against a fixed hash so that a login for an
/// unknown email costs the same as one with a wrong password.
///
/// The hash is computed on first use.
pub fn verify_against_dummy(password: &str) {
    let hash = DUMMY_HASH.get_or_init(|| hash_password("dummy-password-never-matches").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

/// Enforce the agent password policy
pub fn validate_password_strength(password: &str) -> Result<(), PasswordValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(PasswordValidationError::TooShort);
    }
    if len > MAX_PASSWORD_LEN {
        return Err(PasswordValidationError::TooLong);
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordValidationError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordValidationError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordValidationError::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordValidationError::MissingSpecialChar);
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(PasswordValidationError::TooCommon);
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordValidationError {
    #[error("Password must be at least 12 characters")]
    TooShort,
    #[error("Password must be at most 128 characters")]
    TooLong,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one digit")]
    MissingDigit,
    #[error("Password must contain at least one special character (!@#$%^&*)")]
    MissingSpecialChar,
    #[error("This password is too common, please choose another")]
    TooCommon,
}
