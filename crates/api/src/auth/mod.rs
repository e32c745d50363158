//! Authentication for agents and widget visitors

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, SessionError, SessionManager, TokenType};
pub use middleware::{
    extract_token, identify_caller, require_auth, require_identity, resolve_caller, AuthState,
    AuthUser, Caller, SESSION_COOKIE,
};
pub use password::{
    hash_password, validate_password_strength, verify_against_dummy, verify_password,
    PasswordError, PasswordValidationError,
};
